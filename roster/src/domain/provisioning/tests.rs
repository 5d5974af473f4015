//! Unit coverage for the provisioning flow.

use mockall::Sequence;
use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::directory::{DirectoryAccount, TemporaryPassword};
use crate::domain::ports::{
    DirectoryError, MockDirectoryClient, MockNotifier, MockPasswordGenerator,
    MockRegistrationSource,
};

type Service = ProvisioningService<
    MockDirectoryClient,
    MockNotifier,
    MockRegistrationSource,
    MockPasswordGenerator,
>;

fn intake(email: Option<&str>, first: Option<&str>, last: Option<&str>) -> IntakeRow {
    IntakeRow {
        email: email.map(str::to_owned),
        first_name: first.map(str::to_owned),
        last_name: last.map(str::to_owned),
    }
}

fn object_id(raw: &str) -> DirectoryObjectId {
    DirectoryObjectId::parse(raw).expect("object id")
}

fn account(id: &str, upn: &str) -> DirectoryAccount {
    DirectoryAccount {
        id: object_id(id),
        user_principal_name: Some(UserPrincipalName::from_directory(upn)),
        display_name: None,
        mail: None,
        account_enabled: Some(true),
    }
}

#[fixture]
fn config() -> ProvisioningConfig {
    ProvisioningConfig {
        organizational_domain: OrganizationalDomain::parse("aiskillsfest.net").expect("domain"),
        branding: EventBranding {
            event_name: "AI Skills Fest".to_owned(),
            event_url: "https://aiskillsfest.com".to_owned(),
            admin_cc: EmailAddress::parse("admins@aiskillsfest.net").expect("cc"),
        },
        license_skus: SkuId::resolve_list(
            "MICROSOFT_COPILOT_STUDIO_VIRAL_TRIAL,MICROSOFT_POWER_APPS_DEV",
        )
        .expect("skus"),
        enrollment_groups: vec![
            GroupId::parse("learners").expect("group"),
            GroupId::parse("sharepoint").expect("group"),
        ],
    }
}

fn fixed_passwords() -> MockPasswordGenerator {
    let mut passwords = MockPasswordGenerator::new();
    passwords
        .expect_generate()
        .returning(|| TemporaryPassword::new("Fixed#Pass12".to_owned()));
    passwords
}

fn service(
    directory: MockDirectoryClient,
    notifier: MockNotifier,
    registrations: MockRegistrationSource,
    config: ProvisioningConfig,
) -> Service {
    ProvisioningService::new(
        ProvisioningPorts {
            directory: Arc::new(directory),
            notifier: Arc::new(notifier),
            registrations: Arc::new(registrations),
            passwords: Arc::new(fixed_passwords()),
        },
        config,
    )
}

#[rstest]
#[tokio::test]
async fn rerunning_a_row_creates_then_skips(config: ProvisioningConfig) {
    let mut directory = MockDirectoryClient::new();
    let mut seq = Sequence::new();
    directory
        .expect_find_users()
        .withf(|filter| {
            *filter
                == UserFilter::ByUserPrincipalName(UserPrincipalName::from_directory(
                    "jane.doe@aiskillsfest.net",
                ))
        })
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_| Ok(Vec::new()));
    directory
        .expect_create_user()
        .withf(|account| {
            account.user_principal_name.as_str() == "jane.doe@aiskillsfest.net"
                && account.mail_nickname == "jane.doe"
                && account.display_name == "Jane Doe"
                && account.force_change_password
                && account.password.expose() == "Fixed#Pass12"
        })
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_| Ok(account("u-1", "jane.doe@aiskillsfest.net")));
    directory
        .expect_assign_licenses()
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_, _| Ok(()));
    directory
        .expect_find_users()
        .times(1)
        .in_sequence(&mut seq)
        .return_once(|_| Ok(vec![account("u-1", "jane.doe@aiskillsfest.net")]));
    directory.expect_create_user().never();
    let mut notifier = MockNotifier::new();
    notifier
        .expect_send()
        .withf(|message| message.html_body.contains("Fixed#Pass12"))
        .times(1)
        .return_once(|_| Ok(()));

    let flow = service(directory, notifier, MockRegistrationSource::new(), config);
    let row = intake(Some("jane.doe@gmail.com"), Some("Jane"), Some("Doe"));
    let first = flow.provision_row(1, &row).await;
    let second = flow.provision_row(1, &row).await;

    assert_eq!(
        first.status,
        ProvisioningStatus::Created {
            user_id: object_id("u-1"),
            licenses: StepOutcome::Done,
            welcome_email: StepOutcome::Done,
        }
    );
    assert_eq!(
        second.status,
        ProvisioningStatus::Skipped {
            reason: SkipReason::AlreadyExists,
            user_id: Some(object_id("u-1")),
        }
    );
}

#[rstest]
#[tokio::test]
async fn license_failure_keeps_the_account_and_still_welcomes(config: ProvisioningConfig) {
    let mut directory = MockDirectoryClient::new();
    directory
        .expect_find_users()
        .times(1)
        .return_once(|_| Ok(Vec::new()));
    directory
        .expect_create_user()
        .times(1)
        .return_once(|_| Ok(account("u-2", "sam@aiskillsfest.net")));
    directory
        .expect_assign_licenses()
        .withf(|_, skus| skus.len() == 2)
        .times(1)
        .return_once(|_, _| Err(DirectoryError::rejected("license unavailable")));
    directory.expect_delete_user().never();
    let mut notifier = MockNotifier::new();
    notifier.expect_send().times(1).return_once(|_| Ok(()));

    let flow = service(directory, notifier, MockRegistrationSource::new(), config);
    let result = flow
        .provision_row(1, &intake(Some("sam@x.org"), Some("Sam"), None))
        .await;

    let ProvisioningStatus::Created {
        licenses,
        welcome_email,
        ..
    } = result.status
    else {
        panic!("row should be created, got {:?}", result.status);
    };
    assert!(matches!(licenses, StepOutcome::Failed(reason) if reason.contains("license unavailable")));
    assert_eq!(welcome_email, StepOutcome::Done);
}

#[rstest]
#[case::missing_email(intake(None, Some("Ann"), None))]
#[case::blank_email(intake(Some("  "), Some("Ann"), None))]
#[case::missing_first_name(intake(Some("ann@x.org"), None, None))]
#[case::no_local_part(intake(Some("@x.org"), Some("Ann"), None))]
#[tokio::test]
async fn invalid_rows_yield_errors_without_directory_calls(
    config: ProvisioningConfig,
    #[case] row: IntakeRow,
) {
    let flow = service(
        MockDirectoryClient::new(),
        MockNotifier::new(),
        MockRegistrationSource::new(),
        config,
    );
    let result = flow.provision_row(3, &row).await;

    assert_eq!(result.row, 3);
    assert_eq!(result.status.label(), "error");
}

#[rstest]
#[tokio::test]
async fn existence_check_failure_is_an_error_row(config: ProvisioningConfig) {
    let mut directory = MockDirectoryClient::new();
    directory
        .expect_find_users()
        .times(1)
        .return_once(|_| Err(DirectoryError::authentication("token expired")));
    directory.expect_create_user().never();

    let flow = service(directory, MockNotifier::new(), MockRegistrationSource::new(), config);
    let result = flow
        .provision_row(1, &intake(Some("ann@x.org"), Some("Ann"), None))
        .await;

    assert!(matches!(
        result.status,
        ProvisioningStatus::Error { ref message } if message.contains("token expired")
    ));
}

#[rstest]
#[tokio::test]
async fn only_created_accounts_are_enrolled_in_every_group(config: ProvisioningConfig) {
    let mut registrations = MockRegistrationSource::new();
    registrations.expect_intake_rows().times(1).return_once(|| {
        Ok(vec![
            intake(Some("new@x.org"), Some("New"), Some("Person")),
            intake(Some("old@x.org"), Some("Old"), Some("Person")),
            intake(None, None, None),
        ])
    });
    let mut directory = MockDirectoryClient::new();
    directory
        .expect_find_users()
        .withf(|filter| {
            matches!(filter, UserFilter::ByUserPrincipalName(upn) if upn.as_str() == "new@aiskillsfest.net")
        })
        .times(1)
        .return_once(|_| Ok(Vec::new()));
    directory
        .expect_find_users()
        .withf(|filter| {
            matches!(filter, UserFilter::ByUserPrincipalName(upn) if upn.as_str() == "old@aiskillsfest.net")
        })
        .times(1)
        .return_once(|_| Ok(vec![account("u-old", "old@aiskillsfest.net")]));
    directory
        .expect_create_user()
        .times(1)
        .return_once(|_| Ok(account("u-new", "new@aiskillsfest.net")));
    directory
        .expect_assign_licenses()
        .times(1)
        .return_once(|_, _| Ok(()));
    directory
        .expect_add_group_member()
        .with(eq(GroupId::parse("learners").expect("group")), eq(object_id("u-new")))
        .times(1)
        .return_once(|_, _| Ok(()));
    directory
        .expect_add_group_member()
        .with(eq(GroupId::parse("sharepoint").expect("group")), eq(object_id("u-new")))
        .times(1)
        .return_once(|_, _| Err(DirectoryError::rejected("already a member")));
    let mut notifier = MockNotifier::new();
    notifier
        .expect_send()
        .times(1)
        .return_once(|_| Err(NotifierError::disabled()));

    let flow = service(directory, notifier, registrations, config);
    let report = flow.provision().await.expect("provisioning completes");

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.count("created"), 1);
    assert_eq!(report.count("skipped"), 1);
    assert_eq!(report.count("error"), 1);
    assert_eq!(report.enrollments.len(), 2);
    assert_eq!(report.enrollments[0].added, 1);
    assert_eq!(report.enrollments[1].added, 0);
    assert_eq!(report.enrollments[1].failed.len(), 1);
    assert!(matches!(
        report.results[0].status,
        ProvisioningStatus::Created {
            welcome_email: StepOutcome::Skipped,
            ..
        }
    ));
}

#[rstest]
#[tokio::test]
async fn unreadable_intake_fails_the_run(config: ProvisioningConfig) {
    let mut registrations = MockRegistrationSource::new();
    registrations
        .expect_intake_rows()
        .times(1)
        .return_once(|| Err(RegistrationSourceError::read("registered.csv missing")));

    let flow = service(MockDirectoryClient::new(), MockNotifier::new(), registrations, config);
    let error = flow.provision().await.expect_err("run should fail");

    assert_eq!(error.code(), ErrorCode::NotFound);
}
