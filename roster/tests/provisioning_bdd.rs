//! Behaviour-driven tests for intake-driven account provisioning.

use std::path::PathBuf;
use std::sync::Arc;

use roster::domain::{
    GroupId, ProvisioningConfig, ProvisioningPorts, ProvisioningReport, ProvisioningService,
    ProvisioningStatus, SkipReason, SkuId, StepOutcome,
};
use roster::outbound::credentials::OsPasswordGenerator;
use roster::outbound::files::CsvRegistrationSource;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, scenario, then, when};
use tempfile::TempDir;
use tokio::runtime::Runtime;

mod support;

use support::{FakeDirectory, RecordingNotifier, branding, domain};

const GROUP: &str = "learners";
const INTAKE_HEADER: &str = "Email Address,First Name,Last Name\n";

#[derive(Clone)]
struct RuntimeHandle(Arc<Runtime>);

#[derive(Default, ScenarioState)]
struct ProvisioningWorld {
    runtime: Slot<RuntimeHandle>,
    workdir: Slot<Arc<TempDir>>,
    directory: Slot<Arc<FakeDirectory>>,
    notifier: Slot<Arc<RecordingNotifier>>,
    reports: Slot<Vec<ProvisioningReport>>,
}

impl ProvisioningWorld {
    fn intake_path(&self) -> PathBuf {
        self.workdir.get().expect("workdir").path().join("intake.csv")
    }

    fn directory(&self) -> Arc<FakeDirectory> {
        self.directory.get().expect("directory")
    }

    fn notifier(&self) -> Arc<RecordingNotifier> {
        self.notifier.get().expect("notifier")
    }

    fn write_intake(&self, rows: &str) {
        std::fs::write(self.intake_path(), format!("{INTAKE_HEADER}{rows}")).expect("write intake");
    }

    fn service(
        &self,
    ) -> ProvisioningService<FakeDirectory, RecordingNotifier, CsvRegistrationSource, OsPasswordGenerator>
    {
        let workdir = self.workdir.get().expect("workdir");
        ProvisioningService::new(
            ProvisioningPorts {
                directory: self.directory(),
                notifier: self.notifier(),
                registrations: Arc::new(CsvRegistrationSource::new(
                    workdir.path().join("late.csv"),
                    self.intake_path(),
                )),
                passwords: Arc::new(OsPasswordGenerator),
            },
            ProvisioningConfig {
                organizational_domain: domain(),
                branding: branding(),
                license_skus: vec![SkuId::resolve("MICROSOFT_POWER_APPS_DEV").expect("sku")],
                enrollment_groups: vec![GroupId::parse(GROUP).expect("group id")],
            },
        )
    }

    fn run(&self) {
        let runtime = self.runtime.get().expect("runtime");
        let report = runtime
            .0
            .block_on(self.service().provision())
            .expect("provisioning run");
        let mut reports = self.reports.get().unwrap_or_default();
        reports.push(report);
        self.reports.set(reports);
    }

    fn first_report(&self) -> ProvisioningReport {
        self.reports
            .get()
            .and_then(|reports| reports.first().cloned())
            .expect("a run has completed")
    }
}

#[fixture]
fn world() -> ProvisioningWorld {
    let world = ProvisioningWorld::default();
    world
        .runtime
        .set(RuntimeHandle(Arc::new(Runtime::new().expect("create runtime"))));
    world
        .workdir
        .set(Arc::new(TempDir::new().expect("create temp dir")));
    world.directory.set(Arc::new(FakeDirectory::default()));
    world.notifier.set(Arc::new(RecordingNotifier::default()));
    world
}

#[given("an intake row for Jane Doe at Jane.Doe@gmail.com")]
fn intake_for_jane(world: &ProvisioningWorld) {
    world.write_intake("Jane.Doe@gmail.com,Jane,Doe\n");
}

#[given("an intake file with a row missing its email and a row for Bo at bo@x.com")]
fn intake_with_blank_email(world: &ProvisioningWorld) {
    world.write_intake(",Ann,Lee\nbo@x.com,Bo,\n");
}

#[given("license assignment fails for the account created for Bo")]
fn licenses_fail_for_bo(world: &ProvisioningWorld) {
    world.directory().fail_licenses_for("u-bo");
}

#[when("provisioning runs")]
fn provisioning_runs(world: &ProvisioningWorld) {
    world.run();
}

#[when("provisioning runs twice")]
fn provisioning_runs_twice(world: &ProvisioningWorld) {
    world.run();
    world.run();
}

#[then("the account jane.doe@aiskillsfest.net was created")]
fn jane_created(world: &ProvisioningWorld) {
    let report = world.first_report();
    let result = report.results.first().expect("one row");
    assert_eq!(
        result.user_principal_name.as_ref().map(|upn| upn.as_str()),
        Some("jane.doe@aiskillsfest.net")
    );
    assert!(matches!(result.status, ProvisioningStatus::Created { .. }));
    assert_eq!(
        world.directory().calls().first().map(String::as_str),
        Some("create_user jane.doe@aiskillsfest.net")
    );
}

#[then("licenses were assigned to the new account")]
fn licenses_assigned(world: &ProvisioningWorld) {
    let report = world.first_report();
    let result = report.results.first().expect("one row");
    assert!(matches!(
        &result.status,
        ProvisioningStatus::Created {
            licenses: StepOutcome::Done,
            ..
        }
    ));
    assert!(
        world
            .directory()
            .calls()
            .contains(&"assign_licenses u-jane.doe 1".to_owned())
    );
}

#[then("a welcome email with the username was sent to Jane.Doe@gmail.com")]
fn welcome_sent(world: &ProvisioningWorld) {
    let sent = world.notifier().sent();
    assert_eq!(sent.len(), 1);
    let welcome = &sent[0];
    assert_eq!(welcome.to.as_str(), "Jane.Doe@gmail.com");
    assert!(welcome.html_body.contains("jane.doe@aiskillsfest.net"));
    assert!(welcome.html_body.contains("Hello Jane Doe,"));
}

#[then("the new account is a member of the learners group")]
fn enrolled(world: &ProvisioningWorld) {
    let members = world.directory().members(GROUP);
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id.as_str(), "u-jane.doe");

    let report = world.first_report();
    let enrollment = report.enrollments.first().expect("enrollment tally");
    assert_eq!(enrollment.added, 1);
    assert!(enrollment.failed.is_empty());
}

#[then("the second run skipped the row because the account exists")]
fn second_run_skipped(world: &ProvisioningWorld) {
    let reports = world.reports.get().expect("reports");
    let second = reports.last().expect("second run");
    assert_eq!(second.count("skipped"), 1);
    assert!(matches!(
        &second.results[0].status,
        ProvisioningStatus::Skipped {
            reason: SkipReason::AlreadyExists,
            user_id: Some(id),
        } if id.as_str() == "u-jane.doe"
    ));
    assert_eq!(second.enrollments[0].added, 0);
}

#[then("only one account was created")]
fn one_account(world: &ProvisioningWorld) {
    let creates = world
        .directory()
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("create_user "))
        .count();
    assert_eq!(creates, 1);
    assert_eq!(world.directory().users().len(), 1);
    assert_eq!(world.notifier().sent().len(), 1);
}

#[then("the first row is reported as an error")]
fn first_row_errors(world: &ProvisioningWorld) {
    let report = world.first_report();
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].row, 1);
    assert_eq!(report.results[0].status.label(), "error");
}

#[then("the account bo@aiskillsfest.net was created with a failed license step")]
fn bo_created_without_licenses(world: &ProvisioningWorld) {
    let report = world.first_report();
    let bo = &report.results[1];
    assert_eq!(
        bo.user_principal_name.as_ref().map(|upn| upn.as_str()),
        Some("bo@aiskillsfest.net")
    );
    assert!(matches!(
        &bo.status,
        ProvisioningStatus::Created {
            licenses: StepOutcome::Failed(_),
            welcome_email: StepOutcome::Done,
            ..
        }
    ));
    let welcome = world.notifier().sent();
    assert!(welcome[0].html_body.contains("Hello Bo Student,"));
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "A new participant is created, licensed, welcomed and enrolled"
)]
fn new_participant_provisioned(world: ProvisioningWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "A second provisioning run skips the existing account"
)]
fn second_run_skips_existing(world: ProvisioningWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "Rows that cannot be provisioned are reported and the rest proceed"
)]
fn failing_rows_do_not_stop_the_run(world: ProvisioningWorld) {
    drop(world);
}
