//! Account provisioning from an intake file.
//!
//! Every intake row yields exactly one [`ProvisioningResult`]. An existing
//! account with the derived UPN is reported as skipped, so reruns never
//! create duplicates. License assignment and the welcome email are
//! best-effort: their failure is recorded but never undoes account creation.
//! Once every row is processed, created accounts are enrolled in the
//! configured groups.

use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::Error;
use super::directory::{DirectoryObjectId, GroupId, NewAccount, UserFilter};
use super::licenses::SkuId;
use super::notifications::{DEFAULT_SURNAME, EventBranding};
use super::participant::{EmailAddress, OrganizationalDomain, UserPrincipalName};
use super::ports::{
    DirectoryClient, IntakeRow, Notifier, NotifierError, PasswordGenerator, RegistrationSource,
    RegistrationSourceError,
};

/// Why a row was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// An account with the derived UPN already exists.
    AlreadyExists,
}

/// Outcome of a best-effort follow-up step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step succeeded.
    Done,
    /// The step was not attempted.
    Skipped,
    /// The step failed with the given reason.
    Failed(String),
}

/// Terminal status of one intake row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningStatus {
    /// A new account was created.
    Created {
        /// Directory id of the new account.
        user_id: DirectoryObjectId,
        /// License assignment outcome.
        licenses: StepOutcome,
        /// Welcome email outcome.
        welcome_email: StepOutcome,
    },
    /// Nothing was created.
    Skipped {
        /// Why the row was skipped.
        reason: SkipReason,
        /// Id of the existing account.
        user_id: Option<DirectoryObjectId>,
    },
    /// The row could not be processed.
    Error {
        /// Human-readable cause.
        message: String,
    },
}

impl ProvisioningStatus {
    /// Snake-case label: `created`, `skipped` or `error`.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Skipped { .. } => "skipped",
            Self::Error { .. } => "error",
        }
    }
}

/// Result for one intake row. The temporary password is never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningResult {
    /// One-based row number in the intake file, excluding the header.
    pub row: usize,
    /// Email as read, when present.
    pub email: Option<String>,
    /// Derived UPN, when derivation succeeded.
    pub user_principal_name: Option<UserPrincipalName>,
    /// Terminal status.
    pub status: ProvisioningStatus,
}

/// Group enrollment counters for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentTally {
    /// Target group.
    pub group_id: GroupId,
    /// Accounts added.
    pub added: usize,
    /// Accounts that could not be added, with reasons.
    pub failed: Vec<(DirectoryObjectId, String)>,
}

/// Outcome of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningReport {
    /// Correlates the report with the run's log lines.
    pub run_id: Uuid,
    /// One entry per intake row, in file order.
    pub results: Vec<ProvisioningResult>,
    /// One entry per enrollment group, in configuration order.
    pub enrollments: Vec<EnrollmentTally>,
}

impl ProvisioningReport {
    /// Number of rows with the given status label.
    pub fn count(&self, label: &str) -> usize {
        self.results
            .iter()
            .filter(|result| result.status.label() == label)
            .count()
    }

    /// Ids of accounts created in this run.
    pub fn created_ids(&self) -> Vec<DirectoryObjectId> {
        self.results
            .iter()
            .filter_map(|result| match &result.status {
                ProvisioningStatus::Created { user_id, .. } => Some(user_id.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Collaborators the provisioning flow drives.
pub struct ProvisioningPorts<D, N, R, P> {
    /// Remote directory.
    pub directory: Arc<D>,
    /// Mail transport.
    pub notifier: Arc<N>,
    /// Intake file source.
    pub registrations: Arc<R>,
    /// Temporary credential source.
    pub passwords: Arc<P>,
}

/// Validated provisioning settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    /// Domain appended to derived UPNs.
    pub organizational_domain: OrganizationalDomain,
    /// Template branding.
    pub branding: EventBranding,
    /// SKUs assigned to each new account; empty skips assignment.
    pub license_skus: Vec<SkuId>,
    /// Groups each new account joins, in order.
    pub enrollment_groups: Vec<GroupId>,
}

/// Validated intake row.
struct Candidate {
    email: EmailAddress,
    first_name: String,
    surname: String,
    upn: UserPrincipalName,
}

/// Provisioning flow.
pub struct ProvisioningService<D, N, R, P> {
    ports: ProvisioningPorts<D, N, R, P>,
    config: ProvisioningConfig,
}

impl<D, N, R, P> ProvisioningService<D, N, R, P>
where
    D: DirectoryClient,
    N: Notifier,
    R: RegistrationSource,
    P: PasswordGenerator,
{
    /// Create a provisioning flow.
    pub fn new(ports: ProvisioningPorts<D, N, R, P>, config: ProvisioningConfig) -> Self {
        Self { ports, config }
    }

    /// Provision every intake row, then enroll created accounts.
    ///
    /// # Errors
    ///
    /// Fails only when the intake file cannot be read or decoded.
    pub async fn provision(&self) -> Result<ProvisioningReport, Error> {
        let run_id = Uuid::new_v4();
        let span = info_span!("provisioning", %run_id);
        async move {
            let rows = self
                .ports
                .registrations
                .intake_rows()
                .await
                .map_err(map_intake_error)?;
            info!(rows = rows.len(), "intake loaded");

            let mut results = Vec::with_capacity(rows.len());
            for (index, row) in rows.iter().enumerate() {
                results.push(self.provision_row(index + 1, row).await);
            }

            let mut report = ProvisioningReport {
                run_id,
                results,
                enrollments: Vec::new(),
            };
            let created = report.created_ids();
            for group_id in &self.config.enrollment_groups {
                report.enrollments.push(self.enroll(group_id, &created).await);
            }
            info!(
                created = report.count("created"),
                skipped = report.count("skipped"),
                errors = report.count("error"),
                "provisioning finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Provision one intake row.
    pub async fn provision_row(&self, row: usize, intake: &IntakeRow) -> ProvisioningResult {
        let mut result = ProvisioningResult {
            row,
            email: intake.email.clone(),
            user_principal_name: None,
            status: ProvisioningStatus::Error {
                message: String::new(),
            },
        };
        let candidate = match self.validate(intake) {
            Ok(candidate) => candidate,
            Err(message) => {
                warn!(row, reason = %message, "intake row rejected");
                result.status = ProvisioningStatus::Error { message };
                return result;
            }
        };
        result.user_principal_name = Some(candidate.upn.clone());

        let existing = self
            .ports
            .directory
            .find_users(&UserFilter::ByUserPrincipalName(candidate.upn.clone()))
            .await;
        match existing {
            Ok(accounts) if !accounts.is_empty() => {
                let user_id = accounts.into_iter().next().map(|account| account.id);
                info!(user_principal_name = %candidate.upn, "account already exists; skipping");
                result.status = ProvisioningStatus::Skipped {
                    reason: SkipReason::AlreadyExists,
                    user_id,
                };
                return result;
            }
            Ok(_) => {}
            Err(error) => {
                warn!(user_principal_name = %candidate.upn, error = %error, "existence check failed");
                result.status = ProvisioningStatus::Error {
                    message: format!("existence check failed: {error}"),
                };
                return result;
            }
        }

        result.status = self.create(candidate).await;
        result
    }

    async fn create(&self, candidate: Candidate) -> ProvisioningStatus {
        let password = self.ports.passwords.generate();
        let account = NewAccount {
            display_name: format!("{} {}", candidate.first_name, candidate.surname),
            given_name: candidate.first_name.clone(),
            surname: candidate.surname.clone(),
            user_principal_name: candidate.upn.clone(),
            mail_nickname: candidate.upn.handle().to_owned(),
            mail: candidate.email.clone(),
            password,
            force_change_password: true,
        };
        let created = match self.ports.directory.create_user(&account).await {
            Ok(created) => created,
            Err(error) => {
                warn!(user_principal_name = %candidate.upn, error = %error, "account creation failed");
                return ProvisioningStatus::Error {
                    message: format!("account creation failed: {error}"),
                };
            }
        };
        info!(user_principal_name = %candidate.upn, user_id = %created.id, "account created");

        let licenses = self.assign_licenses(&created.id, &candidate.upn).await;
        let message = self.config.branding.welcome(
            &candidate.email,
            &candidate.first_name,
            &candidate.surname,
            &candidate.upn,
            &account.password,
        );
        let welcome_email = match self.ports.notifier.send(&message).await {
            Ok(()) => {
                info!(email = %candidate.email, "welcome email sent");
                StepOutcome::Done
            }
            Err(NotifierError::Disabled) => {
                debug!(email = %candidate.email, "notifications disabled; welcome email not sent");
                StepOutcome::Skipped
            }
            Err(error) => {
                warn!(email = %candidate.email, error = %error, "welcome email failed");
                StepOutcome::Failed(error.to_string())
            }
        };

        ProvisioningStatus::Created {
            user_id: created.id,
            licenses,
            welcome_email,
        }
    }

    async fn assign_licenses(
        &self,
        user_id: &DirectoryObjectId,
        upn: &UserPrincipalName,
    ) -> StepOutcome {
        if self.config.license_skus.is_empty() {
            return StepOutcome::Skipped;
        }
        match self
            .ports
            .directory
            .assign_licenses(user_id, &self.config.license_skus)
            .await
        {
            Ok(()) => {
                info!(user_principal_name = %upn, skus = self.config.license_skus.len(), "licenses assigned");
                StepOutcome::Done
            }
            Err(error) => {
                warn!(user_principal_name = %upn, error = %error, "license assignment failed");
                StepOutcome::Failed(error.to_string())
            }
        }
    }

    async fn enroll(&self, group_id: &GroupId, user_ids: &[DirectoryObjectId]) -> EnrollmentTally {
        let mut tally = EnrollmentTally {
            group_id: group_id.clone(),
            added: 0,
            failed: Vec::new(),
        };
        for user_id in user_ids {
            match self.ports.directory.add_group_member(group_id, user_id).await {
                Ok(()) => {
                    debug!(group_id = %group_id, user_id = %user_id, "account enrolled");
                    tally.added += 1;
                }
                Err(error) => {
                    warn!(group_id = %group_id, user_id = %user_id, error = %error, "group enrollment failed");
                    tally.failed.push((user_id.clone(), error.to_string()));
                }
            }
        }
        info!(group_id = %group_id, added = tally.added, failed = tally.failed.len(), "group enrollment finished");
        tally
    }

    fn validate(&self, intake: &IntakeRow) -> Result<Candidate, String> {
        let email = EmailAddress::parse(intake.email.as_deref().unwrap_or_default())
            .map_err(|error| error.to_string())?;
        let first_name = intake
            .first_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| "first name must not be empty".to_owned())?
            .to_owned();
        let surname = intake
            .last_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SURNAME)
            .to_owned();
        let upn = UserPrincipalName::derive(&email, &self.config.organizational_domain)
            .map_err(|error| error.to_string())?;
        Ok(Candidate {
            email,
            first_name,
            surname,
            upn,
        })
    }
}

fn map_intake_error(error: RegistrationSourceError) -> Error {
    match error {
        RegistrationSourceError::Read { .. } => {
            Error::not_found(format!("intake file unavailable: {error}"))
        }
        RegistrationSourceError::Decode { .. } => {
            Error::invalid_request(format!("intake file malformed: {error}"))
        }
    }
}

#[cfg(test)]
mod tests;
