//! Membership reconciliation engine.
//!
//! One pass runs six phases strictly in order, each over every record before
//! the next starts:
//! 1. ingest the group roster into the ledger;
//! 2. thank every ledger participant;
//! 3. remove every roster member from the group;
//! 4. delete roster members that are user accounts from the tenant;
//! 5. sweep the tenant for every ledger email and its derived UPN;
//! 6. merge late registrations and put each new one through 2-5.
//!
//! Per-record failures are logged, tallied and recorded; they never abort the
//! pass. The ledger is the work queue: no directory or mail action is taken
//! for an email the ledger does not hold.

mod report;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

pub use self::report::{
    GroupRetirementTally, IngestTally, LateRegistrationTally, LedgerSweepTally, NotifyTally,
    Phase, ReconciliationReport, RecordFailure, TenantRetirementTally,
};
use super::Error;
use super::directory::{
    DeleteOutcome, DirectoryMember, DirectoryObjectKind, GroupId, MembershipSnapshot, UserFilter,
};
use super::notifications::EventBranding;
use super::participant::{EmailAddress, OrganizationalDomain, ParticipantRecord, UserPrincipalName};
use super::participant_ledger::{AppendOutcome, ParticipantLedger};
use super::ports::{DirectoryClient, DirectoryError, LedgerStorage, Notifier, RegistrationSource};

/// Collaborators the engine drives.
pub struct ReconciliationPorts<D, N, L, R> {
    /// Remote directory.
    pub directory: Arc<D>,
    /// Mail transport.
    pub notifier: Arc<N>,
    /// Participant ledger storage.
    pub ledger: Arc<L>,
    /// Late registration source.
    pub registrations: Arc<R>,
}

impl<D, N, L, R> Clone for ReconciliationPorts<D, N, L, R> {
    fn clone(&self) -> Self {
        Self {
            directory: Arc::clone(&self.directory),
            notifier: Arc::clone(&self.notifier),
            ledger: Arc::clone(&self.ledger),
            registrations: Arc::clone(&self.registrations),
        }
    }
}

/// Validated settings for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationConfig {
    /// Group whose roster drives the pass.
    pub group_id: GroupId,
    /// Domain appended to derived UPNs.
    pub organizational_domain: OrganizationalDomain,
    /// Template branding.
    pub branding: EventBranding,
}

/// Sweep result for one email.
#[derive(Debug, Clone, Copy, Default)]
struct SweepOutcome {
    deleted: usize,
    matched: usize,
    failed: usize,
}

/// Reconciliation engine.
#[derive(Clone)]
pub struct ReconciliationService<D, N, L, R> {
    ports: ReconciliationPorts<D, N, L, R>,
    config: ReconciliationConfig,
}

impl<D, N, L, R> ReconciliationService<D, N, L, R>
where
    D: DirectoryClient,
    N: Notifier,
    L: LedgerStorage,
    R: RegistrationSource,
{
    /// Create an engine.
    pub fn new(ports: ReconciliationPorts<D, N, L, R>, config: ReconciliationConfig) -> Self {
        Self { ports, config }
    }

    /// Run all six phases.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ServiceUnavailable`](super::ErrorCode) when the
    /// initial roster cannot be fetched; nothing has been changed by then.
    pub async fn run(&self) -> Result<ReconciliationReport, Error> {
        let run_id = Uuid::new_v4();
        let span = info_span!("reconciliation", %run_id, group_id = %self.config.group_id);
        async move {
            let mut report = ReconciliationReport::new(run_id);
            let snapshot = self.fetch_snapshot().await?;
            let mut ledger = ParticipantLedger::open(Arc::clone(&self.ports.ledger)).await;

            self.ingest_members(&mut ledger, &snapshot, &mut report).await;
            self.notify_participants(&ledger, &mut report).await;
            self.retire_group_members(&ledger, &snapshot, &mut report).await;
            self.retire_tenant_members(&ledger, &snapshot, &mut report).await;
            self.retire_ledger_participants(&ledger, &mut report).await;
            self.process_late_registrations(&mut ledger, &mut report)
                .await;

            info!(
                added = report.ingest.added,
                emailed = report.notify.sent,
                removed_from_group = report.retire_group.removed,
                removed_from_tenant = report.retire_tenant.deleted,
                swept_from_tenant = report.retire_ledger.deleted,
                late_added = report.late_registrations.added,
                failures = report.failures.len(),
                "reconciliation pass finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Run phase 1 alone: merge the roster into the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ServiceUnavailable`](super::ErrorCode) when the
    /// roster cannot be fetched.
    pub async fn ingest(&self) -> Result<ReconciliationReport, Error> {
        let run_id = Uuid::new_v4();
        let span = info_span!("ingest", %run_id, group_id = %self.config.group_id);
        async move {
            let mut report = ReconciliationReport::new(run_id);
            let snapshot = self.fetch_snapshot().await?;
            let mut ledger = ParticipantLedger::open(Arc::clone(&self.ports.ledger)).await;
            self.ingest_members(&mut ledger, &snapshot, &mut report).await;
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Fetch the configured group's roster.
    ///
    /// # Errors
    ///
    /// Maps any directory failure to a service-unavailable domain error.
    pub async fn fetch_snapshot(&self) -> Result<MembershipSnapshot, Error> {
        let snapshot = self
            .ports
            .directory
            .group_members(&self.config.group_id)
            .await
            .map_err(|error| {
                Error::service_unavailable(format!(
                    "failed to fetch members of group {}: {error}",
                    self.config.group_id
                ))
            })?;
        info!(members = snapshot.len(), "group roster fetched");
        Ok(snapshot)
    }

    /// Phase 1: append every roster member with an email to the ledger.
    pub async fn ingest_members(
        &self,
        ledger: &mut ParticipantLedger<L>,
        snapshot: &MembershipSnapshot,
        report: &mut ReconciliationReport,
    ) {
        report.ingest.members_seen += snapshot.len();
        for member in &snapshot.members {
            let Some(email) = member.email() else {
                debug!(member_id = %member.id, display_name = member.label(), "skipping member without email");
                report.ingest.skipped_without_email += 1;
                continue;
            };
            let record = ParticipantRecord::from_display_name(member.display_name.as_deref(), email);
            match ledger.append_if_new(&record).await {
                Ok(AppendOutcome::Added) => {
                    info!(email = %record.email, display_name = member.label(), "participant recorded");
                    report.ingest.added += 1;
                }
                Ok(AppendOutcome::AlreadyPresent) => {
                    debug!(email = %record.email, "participant already recorded");
                    report.ingest.already_known += 1;
                }
                Err(error) => {
                    warn!(email = %record.email, error = %error, "failed to record participant");
                    report.ingest.failed += 1;
                    report.record_failure(Phase::Ingest, record.email.as_str(), error.to_string());
                }
            }
        }
    }

    /// Phase 2: thank every ledger participant.
    ///
    /// There is no sent-tracking; every pass mails every participant.
    pub async fn notify_participants(
        &self,
        ledger: &ParticipantLedger<L>,
        report: &mut ReconciliationReport,
    ) {
        for record in ledger.records().await {
            if self.send_thank_you(&record, Phase::Notify, report).await {
                report.notify.sent += 1;
            } else {
                report.notify.failed += 1;
            }
        }
    }

    /// Phase 3: remove every roster member from the group.
    pub async fn retire_group_members(
        &self,
        ledger: &ParticipantLedger<L>,
        snapshot: &MembershipSnapshot,
        report: &mut ReconciliationReport,
    ) {
        for member in &snapshot.members {
            if !is_tracked(ledger, member, Phase::RetireGroup, report) {
                report.retire_group.held_back += 1;
                continue;
            }
            match self
                .ports
                .directory
                .remove_group_member(&snapshot.group_id, &member.id)
                .await
            {
                Ok(()) => {
                    info!(member_id = %member.id, display_name = member.label(), "member removed from group");
                    report.retire_group.removed += 1;
                }
                Err(error) if error.is_not_found() => {
                    debug!(member_id = %member.id, "member already absent from group");
                    report.retire_group.already_absent += 1;
                }
                Err(error) => {
                    warn!(member_id = %member.id, error = %error, error_kind = error.kind(), "failed to remove member from group");
                    report.retire_group.failed += 1;
                    report.record_failure(Phase::RetireGroup, member.id.as_str(), error.to_string());
                }
            }
        }
    }

    /// Phase 4: delete roster members that are user accounts.
    ///
    /// Objects typed as anything but a user are never passed to
    /// `delete_user`. Untyped objects are probed with a user lookup first.
    pub async fn retire_tenant_members(
        &self,
        ledger: &ParticipantLedger<L>,
        snapshot: &MembershipSnapshot,
        report: &mut ReconciliationReport,
    ) {
        for member in &snapshot.members {
            if !is_tracked(ledger, member, Phase::RetireTenant, report) {
                report.retire_tenant.held_back += 1;
                continue;
            }
            match self.is_user(member).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(member_id = %member.id, kind = ?member.kind, "skipping non-user directory object");
                    report.retire_tenant.skipped_non_user += 1;
                    continue;
                }
                Err(error) => {
                    warn!(member_id = %member.id, error = %error, "could not determine object type; not deleting");
                    report.retire_tenant.failed += 1;
                    report.record_failure(Phase::RetireTenant, member.id.as_str(), error.to_string());
                    continue;
                }
            }
            match self.ports.directory.delete_user(&member.id).await {
                Ok(DeleteOutcome::Deleted) => {
                    info!(member_id = %member.id, display_name = member.label(), "user removed from tenant");
                    report.retire_tenant.deleted += 1;
                }
                Ok(DeleteOutcome::NotFound) => {
                    debug!(member_id = %member.id, "user already absent from tenant");
                    report.retire_tenant.not_found += 1;
                }
                Err(error) => {
                    warn!(member_id = %member.id, error = %error, error_kind = error.kind(), "failed to remove user from tenant");
                    report.retire_tenant.failed += 1;
                    report.record_failure(Phase::RetireTenant, member.id.as_str(), error.to_string());
                }
            }
        }
    }

    /// Phase 5: delete every account matching a ledger email or its UPN.
    pub async fn retire_ledger_participants(
        &self,
        ledger: &ParticipantLedger<L>,
        report: &mut ReconciliationReport,
    ) {
        for record in ledger.records().await {
            report.retire_ledger.participants_seen += 1;
            let outcome = self
                .sweep_tenant(&record.email, Phase::RetireLedger, report)
                .await;
            report.retire_ledger.deleted += outcome.deleted;
            report.retire_ledger.failed += outcome.failed;
            if outcome.matched == 0 && outcome.failed == 0 {
                report.retire_ledger.no_match += 1;
            }
        }
    }

    /// Phase 6: merge late registrations and retire each newly merged one.
    pub async fn process_late_registrations(
        &self,
        ledger: &mut ParticipantLedger<L>,
        report: &mut ReconciliationReport,
    ) {
        let registrations = match self.ports.registrations.late_registrations().await {
            Ok(registrations) => registrations,
            Err(error) => {
                warn!(error = %error, "late registrations unreadable; skipping phase");
                report.record_failure(Phase::LateRegistrations, "late registrations", error.to_string());
                return;
            }
        };
        report.late_registrations.registrations_seen += registrations.len();
        if registrations.is_empty() {
            return;
        }
        let member_index = self.open_member_index(report).await;

        for registration in registrations {
            let record = ParticipantRecord {
                first_name: registration.first_name,
                email: registration.email.to_lowercase(),
            };
            match ledger.append_if_new(&record).await {
                Ok(AppendOutcome::Added) => {
                    info!(email = %record.email, "late registrant recorded");
                    report.late_registrations.added += 1;
                }
                Ok(AppendOutcome::AlreadyPresent) => {
                    debug!(email = %record.email, "late registrant already recorded");
                    report.late_registrations.already_known += 1;
                    continue;
                }
                Err(error) => {
                    warn!(email = %record.email, error = %error, "failed to record late registrant");
                    report.late_registrations.failed += 1;
                    report.record_failure(Phase::LateRegistrations, record.email.as_str(), error.to_string());
                    continue;
                }
            }

            if self
                .send_thank_you(&record, Phase::LateRegistrations, report)
                .await
            {
                report.late_registrations.emailed += 1;
            } else {
                report.late_registrations.failed += 1;
            }

            if let Some(member) = member_index.get(&record.email.key()) {
                self.remove_late_member(member, &record.email, report).await;
            }

            let outcome = self
                .sweep_tenant(&record.email, Phase::LateRegistrations, report)
                .await;
            report.late_registrations.removed_from_tenant += outcome.deleted;
            report.late_registrations.failed += outcome.failed;
        }
    }

    async fn open_member_index(
        &self,
        report: &mut ReconciliationReport,
    ) -> HashMap<String, DirectoryMember> {
        match self
            .ports
            .directory
            .group_members(&self.config.group_id)
            .await
        {
            Ok(snapshot) => snapshot.email_index(),
            Err(error) => {
                warn!(error = %error, "could not re-fetch group roster; late registrants will not be removed from the group");
                report.record_failure(
                    Phase::LateRegistrations,
                    self.config.group_id.as_str(),
                    error.to_string(),
                );
                HashMap::new()
            }
        }
    }

    async fn remove_late_member(
        &self,
        member: &DirectoryMember,
        email: &EmailAddress,
        report: &mut ReconciliationReport,
    ) {
        match self
            .ports
            .directory
            .remove_group_member(&self.config.group_id, &member.id)
            .await
        {
            Ok(()) => {
                info!(email = %email, member_id = %member.id, "late registrant removed from group");
                report.late_registrations.removed_from_group += 1;
            }
            Err(error) if error.is_not_found() => {
                debug!(email = %email, member_id = %member.id, "late registrant already absent from group");
            }
            Err(error) => {
                warn!(email = %email, member_id = %member.id, error = %error, "failed to remove late registrant from group");
                report.late_registrations.failed += 1;
                report.record_failure(Phase::LateRegistrations, email.as_str(), error.to_string());
            }
        }
    }

    async fn send_thank_you(
        &self,
        record: &ParticipantRecord,
        phase: Phase,
        report: &mut ReconciliationReport,
    ) -> bool {
        let message = self
            .config
            .branding
            .thank_you(&record.email, &record.first_name);
        match self.ports.notifier.send(&message).await {
            Ok(()) => {
                info!(email = %record.email, phase = %phase, "thank-you email sent");
                true
            }
            Err(error) => {
                warn!(email = %record.email, phase = %phase, error = %error, "failed to send thank-you email");
                report.record_failure(phase, record.email.as_str(), error.to_string());
                false
            }
        }
    }

    async fn is_user(&self, member: &DirectoryMember) -> Result<bool, DirectoryError> {
        match member.kind {
            DirectoryObjectKind::User => Ok(true),
            DirectoryObjectKind::Unknown => self
                .ports
                .directory
                .get_user(&member.id)
                .await
                .map(|account| account.is_some()),
            _ => Ok(false),
        }
    }

    /// Delete every account whose mail is `email` or whose UPN is the one
    /// derived from it.
    async fn sweep_tenant(
        &self,
        email: &EmailAddress,
        phase: Phase,
        report: &mut ReconciliationReport,
    ) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let upn = match UserPrincipalName::derive(email, &self.config.organizational_domain) {
            Ok(upn) => upn,
            Err(error) => {
                warn!(email = %email, error = %error, "cannot derive user principal name");
                report.record_failure(phase, email.as_str(), error.to_string());
                outcome.failed += 1;
                return outcome;
            }
        };
        let filter = UserFilter::ByMailOrUserPrincipalName {
            mail: email.to_lowercase(),
            upn: upn.clone(),
        };
        let accounts = match self.ports.directory.find_users(&filter).await {
            Ok(accounts) => accounts,
            Err(error) => {
                warn!(email = %email, user_principal_name = %upn, error = %error, "user lookup failed");
                report.record_failure(phase, email.as_str(), error.to_string());
                outcome.failed += 1;
                return outcome;
            }
        };
        if accounts.is_empty() {
            debug!(email = %email, user_principal_name = %upn, "no tenant account matches participant");
        }
        outcome.matched = accounts.len();
        for account in accounts {
            match self.ports.directory.delete_user(&account.id).await {
                Ok(DeleteOutcome::Deleted) => {
                    info!(email = %email, user_id = %account.id, display_name = account.label(), "user removed from tenant");
                    outcome.deleted += 1;
                }
                Ok(DeleteOutcome::NotFound) => {
                    debug!(email = %email, user_id = %account.id, "user already absent from tenant");
                }
                Err(error) => {
                    warn!(email = %email, user_id = %account.id, error = %error, "failed to remove user from tenant");
                    report.record_failure(phase, email.as_str(), error.to_string());
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}

/// Whether a roster member may be acted on. Members without an email cannot
/// be recorded and are acted on directly; members with one must already be
/// in the ledger.
fn is_tracked<L: LedgerStorage>(
    ledger: &ParticipantLedger<L>,
    member: &DirectoryMember,
    phase: Phase,
    report: &mut ReconciliationReport,
) -> bool {
    let Some(email) = member.email() else {
        return true;
    };
    if ledger.contains(&email) {
        return true;
    }
    warn!(member_id = %member.id, email = %email, phase = %phase, "member is not in the ledger; leaving it in place");
    report.record_failure(phase, email.as_str(), "participant missing from ledger");
    false
}
