//! Per-pass tallies and per-record failures.
//!
//! Reports are accumulated in memory during one pass and handed to the caller;
//! nothing here is persisted.

use std::fmt;

use uuid::Uuid;

/// Reconciliation phase a record was processed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Roster members merged into the ledger.
    Ingest,
    /// Thank-you notes to ledger participants.
    Notify,
    /// Group membership removal.
    RetireGroup,
    /// Snapshot-driven tenant deletion.
    RetireTenant,
    /// Ledger-driven tenant sweep by email and UPN.
    RetireLedger,
    /// Late registrations merged, notified and retired.
    LateRegistrations,
}

impl Phase {
    /// Snake-case label used in logs and reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Notify => "notify",
            Self::RetireGroup => "retire_group",
            Self::RetireTenant => "retire_tenant",
            Self::RetireLedger => "retire_ledger",
            Self::LateRegistrations => "late_registrations",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// Phase the failure happened in.
    pub phase: Phase,
    /// Email, object id or source name the failure concerns.
    pub subject: String,
    /// Human-readable cause.
    pub reason: String,
}

/// Phase 1 counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestTally {
    /// Members in the roster snapshot.
    pub members_seen: usize,
    /// New ledger rows written.
    pub added: usize,
    /// Members whose email was already recorded.
    pub already_known: usize,
    /// Members skipped for lack of an email.
    pub skipped_without_email: usize,
    /// Rows that could not be written.
    pub failed: usize,
}

/// Notification counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyTally {
    /// Messages handed to the transport.
    pub sent: usize,
    /// Messages that failed.
    pub failed: usize,
}

/// Phase 3 counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupRetirementTally {
    /// Memberships removed.
    pub removed: usize,
    /// Members the directory no longer listed.
    pub already_absent: usize,
    /// Members held back because their email never reached the ledger.
    pub held_back: usize,
    /// Removals that failed.
    pub failed: usize,
}

/// Phase 4 counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TenantRetirementTally {
    /// Accounts deleted.
    pub deleted: usize,
    /// Accounts already gone.
    pub not_found: usize,
    /// Non-user objects left alone.
    pub skipped_non_user: usize,
    /// Members held back because their email never reached the ledger.
    pub held_back: usize,
    /// Deletions or type probes that failed.
    pub failed: usize,
}

/// Phase 5 counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSweepTally {
    /// Ledger participants examined.
    pub participants_seen: usize,
    /// Accounts deleted.
    pub deleted: usize,
    /// Participants with no matching account.
    pub no_match: usize,
    /// Lookups or deletions that failed.
    pub failed: usize,
}

/// Phase 6 counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LateRegistrationTally {
    /// Late registrations read.
    pub registrations_seen: usize,
    /// New ledger rows written.
    pub added: usize,
    /// Registrations already recorded.
    pub already_known: usize,
    /// Thank-you notes sent.
    pub emailed: usize,
    /// Memberships removed.
    pub removed_from_group: usize,
    /// Accounts deleted.
    pub removed_from_tenant: usize,
    /// Per-record steps that failed.
    pub failed: usize,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Correlates the report with the pass's log lines.
    pub run_id: Uuid,
    /// Phase 1.
    pub ingest: IngestTally,
    /// Phase 2.
    pub notify: NotifyTally,
    /// Phase 3.
    pub retire_group: GroupRetirementTally,
    /// Phase 4.
    pub retire_tenant: TenantRetirementTally,
    /// Phase 5.
    pub retire_ledger: LedgerSweepTally,
    /// Phase 6.
    pub late_registrations: LateRegistrationTally,
    /// Every per-record failure, in the order it happened.
    pub failures: Vec<RecordFailure>,
}

impl ReconciliationReport {
    /// Start an empty report.
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            ingest: IngestTally::default(),
            notify: NotifyTally::default(),
            retire_group: GroupRetirementTally::default(),
            retire_tenant: TenantRetirementTally::default(),
            retire_ledger: LedgerSweepTally::default(),
            late_registrations: LateRegistrationTally::default(),
            failures: Vec::new(),
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        phase: Phase,
        subject: impl Into<String>,
        reason: impl Into<String>,
    ) {
        self.failures.push(RecordFailure {
            phase,
            subject: subject.into(),
            reason: reason.into(),
        });
    }

    /// Failures recorded for one phase.
    pub fn failures_in(&self, phase: Phase) -> impl Iterator<Item = &RecordFailure> {
        self.failures
            .iter()
            .filter(move |failure| failure.phase == phase)
    }

    /// Whether every record completed without failure.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
