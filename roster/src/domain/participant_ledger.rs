//! Dedup-aware session over the participant ledger.
//!
//! The dedup set is rebuilt from storage when a session is opened and mutated
//! in memory as rows are appended, so later appends in the same run see
//! earlier ones. Concurrent writers are not supported.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::participant::{EmailAddress, ParticipantRecord};
use super::ports::{LedgerError, LedgerStorage};

/// Result of [`ParticipantLedger::append_if_new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A row was written.
    Added,
    /// The email was already known; nothing was written.
    AlreadyPresent,
}

impl AppendOutcome {
    /// Whether a row was written.
    pub fn is_added(self) -> bool {
        matches!(self, Self::Added)
    }
}

/// An open ledger session.
pub struct ParticipantLedger<L> {
    storage: Arc<L>,
    known: HashSet<String>,
}

impl<L> ParticipantLedger<L>
where
    L: LedgerStorage,
{
    /// Open a session, loading the dedup set from storage.
    ///
    /// An unreadable ledger is logged and treated as empty.
    pub async fn open(storage: Arc<L>) -> Self {
        let known = match storage.read_all().await {
            Ok(records) => records.iter().map(|record| record.email.key()).collect(),
            Err(error) => {
                warn!(error = %error, "ledger unreadable; starting with no known participants");
                HashSet::new()
            }
        };
        debug!(known = known.len(), "ledger session opened");
        Self { storage, known }
    }

    /// Whether the email is already recorded (case-insensitive).
    pub fn contains(&self, email: &EmailAddress) -> bool {
        self.known.contains(&email.key())
    }

    /// Number of distinct emails known to the session.
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Whether the session knows no participants.
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Append `record` unless its email is already known.
    ///
    /// # Errors
    ///
    /// Returns the storage error when the row cannot be written; the email is
    /// then left out of the dedup set so a later attempt can retry it.
    pub async fn append_if_new(
        &mut self,
        record: &ParticipantRecord,
    ) -> Result<AppendOutcome, LedgerError> {
        let key = record.email.key();
        if self.known.contains(&key) {
            return Ok(AppendOutcome::AlreadyPresent);
        }
        self.storage.append(record).await?;
        self.known.insert(key);
        Ok(AppendOutcome::Added)
    }

    /// Read every stored record afresh.
    ///
    /// Rows repeating an earlier email are dropped. An unreadable ledger is
    /// logged and yields no records.
    pub async fn records(&self) -> Vec<ParticipantRecord> {
        match self.storage.read_all().await {
            Ok(records) => {
                let mut seen = HashSet::with_capacity(records.len());
                records
                    .into_iter()
                    .filter(|record| seen.insert(record.email.key()))
                    .collect()
            }
            Err(error) => {
                warn!(error = %error, "ledger unreadable; no participants to process");
                Vec::new()
            }
        }
    }
}
