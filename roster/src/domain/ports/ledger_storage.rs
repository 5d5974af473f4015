//! Driven port for the durable participant ledger.
//!
//! Storage is append-only from the domain's point of view. Dedup is the
//! domain's job (see `ParticipantLedger`); storage just reads and appends rows.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::participant::ParticipantRecord;

define_port_error! {
    /// Errors surfaced by ledger storage.
    pub enum LedgerError {
        /// The ledger exists but could not be read.
        Read { message: String } =>
            "ledger read failed: {message}",
        /// A row could not be written.
        Write { message: String } =>
            "ledger write failed: {message}",
        /// The ledger contents are malformed.
        Decode { message: String } =>
            "ledger decode failed: {message}",
    }
}

/// Port for reading and appending ledger rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Read every stored record. A ledger that does not exist yet is empty.
    async fn read_all(&self) -> Result<Vec<ParticipantRecord>, LedgerError>;

    /// Append one record, creating the ledger with its header when absent.
    async fn append(&self, record: &ParticipantRecord) -> Result<(), LedgerError>;
}
