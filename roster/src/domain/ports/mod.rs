//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod directory_client;
mod ledger_storage;
mod notifier;
mod password_generator;
mod registration_source;

#[cfg(test)]
pub use directory_client::MockDirectoryClient;
pub use directory_client::{DirectoryClient, DirectoryError};
#[cfg(test)]
pub use ledger_storage::MockLedgerStorage;
pub use ledger_storage::{LedgerError, LedgerStorage};
#[cfg(test)]
pub use notifier::MockNotifier;
pub use notifier::{Notifier, NotifierError, OutboundEmail};
#[cfg(test)]
pub use password_generator::MockPasswordGenerator;
pub use password_generator::PasswordGenerator;
#[cfg(test)]
pub use registration_source::MockRegistrationSource;
pub use registration_source::{IntakeRow, RegistrationSource, RegistrationSourceError};
