//! Driven port for registration files read by the engine.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::participant::ParticipantRecord;

/// One row of the provisioning intake file. Fields are as read; validation
/// happens in the provisioning flow so every row still yields a result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeRow {
    /// `Email Address` column.
    pub email: Option<String>,
    /// `First Name` column.
    pub first_name: Option<String>,
    /// `Last Name` column.
    pub last_name: Option<String>,
}

define_port_error! {
    /// Errors surfaced while reading registration sources.
    pub enum RegistrationSourceError {
        /// The source could not be opened or read.
        Read { message: String } =>
            "registration source read failed: {message}",
        /// The source is malformed.
        Decode { message: String } =>
            "registration source decode failed: {message}",
    }
}

/// Port for late registrations and provisioning intake.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistrationSource: Send + Sync {
    /// Participants who registered after the roster snapshot was taken.
    async fn late_registrations(&self) -> Result<Vec<ParticipantRecord>, RegistrationSourceError>;

    /// Rows of the provisioning intake file.
    async fn intake_rows(&self) -> Result<Vec<IntakeRow>, RegistrationSourceError>;
}
