//! Driven port for outbound email.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::participant::EmailAddress;

/// A rendered HTML message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    /// Primary recipient.
    pub to: EmailAddress,
    /// Carbon-copy recipients.
    pub cc: Vec<EmailAddress>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
}

define_port_error! {
    /// Errors surfaced while sending mail.
    pub enum NotifierError {
        /// No mail transport is configured for this run.
        Disabled =>
            "notifications are disabled",
        /// A recipient or sender address could not be used.
        InvalidAddress { message: String } =>
            "invalid email address: {message}",
        /// The transport failed or the server refused the message.
        Transport { message: String } =>
            "mail transport failed: {message}",
    }
}

/// Port for sending one message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `email`. Each call is independent; there is no batching.
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotifierError>;
}
