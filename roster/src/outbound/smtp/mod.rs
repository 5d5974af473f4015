//! SMTP adapters for the notifier port.
//!
//! [`LettreNotifier`] relays HTML mail through an authenticated STARTTLS
//! submission server. [`DisabledNotifier`] stands in when no relay is
//! configured so callers can tell "not sent" apart from "failed".

use std::fmt;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;
use zeroize::Zeroizing;

use crate::domain::EmailAddress;
use crate::domain::ports::{Notifier, NotifierError, OutboundEmail};

/// Connection settings for the submission relay.
#[derive(Clone)]
pub struct SmtpRelaySettings {
    /// Relay host name.
    pub server: String,
    /// Submission port, usually 587.
    pub port: u16,
    /// Sender address, also used as the login name.
    pub sender: EmailAddress,
    /// Login password.
    pub password: Zeroizing<String>,
}

impl fmt::Debug for SmtpRelaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpRelaySettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Notifier backed by a pooled lettre SMTP transport.
pub struct LettreNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl LettreNotifier {
    /// Build the transport. No connection is opened until the first send.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::InvalidAddress`] for an unusable sender and
    /// [`NotifierError::Transport`] when the relay host cannot be resolved
    /// into TLS parameters.
    pub fn new(settings: &SmtpRelaySettings) -> Result<Self, NotifierError> {
        let sender = mailbox(&settings.sender)?;
        let credentials = Credentials::new(
            settings.sender.as_str().to_owned(),
            settings.password.as_str().to_owned(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)
            .map_err(|error| NotifierError::transport(error.to_string()))?
            .port(settings.port)
            .credentials(credentials)
            .build();
        Ok(Self { transport, sender })
    }
}

#[async_trait]
impl Notifier for LettreNotifier {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotifierError> {
        let message = build_message(&self.sender, email)?;
        self.transport
            .send(message)
            .await
            .map_err(|error| NotifierError::transport(error.to_string()))?;
        debug!(to = %email.to.as_str(), subject = %email.subject, "email relayed");
        Ok(())
    }
}

/// Notifier used when SMTP settings are absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _email: &OutboundEmail) -> Result<(), NotifierError> {
        Err(NotifierError::disabled())
    }
}

/// Notifier chosen from configuration: a relay when SMTP settings are
/// present, otherwise [`DisabledNotifier`].
pub enum ConfiguredNotifier {
    /// Mail is relayed.
    Relay(LettreNotifier),
    /// Mail is not configured.
    Disabled(DisabledNotifier),
}

impl ConfiguredNotifier {
    /// Build from optional relay settings.
    ///
    /// # Errors
    ///
    /// Propagates [`LettreNotifier::new`] failures.
    pub fn from_settings(settings: Option<&SmtpRelaySettings>) -> Result<Self, NotifierError> {
        match settings {
            Some(settings) => LettreNotifier::new(settings).map(Self::Relay),
            None => Ok(Self::Disabled(DisabledNotifier)),
        }
    }

    /// Whether mail will actually be sent.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Relay(_))
    }
}

#[async_trait]
impl Notifier for ConfiguredNotifier {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotifierError> {
        match self {
            Self::Relay(relay) => relay.send(email).await,
            Self::Disabled(disabled) => disabled.send(email).await,
        }
    }
}

fn mailbox(address: &EmailAddress) -> Result<Mailbox, NotifierError> {
    address
        .as_str()
        .parse::<Mailbox>()
        .map_err(|error| NotifierError::invalid_address(format!("{}: {error}", address.as_str())))
}

fn build_message(sender: &Mailbox, email: &OutboundEmail) -> Result<Message, NotifierError> {
    let mut builder = Message::builder()
        .from(sender.clone())
        .to(mailbox(&email.to)?)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_HTML);
    for cc in &email.cc {
        builder = builder.cc(mailbox(cc)?);
    }
    builder
        .body(email.html_body.clone())
        .map_err(|error| NotifierError::invalid_address(error.to_string()))
}
