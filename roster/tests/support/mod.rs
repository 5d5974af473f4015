//! Shared helpers for roster integration tests.
//!
//! Integration tests compile as separate crates under `roster/tests/`, so the
//! directory and notifier doubles live here and each test binary pulls them in
//! with `mod support;`.
#![allow(dead_code, reason = "each test binary uses a different subset")]

mod fake_directory;

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use roster::domain::ports::{Notifier, NotifierError, OutboundEmail};
use roster::domain::{
    DirectoryAccount, DirectoryMember, DirectoryObjectId, DirectoryObjectKind, EmailAddress,
    EventBranding, OrganizationalDomain, UserPrincipalName,
};

pub use fake_directory::FakeDirectory;

/// Tenant domain used by every scenario.
pub const TENANT_DOMAIN: &str = "aiskillsfest.net";

/// Notifier double that records every message it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingNotifier {
    /// Every message handed to the notifier, in order.
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("notifier lock").clone()
    }

    /// Primary recipients of every message, in order.
    pub fn recipients(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|email| email.to.as_str().to_owned())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, email: &OutboundEmail) -> Result<(), NotifierError> {
        self.sent.lock().expect("notifier lock").push(email.clone());
        Ok(())
    }
}

/// Group member typed as a user.
pub fn member(id: &str, display_name: &str, mail: &str) -> DirectoryMember {
    DirectoryMember {
        id: DirectoryObjectId::parse(id).expect("member id"),
        display_name: Some(display_name.to_owned()),
        mail: Some(mail.to_owned()),
        kind: DirectoryObjectKind::User,
    }
}

/// Tenant account carrying `mail` and a UPN derived from it.
pub fn account(id: &str, mail: &str) -> DirectoryAccount {
    let email = EmailAddress::parse(mail).expect("account email");
    let upn = UserPrincipalName::derive(&email, &domain()).expect("derived upn");
    DirectoryAccount {
        id: DirectoryObjectId::parse(id).expect("account id"),
        user_principal_name: Some(upn),
        display_name: None,
        mail: Some(mail.to_owned()),
        account_enabled: Some(true),
    }
}

/// Organizational domain for [`TENANT_DOMAIN`].
pub fn domain() -> OrganizationalDomain {
    OrganizationalDomain::parse(TENANT_DOMAIN).expect("domain")
}

/// Event branding used in rendered emails.
pub fn branding() -> EventBranding {
    EventBranding {
        event_name: "AI Skills Fest".to_owned(),
        event_url: "https://aiskillsfest.net".to_owned(),
        admin_cc: EmailAddress::parse("admins@aiskillsfest.net").expect("admin cc"),
    }
}

/// Read a file the scenario expects to exist.
pub fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path).expect("read file")
}
