//! Participant identity: email keys, organisational domain, derived UPNs.
//!
//! The ledger and the directory share no identifier. The join key between them
//! is the user principal name derived from a participant's email local part
//! plus the tenant's organisational domain.

use std::fmt;

/// Display name used when a directory member carries none.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown User";

/// Validation errors raised while building participant values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParticipantValidationError {
    /// The email was absent or blank.
    #[error("email must not be empty")]
    EmptyEmail,
    /// The email has nothing before its first `@`.
    #[error("email '{email}' has no local part")]
    MissingLocalPart { email: String },
    /// The organisational domain is blank or malformed.
    #[error("organisational domain '{domain}' is invalid")]
    InvalidDomain { domain: String },
}

/// An email address as observed in a roster, ledger or intake file.
///
/// The original casing is preserved for display and for the ledger row; all
/// comparisons go through [`EmailAddress::key`].
///
/// # Examples
/// ```
/// use roster::domain::EmailAddress;
///
/// let email = EmailAddress::parse(" Ann.B@Example.com ").expect("valid");
/// assert_eq!(email.as_str(), "Ann.B@Example.com");
/// assert_eq!(email.key(), "ann.b@example.com");
/// assert_eq!(email.local_part(), "Ann.B");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Trim and validate a raw email value.
    pub fn parse(raw: &str) -> Result<Self, ParticipantValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParticipantValidationError::EmptyEmail);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Parse an optional attribute, treating absence and blanks alike.
    pub fn from_optional(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| Self::parse(value).ok())
    }

    /// The email as observed.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Case-insensitive dedup key.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Substring before the first `@`, or the whole value when there is none.
    pub fn local_part(&self) -> &str {
        self.0
            .split_once('@')
            .map_or(self.0.as_str(), |(local, _)| local)
    }

    /// Lowercased copy, used when a source's casing is not trusted.
    pub fn to_lowercase(&self) -> Self {
        Self(self.key())
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed domain every provisioned account's UPN lives under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationalDomain(String);

impl OrganizationalDomain {
    /// Validate and normalise a domain such as `aiskillsfest.net`.
    pub fn parse(raw: &str) -> Result<Self, ParticipantValidationError> {
        let domain = raw.trim().trim_start_matches('@').to_lowercase();
        let valid = !domain.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && domain
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '.' || ch == '-');
        if !valid {
            return Err(ParticipantValidationError::InvalidDomain {
                domain: raw.to_owned(),
            });
        }
        Ok(Self(domain))
    }

    /// The domain without a leading `@`.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for OrganizationalDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directory login identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserPrincipalName(String);

impl UserPrincipalName {
    /// Derive `{local part}@{domain}` from a participant email.
    ///
    /// The local part is lowercased; the directory treats UPNs
    /// case-insensitively.
    ///
    /// # Examples
    /// ```
    /// use roster::domain::{EmailAddress, OrganizationalDomain, UserPrincipalName};
    ///
    /// let domain = OrganizationalDomain::parse("aiskillsfest.net").expect("domain");
    /// let email = EmailAddress::parse("jane.doe@gmail.com").expect("email");
    /// let upn = UserPrincipalName::derive(&email, &domain).expect("upn");
    /// assert_eq!(upn.as_str(), "jane.doe@aiskillsfest.net");
    /// ```
    pub fn derive(
        email: &EmailAddress,
        domain: &OrganizationalDomain,
    ) -> Result<Self, ParticipantValidationError> {
        let local = email.local_part().trim();
        if local.is_empty() {
            return Err(ParticipantValidationError::MissingLocalPart {
                email: email.as_str().to_owned(),
            });
        }
        Ok(Self(format!("{}@{domain}", local.to_lowercase())))
    }

    /// Wrap a UPN reported by the directory.
    pub fn from_directory(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The part before `@`, used as the account's mail nickname.
    pub fn handle(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(h, _)| h)
    }

    /// The UPN text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for UserPrincipalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One participant row in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    /// Given name used to address the participant.
    pub first_name: String,
    /// Unique (case-insensitive) key.
    pub email: EmailAddress,
}

impl ParticipantRecord {
    /// Build a record from a directory display name.
    ///
    /// The first whitespace-separated token becomes the first name; a missing
    /// display name falls back to [`UNKNOWN_DISPLAY_NAME`].
    ///
    /// # Examples
    /// ```
    /// use roster::domain::{EmailAddress, ParticipantRecord};
    ///
    /// let email = EmailAddress::parse("a@b.com").expect("email");
    /// let record = ParticipantRecord::from_display_name(Some("Ann B"), email);
    /// assert_eq!(record.first_name, "Ann");
    /// ```
    pub fn from_display_name(display_name: Option<&str>, email: EmailAddress) -> Self {
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_DISPLAY_NAME);
        let first_name = display_name
            .split_whitespace()
            .next()
            .unwrap_or(UNKNOWN_DISPLAY_NAME)
            .to_owned();
        Self { first_name, email }
    }
}
