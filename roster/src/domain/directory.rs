//! Directory-side entities: group rosters, accounts, filters.
//!
//! Every attribute the directory may omit is an `Option`. Callers check
//! presence through the type system instead of probing response objects.

use std::collections::HashMap;
use std::fmt;

use zeroize::Zeroizing;

use super::participant::{EmailAddress, UserPrincipalName};

/// Validation errors for directory identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryValidationError {
    /// A group or object identifier was blank.
    #[error("{kind} identifier must not be empty")]
    EmptyIdentifier { kind: &'static str },
}

/// Identifier of a directory group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupId(String);

impl GroupId {
    /// Validate a group identifier.
    pub fn parse(raw: &str) -> Result<Self, DirectoryValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DirectoryValidationError::EmptyIdentifier { kind: "group" });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory-assigned identifier of a user or other directory object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectoryObjectId(String);

impl DirectoryObjectId {
    /// Validate an object identifier.
    pub fn parse(raw: &str) -> Result<Self, DirectoryValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DirectoryValidationError::EmptyIdentifier { kind: "object" });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DirectoryObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type metadata attached to a group member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryObjectKind {
    /// A user account.
    User,
    /// A nested group.
    Group,
    /// An application identity.
    ServicePrincipal,
    /// A registered device.
    Device,
    /// Another reported type, kept verbatim.
    Other(String),
    /// The directory reported no type metadata.
    Unknown,
}

impl DirectoryObjectKind {
    /// Map an OData type tag such as `#microsoft.graph.user`.
    ///
    /// # Examples
    /// ```
    /// use roster::domain::DirectoryObjectKind;
    ///
    /// assert_eq!(
    ///     DirectoryObjectKind::from_odata_type(Some("#microsoft.graph.user")),
    ///     DirectoryObjectKind::User
    /// );
    /// assert_eq!(DirectoryObjectKind::from_odata_type(None), DirectoryObjectKind::Unknown);
    /// ```
    pub fn from_odata_type(tag: Option<&str>) -> Self {
        let Some(tag) = tag.map(str::trim).filter(|tag| !tag.is_empty()) else {
            return Self::Unknown;
        };
        let name = tag
            .trim_start_matches('#')
            .trim_start_matches("microsoft.graph.");
        match name {
            "user" => Self::User,
            "group" => Self::Group,
            "servicePrincipal" => Self::ServicePrincipal,
            "device" => Self::Device,
            _ => Self::Other(tag.to_owned()),
        }
    }
}

/// One entry in a group roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryMember {
    /// Directory-assigned object id.
    pub id: DirectoryObjectId,
    /// Display name when the directory supplies one.
    pub display_name: Option<String>,
    /// Mail attribute when populated.
    pub mail: Option<String>,
    /// Object type metadata.
    pub kind: DirectoryObjectKind,
}

impl DirectoryMember {
    /// Usable email for this member, if any.
    pub fn email(&self) -> Option<EmailAddress> {
        EmailAddress::from_optional(self.mail.as_deref())
    }

    /// Display label for log lines.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or("unknown")
    }
}

/// A group roster fetched once per pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSnapshot {
    /// Group the roster belongs to.
    pub group_id: GroupId,
    /// Members in directory order.
    pub members: Vec<DirectoryMember>,
}

impl MembershipSnapshot {
    /// Build a snapshot.
    pub fn new(group_id: GroupId, members: Vec<DirectoryMember>) -> Self {
        Self { group_id, members }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Index members by lowercase mail. Members without mail are omitted; the
    /// first member wins when two share an address.
    pub fn email_index(&self) -> HashMap<String, DirectoryMember> {
        let mut index = HashMap::with_capacity(self.members.len());
        for member in &self.members {
            if let Some(email) = member.email() {
                index.entry(email.key()).or_insert_with(|| member.clone());
            }
        }
        index
    }
}

/// A user account as reported by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryAccount {
    /// Directory-assigned id.
    pub id: DirectoryObjectId,
    /// Login identifier.
    pub user_principal_name: Option<UserPrincipalName>,
    /// Display name.
    pub display_name: Option<String>,
    /// Mail attribute.
    pub mail: Option<String>,
    /// Whether sign-in is enabled.
    pub account_enabled: Option<bool>,
}

impl DirectoryAccount {
    /// Display label for log lines.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or("unknown")
    }
}

/// A temporary sign-in secret. Zeroed on drop and redacted in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryPassword(Zeroizing<String>);

impl TemporaryPassword {
    /// Wrap a generated secret.
    pub fn new(secret: String) -> Self {
        Self(Zeroizing::new(secret))
    }

    /// Borrow the secret for transmission.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for TemporaryPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TemporaryPassword(<redacted>)")
    }
}

/// Profile of an account to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    /// `"{given} {surname}"`.
    pub display_name: String,
    /// Given name.
    pub given_name: String,
    /// Surname.
    pub surname: String,
    /// Derived login identifier.
    pub user_principal_name: UserPrincipalName,
    /// Mail nickname, the UPN handle.
    pub mail_nickname: String,
    /// The participant's own email.
    pub mail: EmailAddress,
    /// Initial credential.
    pub password: TemporaryPassword,
    /// Require a password change at first sign-in.
    pub force_change_password: bool,
}

/// Query used to look up existing users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    /// Exact UPN match.
    ByUserPrincipalName(UserPrincipalName),
    /// `mail == email OR userPrincipalName == upn`.
    ByMailOrUserPrincipalName {
        /// Participant email.
        mail: EmailAddress,
        /// Derived UPN.
        upn: UserPrincipalName,
    },
}

/// Result of a delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The object was removed.
    Deleted,
    /// The object did not exist.
    NotFound,
}

#[cfg(test)]
mod tests {
    //! Unit coverage for directory value objects.

    use super::*;
    use rstest::rstest;

    fn member(id: &str, mail: Option<&str>) -> DirectoryMember {
        DirectoryMember {
            id: DirectoryObjectId::parse(id).expect("id"),
            display_name: None,
            mail: mail.map(str::to_owned),
            kind: DirectoryObjectKind::User,
        }
    }

    #[rstest]
    #[case::user(Some("#microsoft.graph.user"), DirectoryObjectKind::User)]
    #[case::group(Some("#microsoft.graph.group"), DirectoryObjectKind::Group)]
    #[case::service_principal(
        Some("#microsoft.graph.servicePrincipal"),
        DirectoryObjectKind::ServicePrincipal
    )]
    #[case::device(Some("#microsoft.graph.device"), DirectoryObjectKind::Device)]
    #[case::other(
        Some("#microsoft.graph.orgContact"),
        DirectoryObjectKind::Other("#microsoft.graph.orgContact".to_owned())
    )]
    #[case::blank(Some("  "), DirectoryObjectKind::Unknown)]
    #[case::missing(None, DirectoryObjectKind::Unknown)]
    fn maps_odata_types(#[case] tag: Option<&str>, #[case] expected: DirectoryObjectKind) {
        assert_eq!(DirectoryObjectKind::from_odata_type(tag), expected);
    }

    #[rstest]
    fn email_index_is_case_insensitive_and_skips_blank_mail() {
        let group = GroupId::parse("g-1").expect("group");
        let snapshot = MembershipSnapshot::new(
            group,
            vec![
                member("1", Some("Ann@B.com")),
                member("2", None),
                member("3", Some(" ")),
                member("4", Some("ann@b.com")),
            ],
        );

        let index = snapshot.email_index();
        assert_eq!(index.len(), 1);
        let first = index.get("ann@b.com").expect("indexed");
        assert_eq!(first.id.as_str(), "1");
    }

    #[rstest]
    fn temporary_password_debug_is_redacted() {
        let secret = TemporaryPassword::new("hunter2!".to_owned());
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2!");
    }

    #[rstest]
    fn rejects_blank_identifiers() {
        assert!(GroupId::parse(" ").is_err());
        assert!(DirectoryObjectId::parse("").is_err());
    }
}
