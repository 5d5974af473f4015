//! Wire shapes for the Graph REST API.
//!
//! Responses decode into these DTOs first and are mapped onto directory
//! domain types in one pass. Request bodies borrow from the domain values so
//! secrets are never cloned into long-lived buffers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    DirectoryAccount, DirectoryMember, DirectoryObjectId, DirectoryObjectKind, NewAccount,
    UserPrincipalName,
};

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponseDto {
    pub(super) access_token: String,
    pub(super) expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct ODataPageDto<T> {
    #[serde(default = "Vec::new")]
    pub(super) value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub(super) next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DirectoryObjectDto {
    #[serde(rename = "@odata.type")]
    pub(super) odata_type: Option<String>,
    pub(super) id: Option<String>,
    pub(super) display_name: Option<String>,
    pub(super) mail: Option<String>,
}

impl DirectoryObjectDto {
    pub(super) fn into_member(self) -> Result<DirectoryMember, String> {
        let id = parse_id(self.id.as_deref(), "group member")?;
        Ok(DirectoryMember {
            id,
            display_name: non_blank(self.display_name),
            mail: non_blank(self.mail),
            kind: DirectoryObjectKind::from_odata_type(self.odata_type.as_deref()),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UserDto {
    pub(super) id: Option<String>,
    pub(super) user_principal_name: Option<String>,
    pub(super) display_name: Option<String>,
    pub(super) mail: Option<String>,
    pub(super) account_enabled: Option<bool>,
}

impl UserDto {
    pub(super) fn into_account(self) -> Result<DirectoryAccount, String> {
        let id = parse_id(self.id.as_deref(), "user")?;
        Ok(DirectoryAccount {
            id,
            user_principal_name: non_blank(self.user_principal_name)
                .map(UserPrincipalName::from_directory),
            display_name: non_blank(self.display_name),
            mail: non_blank(self.mail),
            account_enabled: self.account_enabled,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateUserRequestDto<'a> {
    account_enabled: bool,
    display_name: &'a str,
    given_name: &'a str,
    surname: &'a str,
    user_principal_name: &'a str,
    mail_nickname: &'a str,
    mail: &'a str,
    password_profile: PasswordProfileDto<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordProfileDto<'a> {
    force_change_password_next_sign_in: bool,
    password: &'a str,
}

impl<'a> From<&'a NewAccount> for CreateUserRequestDto<'a> {
    fn from(account: &'a NewAccount) -> Self {
        Self {
            account_enabled: true,
            display_name: &account.display_name,
            given_name: &account.given_name,
            surname: &account.surname,
            user_principal_name: account.user_principal_name.as_str(),
            mail_nickname: &account.mail_nickname,
            mail: account.mail.as_str(),
            password_profile: PasswordProfileDto {
                force_change_password_next_sign_in: account.force_change_password,
                password: account.password.expose(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ReferenceRequestDto {
    #[serde(rename = "@odata.id")]
    pub(super) odata_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AssignLicenseRequestDto {
    pub(super) add_licenses: Vec<AssignedLicenseDto>,
    pub(super) remove_licenses: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AssignedLicenseDto {
    pub(super) sku_id: Uuid,
    pub(super) disabled_plans: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ODataErrorDto {
    pub(super) error: ODataErrorBodyDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct ODataErrorBodyDto {
    #[serde(default)]
    pub(super) code: String,
    #[serde(default)]
    pub(super) message: String,
}

fn parse_id(raw: Option<&str>, what: &str) -> Result<DirectoryObjectId, String> {
    let raw = raw.ok_or_else(|| format!("{what} is missing an id"))?;
    DirectoryObjectId::parse(raw).map_err(|error| format!("{what} id is invalid: {error}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|inner| !inner.trim().is_empty())
}
