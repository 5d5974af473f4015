//! Driven port for the remote identity directory.
//!
//! The reconciliation engine and the provisioning flow talk to the directory
//! only through this trait. A miss on an addressed object is reported as
//! [`DirectoryError::NotFound`] (or as `Ok(None)` / [`DeleteOutcome::NotFound`]
//! where the operation has a natural "absent" answer) so callers can treat it
//! as a normal outcome rather than a failure.

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::directory::{
    DeleteOutcome, DirectoryAccount, DirectoryObjectId, GroupId, MembershipSnapshot, NewAccount,
    UserFilter,
};
use crate::domain::licenses::SkuId;

define_port_error! {
    /// Errors surfaced while calling the directory.
    pub enum DirectoryError {
        /// Network transport failed or the service returned a server error.
        Transport { message: String } =>
            "directory transport failed: {message}",
        /// Token acquisition failed or the caller lacks permission.
        Authentication { message: String } =>
            "directory authentication failed: {message}",
        /// The addressed object does not exist.
        NotFound { message: String } =>
            "directory object not found: {message}",
        /// The directory refused the request as invalid.
        Rejected { message: String } =>
            "directory rejected request: {message}",
        /// The directory throttled the caller.
        RateLimited { message: String } =>
            "directory rate limited request: {message}",
        /// The response could not be decoded.
        Decode { message: String } =>
            "directory response decode failed: {message}",
    }
}

impl DirectoryError {
    /// Whether the failure is a "not found" miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Port for directory reads and writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Fetch the full roster of a group, following pagination.
    async fn group_members(&self, group_id: &GroupId)
    -> Result<MembershipSnapshot, DirectoryError>;

    /// Create a user account.
    async fn create_user(&self, account: &NewAccount) -> Result<DirectoryAccount, DirectoryError>;

    /// Delete a user account. A missing account yields [`DeleteOutcome::NotFound`].
    async fn delete_user(&self, user_id: &DirectoryObjectId)
    -> Result<DeleteOutcome, DirectoryError>;

    /// Add a directory object to a group.
    async fn add_group_member(
        &self,
        group_id: &GroupId,
        member_id: &DirectoryObjectId,
    ) -> Result<(), DirectoryError>;

    /// Remove a directory object from a group.
    async fn remove_group_member(
        &self,
        group_id: &GroupId,
        member_id: &DirectoryObjectId,
    ) -> Result<(), DirectoryError>;

    /// List users matching a filter. No match is an empty list.
    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<DirectoryAccount>, DirectoryError>;

    /// Look up a user by id. A missing user yields `Ok(None)`.
    async fn get_user(
        &self,
        user_id: &DirectoryObjectId,
    ) -> Result<Option<DirectoryAccount>, DirectoryError>;

    /// Assign license SKUs to a user.
    async fn assign_licenses(
        &self,
        user_id: &DirectoryObjectId,
        skus: &[SkuId],
    ) -> Result<(), DirectoryError>;
}
