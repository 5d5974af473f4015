//! In-memory directory double that behaves like the Graph adapter.
//!
//! Misses are reported the way the real adapter reports them (`NotFound`,
//! `Ok(None)`, `DeleteOutcome::NotFound`) and every mutating call is logged so
//! scenarios can assert on ordering.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use roster::domain::ports::{DirectoryClient, DirectoryError};
use roster::domain::{
    DeleteOutcome, DirectoryAccount, DirectoryMember, DirectoryObjectId, DirectoryObjectKind,
    GroupId, MembershipSnapshot, NewAccount, SkuId, UserFilter,
};

#[derive(Default)]
struct DirectoryState {
    groups: HashMap<String, Vec<DirectoryMember>>,
    users: Vec<DirectoryAccount>,
    calls: Vec<String>,
    failing_license_users: HashSet<String>,
}

/// Directory double backed by a mutex-guarded state.
#[derive(Default)]
pub struct FakeDirectory {
    state: Mutex<DirectoryState>,
}

impl FakeDirectory {
    fn state(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().expect("directory state lock")
    }

    /// Place a member in a group roster.
    pub fn seed_member(&self, group: &str, member: DirectoryMember) {
        self.state()
            .groups
            .entry(group.to_owned())
            .or_default()
            .push(member);
    }

    /// Create a tenant account.
    pub fn seed_user(&self, account: DirectoryAccount) {
        self.state().users.push(account);
    }

    /// Make license assignment fail for one user id.
    pub fn fail_licenses_for(&self, user_id: &str) {
        self.state()
            .failing_license_users
            .insert(user_id.to_owned());
    }

    /// Every mutating call, as `operation arguments`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Current roster of a group.
    pub fn members(&self, group: &str) -> Vec<DirectoryMember> {
        self.state().groups.get(group).cloned().unwrap_or_default()
    }

    /// Current tenant accounts.
    pub fn users(&self) -> Vec<DirectoryAccount> {
        self.state().users.clone()
    }
}

fn matches_filter(account: &DirectoryAccount, filter: &UserFilter) -> bool {
    let upn_matches = |expected: &str| {
        account
            .user_principal_name
            .as_ref()
            .is_some_and(|upn| upn.as_str().eq_ignore_ascii_case(expected))
    };
    match filter {
        UserFilter::ByUserPrincipalName(upn) => upn_matches(upn.as_str()),
        UserFilter::ByMailOrUserPrincipalName { mail, upn } => {
            account
                .mail
                .as_deref()
                .is_some_and(|value| value.eq_ignore_ascii_case(mail.as_str()))
                || upn_matches(upn.as_str())
        }
    }
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn group_members(
        &self,
        group_id: &GroupId,
    ) -> Result<MembershipSnapshot, DirectoryError> {
        let members = self.members(group_id.as_str());
        Ok(MembershipSnapshot::new(group_id.clone(), members))
    }

    async fn create_user(&self, account: &NewAccount) -> Result<DirectoryAccount, DirectoryError> {
        let mut state = self.state();
        let id = DirectoryObjectId::parse(&format!("u-{}", account.mail_nickname))
            .map_err(|error| DirectoryError::rejected(error.to_string()))?;
        let created = DirectoryAccount {
            id,
            user_principal_name: Some(account.user_principal_name.clone()),
            display_name: Some(account.display_name.clone()),
            mail: Some(account.mail.as_str().to_owned()),
            account_enabled: Some(true),
        };
        state.calls.push(format!("create_user {}", account.user_principal_name));
        state.users.push(created.clone());
        Ok(created)
    }

    async fn delete_user(
        &self,
        user_id: &DirectoryObjectId,
    ) -> Result<DeleteOutcome, DirectoryError> {
        let mut state = self.state();
        state.calls.push(format!("delete_user {user_id}"));
        let before = state.users.len();
        state.users.retain(|account| &account.id != user_id);
        if state.users.len() == before {
            return Ok(DeleteOutcome::NotFound);
        }
        for members in state.groups.values_mut() {
            members.retain(|member| &member.id != user_id);
        }
        Ok(DeleteOutcome::Deleted)
    }

    async fn add_group_member(
        &self,
        group_id: &GroupId,
        member_id: &DirectoryObjectId,
    ) -> Result<(), DirectoryError> {
        let mut state = self.state();
        state
            .calls
            .push(format!("add_group_member {group_id} {member_id}"));
        let account = state
            .users
            .iter()
            .find(|account| &account.id == member_id)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found(member_id.to_string()))?;
        let members = state.groups.entry(group_id.to_string()).or_default();
        if members.iter().any(|member| &member.id == member_id) {
            return Err(DirectoryError::rejected("member already exists"));
        }
        members.push(DirectoryMember {
            id: account.id,
            display_name: account.display_name,
            mail: account.mail,
            kind: DirectoryObjectKind::User,
        });
        Ok(())
    }

    async fn remove_group_member(
        &self,
        group_id: &GroupId,
        member_id: &DirectoryObjectId,
    ) -> Result<(), DirectoryError> {
        let mut state = self.state();
        state
            .calls
            .push(format!("remove_group_member {group_id} {member_id}"));
        let members = state.groups.entry(group_id.to_string()).or_default();
        let before = members.len();
        members.retain(|member| &member.id != member_id);
        if members.len() == before {
            return Err(DirectoryError::not_found(member_id.to_string()));
        }
        Ok(())
    }

    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<DirectoryAccount>, DirectoryError> {
        Ok(self
            .state()
            .users
            .iter()
            .filter(|account| matches_filter(account, filter))
            .cloned()
            .collect())
    }

    async fn get_user(
        &self,
        user_id: &DirectoryObjectId,
    ) -> Result<Option<DirectoryAccount>, DirectoryError> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|account| &account.id == user_id)
            .cloned())
    }

    async fn assign_licenses(
        &self,
        user_id: &DirectoryObjectId,
        skus: &[SkuId],
    ) -> Result<(), DirectoryError> {
        let mut state = self.state();
        state
            .calls
            .push(format!("assign_licenses {user_id} {}", skus.len()));
        if state.failing_license_users.contains(user_id.as_str()) {
            return Err(DirectoryError::rejected("license quota exhausted"));
        }
        Ok(())
    }
}
