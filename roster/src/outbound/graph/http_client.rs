//! Reqwest-backed implementation of the directory port.
//!
//! This adapter owns transport details only: URL construction, bearer
//! authentication, pagination, status mapping, and JSON decoding into
//! directory domain values. Throttling is surfaced as
//! [`DirectoryError::RateLimited`]; no request is retried here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::auth::{ClientCredentials, TokenCache};
use super::dto::{
    AssignLicenseRequestDto, AssignedLicenseDto, CreateUserRequestDto, DirectoryObjectDto,
    ODataPageDto, ReferenceRequestDto, UserDto,
};
use super::{join_segments, map_status_error, map_transport_error};
use crate::domain::ports::{DirectoryClient, DirectoryError};
use crate::domain::{
    DeleteOutcome, DirectoryAccount, DirectoryMember, DirectoryObjectId, GroupId,
    MembershipSnapshot, NewAccount, SkuId, UserFilter,
};

const MEMBER_SELECT: &str = "id,displayName,mail";
const USER_SELECT: &str = "id,displayName,mail,userPrincipalName,accountEnabled";

/// Endpoints and timeout for the Graph adapter.
#[derive(Debug, Clone)]
pub struct GraphClientSettings {
    /// Graph API root including the version segment.
    pub graph_endpoint: Url,
    /// Identity platform authority host.
    pub authority_host: Url,
    /// Per-request timeout applied to Graph and token calls.
    pub timeout: Duration,
}

/// Directory adapter speaking the Graph REST API.
pub struct GraphDirectoryClient {
    client: Client,
    base: Url,
    tokens: TokenCache,
}

impl GraphDirectoryClient {
    /// Build an adapter sharing one reqwest client between Graph and token
    /// calls.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Transport`] when the reqwest client cannot be
    /// constructed or an endpoint cannot carry path segments.
    pub fn new(
        settings: GraphClientSettings,
        credentials: ClientCredentials,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(map_transport_error)?;
        let tokens = TokenCache::new(client.clone(), &settings.authority_host, credentials, clock)?;
        Ok(Self::with_token_cache(client, settings.graph_endpoint, tokens))
    }

    /// Build an adapter around an existing token cache.
    pub fn with_token_cache(client: Client, graph_endpoint: Url, tokens: TokenCache) -> Self {
        Self {
            client,
            base: graph_endpoint,
            tokens,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
        join_segments(&self.base, segments)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, DirectoryError> {
        let token = self.tokens.access_token().await?;
        let response = request
            .bearer_auth(token.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }

    async fn fetch_pages<T: DeserializeOwned>(
        &self,
        first: Url,
        what: &str,
    ) -> Result<Vec<T>, DirectoryError> {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0_usize;
        while let Some(url) = next.take() {
            let body = self.execute(self.client.get(url)).await?;
            let page: ODataPageDto<T> = decode(&body, what)?;
            items.extend(page.value);
            next = page
                .next_link
                .map(|link| self.follow_link(&link))
                .transpose()?;
            pages += 1;
        }
        debug!(what, pages, items = items.len(), "fetched paged collection");
        Ok(items)
    }

    fn follow_link(&self, link: &str) -> Result<Url, DirectoryError> {
        let url = Url::parse(link)
            .map_err(|error| DirectoryError::decode(format!("invalid next link {link}: {error}")))?;
        if url.origin() != self.base.origin() {
            return Err(DirectoryError::decode(format!(
                "next link {link} leaves the directory endpoint"
            )));
        }
        Ok(url)
    }
}

/// Maps roster entries onto members, skipping entries Graph returned without
/// an id so one bad record does not cost the rest of the roster.
fn decode_members(group_id: &GroupId, objects: Vec<DirectoryObjectDto>) -> Vec<DirectoryMember> {
    objects
        .into_iter()
        .filter_map(|object| {
            let display_name = object.display_name.clone();
            match object.into_member() {
                Ok(member) => Some(member),
                Err(reason) => {
                    warn!(
                        group = group_id.as_str(),
                        display_name = display_name.as_deref().unwrap_or(""),
                        %reason,
                        "skipping group member"
                    );
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl DirectoryClient for GraphDirectoryClient {
    async fn group_members(
        &self,
        group_id: &GroupId,
    ) -> Result<MembershipSnapshot, DirectoryError> {
        let mut url = self.endpoint(&["groups", group_id.as_str(), "members"])?;
        url.query_pairs_mut().append_pair("$select", MEMBER_SELECT);
        let members = self
            .fetch_pages::<DirectoryObjectDto>(url, "group members")
            .await?;
        Ok(MembershipSnapshot::new(
            group_id.clone(),
            decode_members(group_id, members),
        ))
    }

    async fn create_user(&self, account: &NewAccount) -> Result<DirectoryAccount, DirectoryError> {
        let url = self.endpoint(&["users"])?;
        let body = self
            .execute(
                self.client
                    .post(url)
                    .json(&CreateUserRequestDto::from(account)),
            )
            .await?;
        let created: UserDto = decode(&body, "created user")?;
        created.into_account().map_err(DirectoryError::decode)
    }

    async fn delete_user(
        &self,
        user_id: &DirectoryObjectId,
    ) -> Result<DeleteOutcome, DirectoryError> {
        let url = self.endpoint(&["users", user_id.as_str()])?;
        match self.execute(self.client.delete(url)).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(error) if error.is_not_found() => Ok(DeleteOutcome::NotFound),
            Err(error) => Err(error),
        }
    }

    async fn add_group_member(
        &self,
        group_id: &GroupId,
        member_id: &DirectoryObjectId,
    ) -> Result<(), DirectoryError> {
        let url = self.endpoint(&["groups", group_id.as_str(), "members", "$ref"])?;
        let reference = ReferenceRequestDto {
            odata_id: self
                .endpoint(&["directoryObjects", member_id.as_str()])?
                .to_string(),
        };
        self.execute(self.client.post(url).json(&reference)).await?;
        Ok(())
    }

    async fn remove_group_member(
        &self,
        group_id: &GroupId,
        member_id: &DirectoryObjectId,
    ) -> Result<(), DirectoryError> {
        let url = self.endpoint(&[
            "groups",
            group_id.as_str(),
            "members",
            member_id.as_str(),
            "$ref",
        ])?;
        self.execute(self.client.delete(url)).await?;
        Ok(())
    }

    async fn find_users(&self, filter: &UserFilter) -> Result<Vec<DirectoryAccount>, DirectoryError> {
        let mut url = self.endpoint(&["users"])?;
        url.query_pairs_mut()
            .append_pair("$filter", &render_filter(filter))
            .append_pair("$select", USER_SELECT);
        self.fetch_pages::<UserDto>(url, "users")
            .await?
            .into_iter()
            .map(UserDto::into_account)
            .collect::<Result<Vec<_>, _>>()
            .map_err(DirectoryError::decode)
    }

    async fn get_user(
        &self,
        user_id: &DirectoryObjectId,
    ) -> Result<Option<DirectoryAccount>, DirectoryError> {
        let mut url = self.endpoint(&["users", user_id.as_str()])?;
        url.query_pairs_mut().append_pair("$select", USER_SELECT);
        let body = match self.execute(self.client.get(url)).await {
            Ok(body) => body,
            Err(error) if error.is_not_found() => return Ok(None),
            Err(error) => return Err(error),
        };
        let user: UserDto = decode(&body, "user")?;
        user.into_account().map(Some).map_err(DirectoryError::decode)
    }

    async fn assign_licenses(
        &self,
        user_id: &DirectoryObjectId,
        skus: &[SkuId],
    ) -> Result<(), DirectoryError> {
        let url = self.endpoint(&["users", user_id.as_str(), "assignLicense"])?;
        let request = AssignLicenseRequestDto {
            add_licenses: skus
                .iter()
                .map(|sku| AssignedLicenseDto {
                    sku_id: sku.as_uuid(),
                    disabled_plans: Vec::new(),
                })
                .collect(),
            remove_licenses: Vec::new(),
        };
        self.execute(self.client.post(url).json(&request)).await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<T, DirectoryError> {
    serde_json::from_slice(body)
        .map_err(|error| DirectoryError::decode(format!("invalid {what} payload: {error}")))
}

fn render_filter(filter: &UserFilter) -> String {
    match filter {
        UserFilter::ByUserPrincipalName(upn) => {
            format!("userPrincipalName eq '{}'", odata_literal(upn.as_str()))
        }
        UserFilter::ByMailOrUserPrincipalName { mail, upn } => format!(
            "mail eq '{}' or userPrincipalName eq '{}'",
            odata_literal(mail.as_str()),
            odata_literal(upn.as_str()),
        ),
    }
}

fn odata_literal(raw: &str) -> String {
    raw.replace('\'', "''")
}
