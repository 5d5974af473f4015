//! Client-credentials token acquisition with an in-memory cache.
//!
//! Tokens are reused until they come within [`EXPIRY_GRACE_SECONDS`] of their
//! expiry, then reacquired on the next call. A 401 from Graph invalidates the
//! cached token so the following request starts from a fresh one.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

use super::dto::TokenResponseDto;
use super::{body_preview, join_segments, map_transport_error};
use crate::domain::ports::DirectoryError;

/// Scope requesting every application permission granted to the app.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

const EXPIRY_GRACE_SECONDS: i64 = 300;

/// App registration used for the client-credentials grant.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Directory tenant identifier.
    pub tenant_id: String,
    /// Application (client) identifier.
    pub client_id: String,
    /// Application secret.
    pub client_secret: Zeroizing<String>,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

struct CachedToken {
    access_token: Zeroizing<String>,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(EXPIRY_GRACE_SECONDS) < self.expires_at
    }
}

/// Bearer token source for one tenant and scope.
pub struct TokenCache {
    client: Client,
    token_url: Url,
    credentials: ClientCredentials,
    scope: String,
    clock: Arc<dyn Clock>,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// Build a cache targeting `{authority_host}/{tenant}/oauth2/v2.0/token`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Transport`] when the authority host cannot
    /// carry path segments.
    pub fn new(
        client: Client,
        authority_host: &Url,
        credentials: ClientCredentials,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DirectoryError> {
        let token_url = join_segments(
            authority_host,
            &[credentials.tenant_id.as_str(), "oauth2", "v2.0", "token"],
        )?;
        Ok(Self {
            client,
            token_url,
            credentials,
            scope: GRAPH_DEFAULT_SCOPE.to_owned(),
            clock,
            cached: RwLock::new(None),
        })
    }

    /// Request a different scope than [`GRAPH_DEFAULT_SCOPE`].
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Return a usable access token, acquiring a new one when needed.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Authentication`] when the authority refuses
    /// the credentials and [`DirectoryError::Transport`] when it is
    /// unreachable.
    pub async fn access_token(&self) -> Result<Zeroizing<String>, DirectoryError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_usable_at(self.clock.utc()) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        if let Some(token) = cached.as_ref() {
            if token.is_usable_at(self.clock.utc()) {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.acquire().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn acquire(&self) -> Result<CachedToken, DirectoryError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let response = self
            .client
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            let message = format!("status {}: {}", status.as_u16(), body_preview(&body));
            return Err(if status.is_server_error() {
                DirectoryError::transport(message)
            } else {
                DirectoryError::authentication(message)
            });
        }

        let decoded: TokenResponseDto = serde_json::from_slice(&body).map_err(|error| {
            DirectoryError::decode(format!("invalid token response: {error}"))
        })?;
        let expires_at = TimeDelta::try_seconds(decoded.expires_in.max(0))
            .and_then(|lifetime| self.clock.utc().checked_add_signed(lifetime))
            .ok_or_else(|| {
                DirectoryError::decode(format!(
                    "token lifetime of {} seconds is out of range",
                    decoded.expires_in
                ))
            })?;
        debug!(
            client_id = %self.credentials.client_id,
            %expires_at,
            "acquired directory access token"
        );
        Ok(CachedToken {
            access_token: Zeroizing::new(decoded.access_token),
            expires_at,
        })
    }
}
