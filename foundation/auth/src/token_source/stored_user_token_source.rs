use async_trait::async_trait;

use crate::credentials::{CredentialsFile, USER_CREDENTIALS_KEY};
use crate::error::Error;
use crate::misc::Required;
use crate::token::{AccessToken, EXPIRY_SKEW_SECONDS, TOKEN_URL};
use crate::token_source::{check_response_status, default_http_client, InternalToken, SourceKind, TokenSource};

/// Exchanges a stored refresh token for access tokens and keeps the last one until it nears expiry.
pub struct StoredUserTokenSource {
    client_id: String,
    client_secret: String,
    token_url: String,
    refresh_token: String,

    current_token: std::sync::RwLock<Option<AccessToken>>,
    guard: tokio::sync::Mutex<()>,
    client: reqwest::Client,
}

impl std::fmt::Debug for StoredUserTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredUserTokenSource")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl StoredUserTokenSource {
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        refresh_token: Option<String>,
        token_url: Option<String>,
    ) -> Result<StoredUserTokenSource, Error> {
        if refresh_token.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            return Err(Error::RefreshTokenIsRequired);
        }
        Ok(StoredUserTokenSource {
            client_id: client_id.required("clientId")?,
            client_secret: client_secret.required("clientSecret")?,
            token_url: token_url.unwrap_or_else(|| TOKEN_URL.to_string()),
            refresh_token: refresh_token.required("refreshToken")?,
            current_token: std::sync::RwLock::new(None),
            guard: tokio::sync::Mutex::new(()),
            client: default_http_client()?,
        })
    }

    pub fn from_credentials(cred: &CredentialsFile) -> Result<StoredUserTokenSource, Error> {
        if cred.tp != USER_CREDENTIALS_KEY {
            return Err(Error::UnsupportedAccountType(cred.tp.clone()));
        }
        Self::new(
            cred.client_id.clone(),
            cred.client_secret.clone(),
            cred.refresh_token.clone(),
            cred.token_uri.clone(),
        )
    }

    /// Seeds the cache with a token obtained elsewhere, e.g. persisted with the refresh token.
    pub fn with_token(self, token: AccessToken) -> Self {
        if let Ok(mut current) = self.current_token.write() {
            *current = Some(token);
        }
        self
    }

    fn cached(&self) -> Option<AccessToken> {
        let current = self.current_token.read().ok()?;
        let token = current.as_ref().filter(|token| token.valid()).cloned();
        token
    }

    async fn exchange(&self) -> Result<AccessToken, Error> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
        ];
        let now = time::OffsetDateTime::now_utc();
        let response = self.client.post(self.token_url.as_str()).form(&form).send().await?;
        let token = check_response_status(response)
            .await?
            .json::<InternalToken>()
            .await?
            .to_token(now);
        tracing::debug!("token refresh success : expiry={:?}", token.expiry);

        if let Ok(mut current) = self.current_token.write() {
            *current = Some(token.clone());
        }
        Ok(token)
    }
}

#[async_trait]
impl TokenSource for StoredUserTokenSource {
    async fn token(&self) -> Result<AccessToken, Error> {
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        // Only single task can refresh token
        let _locking = self.guard.lock().await;

        if let Some(token) = self.cached() {
            return Ok(token);
        }
        self.exchange().await
    }

    async fn refresh(&self) -> Result<AccessToken, Error> {
        let _locking = self.guard.lock().await;
        self.exchange().await
    }

    fn is_expired(&self, token: &AccessToken, skew_seconds: i64) -> bool {
        token.is_expired(skew_seconds.max(EXPIRY_SKEW_SECONDS))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::StoredUser
    }
}
