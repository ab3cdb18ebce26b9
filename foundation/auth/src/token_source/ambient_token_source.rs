use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::token::AccessToken;
use crate::token_source::{SourceKind, TokenSource};

/// A credential object the host already holds and keeps fresh by itself.
#[async_trait]
pub trait LiveCredential: Send + Sync + Debug {
    /// The token the credential currently holds, if any.
    fn current_token(&self) -> Option<AccessToken>;

    async fn refresh(&self) -> Result<AccessToken, Error>;
}

/// Reads tokens from a [`LiveCredential`]. Expiry is the credential's own business,
/// so tokens from this source are never treated as expired locally.
#[derive(Debug, Clone)]
pub struct AmbientTokenSource {
    credential: Arc<dyn LiveCredential>,
}

impl AmbientTokenSource {
    pub fn new(credential: Arc<dyn LiveCredential>) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl TokenSource for AmbientTokenSource {
    async fn token(&self) -> Result<AccessToken, Error> {
        match self.credential.current_token() {
            Some(token) if !token.access_token.is_empty() => Ok(token),
            _ => self.credential.refresh().await,
        }
    }

    async fn refresh(&self) -> Result<AccessToken, Error> {
        self.credential.refresh().await
    }

    fn is_expired(&self, _token: &AccessToken, _skew_seconds: i64) -> bool {
        false
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Ambient
    }
}
