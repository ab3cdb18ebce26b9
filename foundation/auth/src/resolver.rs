use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, ResolutionError};
use crate::token::{AccessToken, EXPIRY_SKEW_SECONDS};
use crate::token_source::{SourceKind, TokenSource};

/// Rebuilds a token source from settings saved by an older version.
#[async_trait]
pub trait LegacyLoader: Send + Sync + Debug {
    async fn load(&self) -> Result<Arc<dyn TokenSource>, Error>;
}

#[derive(Debug)]
struct Selected {
    // None when the source came from the legacy loader
    index: Option<usize>,
    source: Arc<dyn TokenSource>,
}

/// Picks the first candidate that yields a usable token and sticks with it until it fails.
///
/// Candidates are tried strictly in the order given. When every candidate fails the legacy
/// loader, if any, gets one attempt. The selected source is guarded by a single lock that is
/// held for the whole resolution, so concurrent callers never cache different sources.
#[derive(Debug)]
pub struct CredentialResolver {
    candidates: Vec<Arc<dyn TokenSource>>,
    legacy: Option<Box<dyn LegacyLoader>>,
    selected: tokio::sync::Mutex<Option<Selected>>,
}

impl CredentialResolver {
    pub fn new(candidates: Vec<Arc<dyn TokenSource>>) -> Self {
        Self {
            candidates,
            legacy: None,
            selected: tokio::sync::Mutex::new(None),
        }
    }

    pub fn with_legacy(mut self, loader: impl LegacyLoader + 'static) -> Self {
        self.legacy = Some(Box::new(loader));
        self
    }

    /// Kind of the source the last successful resolution used.
    pub async fn selected(&self) -> Option<SourceKind> {
        self.selected.lock().await.as_ref().map(|s| s.source.kind())
    }

    pub async fn resolve(&self) -> Result<AccessToken, Error> {
        let mut selected = self.selected.lock().await;
        let mut failures = ResolutionError::default();

        let mut skip = None;
        if let Some(current) = selected.take() {
            match attempt(current.source.as_ref(), false).await {
                Ok(token) => {
                    *selected = Some(current);
                    return Ok(token);
                }
                Err(e) => {
                    tracing::warn!("cached credential source failed : source={} error={}", current.source.kind(), e);
                    skip = current.index;
                    failures.push(current.source.kind().to_string(), e);
                }
            }
        }
        self.walk(&mut selected, failures, skip, false).await
    }

    /// Drops the cached source and obtains a new token from scratch, bypassing per-source caches.
    pub async fn resolve_fresh(&self) -> Result<AccessToken, Error> {
        let mut selected = self.selected.lock().await;
        *selected = None;
        self.walk(&mut selected, ResolutionError::default(), None, true).await
    }

    async fn walk(
        &self,
        selected: &mut Option<Selected>,
        mut failures: ResolutionError,
        skip: Option<usize>,
        fresh: bool,
    ) -> Result<AccessToken, Error> {
        for (index, source) in self.candidates.iter().enumerate() {
            if skip == Some(index) {
                continue;
            }
            if let Some(previous) = failures.last() {
                tracing::debug!(
                    "trying next credential source : source={} previous={} error={}",
                    source.kind(),
                    previous.source,
                    previous.error
                );
            }
            match attempt(source.as_ref(), fresh).await {
                Ok(token) => {
                    tracing::debug!("credential source selected : source={}", source.kind());
                    *selected = Some(Selected {
                        index: Some(index),
                        source: source.clone(),
                    });
                    return Ok(token);
                }
                Err(e) => {
                    tracing::warn!("credential source failed : source={} error={}", source.kind(), e);
                    failures.push(source.kind().to_string(), e);
                }
            }
        }

        if let Some(loader) = &self.legacy {
            let result = match loader.load().await {
                Ok(source) => attempt(source.as_ref(), fresh).await.map(|token| (source, token)),
                Err(e) => Err(e),
            };
            match result {
                Ok((source, token)) => {
                    tracing::debug!("credential source selected from legacy settings : source={}", source.kind());
                    *selected = Some(Selected { index: None, source });
                    return Ok(token);
                }
                Err(e) => {
                    tracing::warn!("legacy credential settings failed : error={}", e);
                    failures.push(SourceKind::Legacy.to_string(), e);
                }
            }
        }

        Err(Error::Resolution(failures))
    }
}

async fn attempt(source: &dyn TokenSource, fresh: bool) -> Result<AccessToken, Error> {
    let token = if fresh {
        source.refresh().await?
    } else {
        source.token().await?
    };
    if token.access_token.is_empty() || source.is_expired(&token, EXPIRY_SKEW_SECONDS) {
        return Err(Error::InvalidToken);
    }
    Ok(token)
}
