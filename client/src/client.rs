use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::RequestBuilder;

use google_connector_auth::config::PersistedConfig;
use google_connector_auth::resolver::CredentialResolver;
use google_connector_auth::token::AccessToken;
use google_connector_auth::token_source::ambient_token_source::LiveCredential;
use google_connector_gax::cancel::CancellationToken;
use google_connector_gax::fanout::fan_out;
use google_connector_gax::retry::{RetrySetting, RetryingInvoker};
use google_connector_gax::status::{Code, Status, TryAs};

use crate::error::{Attempt, Error};
use crate::http;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub retry: RetrySetting,
    /// Used as is when set. Otherwise a client with `timeout` is built.
    pub http: Option<reqwest::Client>,
    pub timeout: Duration,
    /// Aborts pending calls and backoff waits of the client.
    pub cancel: Option<CancellationToken>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetrySetting::default(),
            http: None,
            timeout: Duration::from_secs(30),
            cancel: None,
        }
    }
}

impl ClientConfig {
    pub fn with_retry(mut self, retry: RetrySetting) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Runs API calls with a resolved access token, retrying rate-limited calls
/// and re-resolving credentials once when a token is rejected.
#[derive(Debug)]
pub struct Client {
    resolver: CredentialResolver,
    invoker: RetryingInvoker,
    http: reqwest::Client,
    cancel: Option<CancellationToken>,
    reauthentications: AtomicUsize,
}

impl Client {
    pub fn new(resolver: CredentialResolver, config: ClientConfig) -> Result<Self, google_connector_auth::error::Error> {
        let http = match config.http {
            Some(http) => http,
            None => reqwest::Client::builder().timeout(config.timeout).build()?,
        };
        Ok(Self {
            resolver,
            invoker: RetryingInvoker::new(config.retry),
            http,
            cancel: config.cancel,
            reauthentications: AtomicUsize::new(0),
        })
    }

    /// Creates a client for a persisted connector config. Configuration errors surface here.
    pub fn from_persisted(
        persisted: &PersistedConfig,
        ambient: Option<Arc<dyn LiveCredential>>,
        config: ClientConfig,
    ) -> Result<Self, google_connector_auth::error::Error> {
        Self::new(google_connector_auth::create_resolver(persisted, ambient)?, config)
    }

    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    /// How many times a rejected token forced a fresh resolution.
    pub fn reauthentications(&self) -> usize {
        self.reauthentications.load(Ordering::SeqCst)
    }

    pub async fn token(&self) -> Result<AccessToken, google_connector_auth::error::Error> {
        self.resolver.resolve().await
    }

    /// Resolves a token and runs the call built by `factory` through the retrying invoker.
    /// A 401 answer triggers exactly one fresh resolution and one more invocation.
    pub async fn authenticated_call<F, Fut, T, E>(&self, mut factory: F) -> Result<T, Error<E>>
    where
        F: FnMut(AccessToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TryAs<Status>,
    {
        let token = self.resolve(false).await?;
        let error = match self.invoke(&token, &mut factory).await {
            Err(Error::Call(e)) if e.try_as().is_some_and(Status::is_unauthenticated) => e,
            other => return other,
        };

        self.reauthentications.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = error.try_as() {
            tracing::warn!("access token rejected, resolving credentials again : status={}", status);
        }
        let token = self.resolve(true).await?;
        self.invoke(&token, &mut factory).await
    }

    /// Resolves one token and runs a call per item concurrently, each through the retrying invoker.
    /// Results keep the order of `items`. A rejected token is reported per item as [`Error::Call`].
    pub async fn authenticated_batch<I, F, Fut, T, E>(
        &self,
        items: I,
        factory: F,
    ) -> Result<Vec<Result<T, Error<E>>>, Error<E>>
    where
        I: IntoIterator,
        I::Item: Clone,
        F: Fn(AccessToken, I::Item) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TryAs<Status>,
    {
        let token = self.resolve(false).await?;
        let token = &token;
        let factory = &factory;
        let results = fan_out(items, move |item| async move {
            let mut bound = |token: AccessToken| factory(token, item.clone());
            self.invoke(token, &mut bound).await
        })
        .await;
        Ok(results)
    }

    /// GETs `url` with the bearer token and decodes the JSON body.
    pub async fn get_json<T>(&self, url: &str) -> Result<T, Error<http::Error>>
    where
        T: serde::de::DeserializeOwned,
    {
        self.send(|http| http.get(url)).await
    }

    /// Sends the request built by `builder` with the bearer token and decodes the JSON body.
    /// The builder runs again for every attempt.
    pub async fn send<T>(&self, builder: impl Fn(&reqwest::Client) -> RequestBuilder) -> Result<T, Error<http::Error>>
    where
        T: serde::de::DeserializeOwned,
    {
        self.authenticated_call(|token| {
            let request = builder(&self.http)
                .header(reqwest::header::USER_AGENT, "google-connector")
                .header(reqwest::header::AUTHORIZATION, token.value());
            http::execute(request)
        })
        .await
    }

    /// Resolves a token, giving up with [`Error::Cancelled`] once the client's token fires.
    async fn resolve<E>(&self, fresh: bool) -> Result<AccessToken, Error<E>> {
        let resolution = async {
            if fresh {
                self.resolver.resolve_fresh().await
            } else {
                self.resolver.resolve().await
            }
        };
        let token = match &self.cancel {
            Some(cancel) => cancel.run_until_cancelled(resolution).await.map_err(|_| Error::Cancelled)?,
            None => resolution.await,
        };
        Ok(token?)
    }

    async fn invoke<F, Fut, T, E>(&self, token: &AccessToken, factory: &mut F) -> Result<T, Error<E>>
    where
        F: FnMut(AccessToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: TryAs<Status>,
    {
        let invocation = self
            .invoker
            .invoke(self.cancel.clone(), || {
                let call = factory(token.clone());
                async move { call.await.map_err(Attempt::Call) }
            })
            .await;
        match invocation.result {
            Ok(v) => Ok(v),
            Err(Attempt::Cancelled) => Err(Error::Cancelled),
            Err(Attempt::Call(e)) if self.retries_rate_limits() && e.try_as().is_some_and(Status::is_rate_limited) => {
                Err(Error::RateLimited {
                    attempts: invocation.attempts,
                    source: e,
                })
            }
            Err(Attempt::Call(e)) => Err(Error::Call(e)),
        }
    }

    // a 429 only counts as exhausted rate limiting when the policy retries it
    fn retries_rate_limits(&self) -> bool {
        self.invoker.setting().codes.contains(&Code::TooManyRequests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let cancel = CancellationToken::new();
        let config = ClientConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_retry(RetrySetting {
                max_attempts: 1,
                ..Default::default()
            })
            .with_cancellation_token(cancel);
        assert_eq!(Duration::from_secs(5), config.timeout);
        assert_eq!(1, config.retry.max_attempts);
        assert_eq!(Duration::from_secs(5), config.retry.delay);
        assert!(config.cancel.is_some());
        assert!(config.http.is_none());
    }

    #[tokio::test]
    async fn test_empty_resolver_is_configuration_error() {
        let client = Client::new(CredentialResolver::new(vec![]), ClientConfig::default()).unwrap();
        let mut called = false;
        let result: Result<(), Error<Status>> = client
            .authenticated_call(|_| {
                called = true;
                async { Ok(()) }
            })
            .await;
        assert!(result.unwrap_err().is_configuration());
        assert!(!called);
        assert_eq!(0, client.reauthentications());
    }
}
