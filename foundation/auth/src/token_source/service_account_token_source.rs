use std::fmt::Debug;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::OnceCell;

use crate::error::Error;
use crate::key::{KeyFormat, ServiceAccountKey};
use crate::token::{AccessToken, TOKEN_URL};
use crate::token_source::{check_response_status, default_http_client, InternalToken, SourceKind, TokenSource};

const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Clone, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

impl Claims<'_> {
    fn token(&self, pk: &jsonwebtoken::EncodingKey, pk_id: Option<&str>) -> Result<String, Error> {
        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        header.kid = pk_id.map(|s| s.to_string());
        let v = jsonwebtoken::encode(&header, self, pk)?;
        Ok(v)
    }
}

#[derive(Debug)]
enum KeyMaterial {
    File { path: String, format: KeyFormat },
    Loaded(ServiceAccountKey),
}

/// Implements the OAuth 2.0 JWT bearer flow: every call signs a new assertion and exchanges it.
/// The key file is read on first use and kept in memory afterwards.
pub struct ServiceAccountTokenSource {
    email: Option<String>,
    scopes: String,
    token_url: Option<String>,
    sub: Option<String>,
    material: KeyMaterial,
    key: OnceCell<ServiceAccountKey>,
    client: reqwest::Client,
}

impl Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("email", &self.email)
            .field("scopes", &self.scopes)
            .field("token_url", &self.token_url)
            .field("sub", &self.sub)
            .field("material", &self.material)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokenSource {
    pub fn from_key_file(
        email: Option<String>,
        path: String,
        format: KeyFormat,
        scopes: &[String],
    ) -> Result<Self, Error> {
        if format == KeyFormat::P12 && email.is_none() {
            // a PKCS#12 container carries no account identifier
            return Err(Error::missing("accountEmail"));
        }
        Self::new(email, KeyMaterial::File { path, format }, scopes)
    }

    pub fn from_key(key: ServiceAccountKey, scopes: &[String]) -> Result<Self, Error> {
        let email = key.email.clone();
        if email.is_none() {
            return Err(Error::missing("client_email"));
        }
        Self::new(email, KeyMaterial::Loaded(key), scopes)
    }

    fn new(email: Option<String>, material: KeyMaterial, scopes: &[String]) -> Result<Self, Error> {
        if scopes.is_empty() {
            return Err(Error::missing("scopes"));
        }
        Ok(Self {
            email,
            scopes: scopes.join(" "),
            token_url: None,
            sub: None,
            material,
            key: OnceCell::new(),
            client: default_http_client()?,
        })
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Subject to impersonate with domain-wide delegation.
    pub fn with_sub(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    async fn key(&self) -> Result<&ServiceAccountKey, Error> {
        self.key
            .get_or_try_init(|| async {
                match &self.material {
                    KeyMaterial::File { path, format } => ServiceAccountKey::from_file(path, *format).await,
                    KeyMaterial::Loaded(key) => Ok(key.clone()),
                }
            })
            .await
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn token(&self) -> Result<AccessToken, Error> {
        let key = self.key().await?;
        let email = match self.email.as_ref().or(key.email.as_ref()) {
            Some(email) => email,
            None => return Err(Error::missing("accountEmail")),
        };
        let token_url = self
            .token_url
            .as_deref()
            .or(key.token_uri.as_deref())
            .unwrap_or(TOKEN_URL);

        let iat = OffsetDateTime::now_utc();
        let exp = iat + time::Duration::hours(1);
        let assertion = Claims {
            iss: email,
            sub: self.sub.as_deref(),
            scope: &self.scopes,
            aud: token_url,
            exp: exp.unix_timestamp(),
            iat: iat.unix_timestamp(),
        }
        .token(&key.pk, key.key_id.as_deref())?;

        let form = [("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion.as_str())];
        let response = self.client.post(token_url).form(&form).send().await?;
        let token = check_response_status(response)
            .await?
            .json::<InternalToken>()
            .await?
            .to_token(iat);
        tracing::debug!("service account token issued : email={} expiry={:?}", email, token.expiry);
        Ok(token)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ServiceAccount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_scopes() {
        let result = ServiceAccountTokenSource::from_key_file(
            Some("sa@p.iam.gserviceaccount.com".to_string()),
            "/keys/sa.json".to_string(),
            KeyFormat::Json,
            &[],
        );
        match result {
            Err(Error::Configuration { field, .. }) => assert_eq!("scopes", field),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_p12_requires_email() {
        let result = ServiceAccountTokenSource::from_key_file(
            None,
            "/keys/sa.p12".to_string(),
            KeyFormat::P12,
            &["https://www.googleapis.com/auth/bigquery".to_string()],
        );
        match result {
            Err(Error::Configuration { field, .. }) => assert_eq!("accountEmail", field),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_key_is_authentication_error() {
        let ts = ServiceAccountTokenSource::from_key_file(
            Some("sa@p.iam.gserviceaccount.com".to_string()),
            "/nonexistent/sa.p12".to_string(),
            KeyFormat::P12,
            &["https://www.googleapis.com/auth/bigquery".to_string()],
        )
        .unwrap();
        let err = ts.token().await.unwrap_err();
        assert!(matches!(err, Error::KeyFileIOError { .. }));
        assert!(!err.is_configuration());
    }
}
