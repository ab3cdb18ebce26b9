pub mod ambient_token_source;
pub mod service_account_token_source;
pub mod stored_user_token_source;

use std::fmt::{Debug, Display, Formatter};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Response;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::error::{Error, TokenErrorResponse};
use crate::token::AccessToken;

/// Origin of a token, in the order the connector prefers them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceKind {
    Ambient,
    ServiceAccount,
    StoredUser,
    Legacy,
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceKind::Ambient => "ambient",
            SourceKind::ServiceAccount => "service_account",
            SourceKind::StoredUser => "stored_user",
            SourceKind::Legacy => "legacy",
        };
        f.write_str(name)
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync + Debug {
    /// Returns a token, from cache when the source keeps one.
    async fn token(&self) -> Result<AccessToken, Error>;

    /// Returns a newly obtained token, bypassing any cache the source keeps.
    async fn refresh(&self) -> Result<AccessToken, Error> {
        self.token().await
    }

    fn is_expired(&self, token: &AccessToken, skew_seconds: i64) -> bool {
        token.is_expired(skew_seconds)
    }

    fn kind(&self) -> SourceKind;
}

pub(crate) fn default_http_client() -> Result<reqwest::Client, Error> {
    Ok(reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?)
}

/// Checks whether a token endpoint response is successful and returns it, or returns an error.
pub(crate) async fn check_response_status(response: Response) -> Result<Response, Error> {
    let error = match response.error_for_status_ref() {
        Ok(_) => return Ok(response),
        Err(error) => error,
    };

    // try to extract a token error, falling back to the status error if it can not be parsed.
    let status = response.status();
    Err(response
        .json::<TokenErrorResponse>()
        .await
        .map(|response| Error::TokenErrorResponse {
            status: status.as_u16(),
            error: response.error,
            error_description: response.error_description,
        })
        .unwrap_or(Error::HttpError(error)))
}

#[derive(Clone, Deserialize)]
struct InternalToken {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
}

impl InternalToken {
    fn to_token(&self, now: OffsetDateTime) -> AccessToken {
        AccessToken {
            access_token: self.access_token.clone(),
            token_type: self.token_type.clone().unwrap_or_else(|| "Bearer".to_string()),
            expiry: self.expires_in.map(|s| now + time::Duration::seconds(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_token_expiry() {
        let now = OffsetDateTime::now_utc();
        let it: InternalToken =
            serde_json::from_str(r#"{"access_token":"ya29.x","token_type":"Bearer","expires_in":3599}"#).unwrap();
        let token = it.to_token(now);
        assert_eq!("ya29.x", token.access_token);
        assert_eq!(Some(now + time::Duration::seconds(3599)), token.expiry);

        let it: InternalToken = serde_json::from_str(r#"{"access_token":"ya29.x"}"#).unwrap();
        let token = it.to_token(now);
        assert_eq!("Bearer", token.token_type);
        assert!(token.expiry.is_none());
    }

    #[test]
    fn test_source_kind_priority() {
        let mut kinds = vec![
            SourceKind::StoredUser,
            SourceKind::Legacy,
            SourceKind::ServiceAccount,
            SourceKind::Ambient,
        ];
        kinds.sort();
        assert_eq!(
            vec![
                SourceKind::Ambient,
                SourceKind::ServiceAccount,
                SourceKind::StoredUser,
                SourceKind::Legacy
            ],
            kinds
        );
        assert_eq!("service_account", SourceKind::ServiceAccount.to_string());
    }
}
