use std::fmt::{Debug, Formatter};

use time::OffsetDateTime;

pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Seconds before the recorded expiry at which a token stops being handed out.
pub const EXPIRY_SKEW_SECONDS: i64 = 10;

/// A bearer access token. The token value is never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub expiry: Option<OffsetDateTime>,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>, expiry: Option<OffsetDateTime>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            expiry,
        }
    }

    /// value for the `Authorization` header.
    pub fn value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    pub fn valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired(EXPIRY_SKEW_SECONDS)
    }

    /// Returns true when `now + skew_seconds >= expiry`. A token without expiry never expires locally.
    pub fn is_expired(&self, skew_seconds: i64) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc(), skew_seconds)
    }

    pub(crate) fn is_expired_at(&self, now: OffsetDateTime, skew_seconds: i64) -> bool {
        match self.expiry {
            None => false,
            Some(expiry) => now + time::Duration::seconds(skew_seconds) >= expiry,
        }
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.access_token.chars().take(4).collect();
        f.debug_struct("AccessToken")
            .field("access_token", &format_args!("{prefix}***"))
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_with_skew() {
        let now = OffsetDateTime::now_utc();
        let token = AccessToken::new("ya29.token", Some(now + time::Duration::seconds(30)));
        assert!(!token.is_expired_at(now, 0));
        assert!(!token.is_expired_at(now, 29));
        assert!(token.is_expired_at(now, 30));
        assert!(token.is_expired_at(now, 60));
    }

    #[test]
    fn test_unknown_expiry_is_long_lived() {
        let token = AccessToken::new("ya29.token", None);
        assert!(!token.is_expired(i64::from(i32::MAX)));
        assert!(token.valid());
    }

    #[test]
    fn test_valid() {
        let now = OffsetDateTime::now_utc();
        assert!(!AccessToken::new("", None).valid());
        assert!(!AccessToken::new("ya29", Some(now + time::Duration::seconds(5))).valid());
        assert!(AccessToken::new("ya29", Some(now + time::Duration::minutes(5))).valid());
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = AccessToken::new("ya29.a0AfH6SMBsecretsecret", None);
        let printed = format!("{:?}", token);
        assert!(printed.contains("ya29***"));
        assert!(!printed.contains("secretsecret"));
        assert_eq!("Bearer ya29.a0AfH6SMBsecretsecret", token.value());
    }
}
