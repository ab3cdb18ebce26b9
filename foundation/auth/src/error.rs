use std::fmt;

/// Coarse classification used by the resolver and by callers that need to
/// tell "fix your settings" apart from "the identity provider said no".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Authentication,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid setting `{field}`: {message}")]
    Configuration { field: &'static str, message: String },

    #[error("unsupported account {0}")]
    UnsupportedAccountType(String),

    #[error("unsupported configuration format {0}")]
    UnsupportedFormat(String),

    #[error("unknown scope name {0}")]
    UnknownScope(String),

    #[error("refresh token is required for user account credentials")]
    RefreshTokenIsRequired,

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    HttpError(#[from] reqwest::Error),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error("credentials file could not be read: {0}")]
    CredentialsIOError(std::io::Error),

    #[error("key file {path} could not be read: {source}")]
    KeyFileIOError { path: String, source: std::io::Error },

    #[error("user home directory not found")]
    NoHomeDirectoryFound,

    #[error("Private Key is required")]
    NoPrivateKeyFound,

    #[error("invalid PKCS#12 container: {0}")]
    InvalidPkcs12(String),

    #[error("no private key with alias {0} in PKCS#12 container")]
    KeyAliasNotFound(String),

    #[error("token source returned an empty or expired token")]
    InvalidToken,

    #[error("token endpoint responded with {status}: {error} {error_description:?}")]
    TokenErrorResponse {
        status: u16,
        error: String,
        error_description: Option<String>,
    },

    #[error("live credential could not be refreshed: {0}")]
    LiveCredential(String),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl Error {
    pub(crate) fn missing(field: &'static str) -> Self {
        Error::Configuration {
            field,
            message: "required but not set".to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration { .. }
            | Error::UnsupportedAccountType(_)
            | Error::UnsupportedFormat(_)
            | Error::UnknownScope(_)
            | Error::RefreshTokenIsRequired
            | Error::NoPrivateKeyFound => ErrorKind::Configuration,
            Error::Resolution(e) if e.is_configuration_only() => ErrorKind::Configuration,
            _ => ErrorKind::Authentication,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

/// Error body returned by the OAuth2 token endpoint.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub(crate) error: String,
    pub(crate) error_description: Option<String>,
}

/// One failed attempt of a credential resolution.
#[derive(Debug)]
pub struct Attempt {
    pub source: String,
    pub error: Error,
}

/// Every candidate failed. The attempts are kept in the order they were made.
#[derive(Debug, Default)]
pub struct ResolutionError {
    pub attempts: Vec<Attempt>,
}

impl ResolutionError {
    pub(crate) fn push(&mut self, source: impl Into<String>, error: Error) {
        self.attempts.push(Attempt {
            source: source.into(),
            error,
        });
    }

    pub fn last(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    /// true when nothing was rejected by an identity provider, only settings were missing or invalid.
    pub fn is_configuration_only(&self) -> bool {
        self.attempts.iter().all(|a| a.error.is_configuration())
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts.is_empty() {
            return write!(f, "no credential source configured");
        }
        write!(f, "no credential source produced a token")?;
        for attempt in &self.attempts {
            write!(f, "; {}: {}", attempt.source, attempt.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolutionError {}
