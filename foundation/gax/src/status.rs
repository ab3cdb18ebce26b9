use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// The HTTP status of a failed API call, reduced to what retry and re-authentication care about.
#[derive(Clone, PartialEq, Eq)]
pub struct Status {
    code: Code,
    message: String,
}

impl Status {
    pub fn new(code: impl Into<Code>, message: impl Into<String>) -> Self {
        Status {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP 429, the server asks the caller to back off.
    pub fn is_rate_limited(&self) -> bool {
        self.code == Code::TooManyRequests
    }

    /// HTTP 401, the bearer token was rejected.
    pub fn is_unauthenticated(&self) -> bool {
        self.code == Code::Unauthenticated
    }
}

impl Error for Status {}

impl Debug for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Status")
            .field("code", &self.code)
            .field("message", &self.message)
            .finish()
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "status: {}, message: {}", self.code.as_u16(), self.message)
    }
}

/// HTTP status codes used by [`Status`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Code {
    BadRequest,
    /// The request does not have valid authentication credentials.
    Unauthenticated,
    PermissionDenied,
    NotFound,
    /// Some resource has been exhausted, perhaps a per-user quota.
    TooManyRequests,
    Internal,
    Unavailable,
    Other(u16),
}

impl Code {
    pub fn as_u16(&self) -> u16 {
        match self {
            Code::BadRequest => 400,
            Code::Unauthenticated => 401,
            Code::PermissionDenied => 403,
            Code::NotFound => 404,
            Code::TooManyRequests => 429,
            Code::Internal => 500,
            Code::Unavailable => 503,
            Code::Other(code) => *code,
        }
    }
}

impl From<u16> for Code {
    fn from(code: u16) -> Self {
        match code {
            400 => Code::BadRequest,
            401 => Code::Unauthenticated,
            403 => Code::PermissionDenied,
            404 => Code::NotFound,
            429 => Code::TooManyRequests,
            500 => Code::Internal,
            503 => Code::Unavailable,
            other => Code::Other(other),
        }
    }
}

/// Views an error as a [`Status`] when it carries one.
pub trait TryAs<T> {
    fn try_as(&self) -> Option<&T>;
}

impl TryAs<Status> for Status {
    fn try_as(&self) -> Option<&Status> {
        Some(self)
    }
}
