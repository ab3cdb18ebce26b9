use google_connector_gax::cancel::Cancelled;
use google_connector_gax::status::{Status, TryAs};

/// Failure of an authenticated call. `E` is the caller's own call error.
#[derive(thiserror::Error, Debug)]
pub enum Error<E> {
    /// No token could be obtained. Configuration problems surface here before any call is made.
    #[error(transparent)]
    Auth(#[from] google_connector_auth::error::Error),

    /// The API kept answering 429 until the attempts ran out.
    #[error("rate limited after {attempts} attempts: {source}")]
    RateLimited { attempts: usize, source: E },

    #[error("call cancelled by the caller")]
    Cancelled,

    /// Any other call failure, passed through unchanged.
    #[error(transparent)]
    Call(E),
}

impl<E> Error<E> {
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::Auth(e) => e.is_configuration(),
            _ => false,
        }
    }
}

/// What the invoker sees: the caller's error, or the cancellation it raised itself.
pub(crate) enum Attempt<E> {
    Call(E),
    Cancelled,
}

impl<E> From<Cancelled> for Attempt<E> {
    fn from(_: Cancelled) -> Self {
        Attempt::Cancelled
    }
}

impl<E: TryAs<Status>> TryAs<Status> for Attempt<E> {
    fn try_as(&self) -> Option<&Status> {
        match self {
            Attempt::Call(e) => e.try_as(),
            Attempt::Cancelled => None,
        }
    }
}
