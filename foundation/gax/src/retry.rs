use std::future::Future;
use std::iter::Take;
use std::time::Duration;

use tokio::select;

use crate::cancel::{CancellationToken, Cancelled};
use crate::status::{Code, Status, TryAs};

/// Yields the same delay forever. Bounded by [`Iterator::take`] in [`Retry::strategy`].
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Iterator for FixedBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.delay)
    }
}

pub trait Predicate<E> {
    fn should_retry(&mut self, error: &E) -> bool;
}

pub trait Retry<E: TryAs<Status>, T: Predicate<E>> {
    /// Delays between attempts. The number of items is the number of retries.
    fn strategy(&self) -> Take<FixedBackoff>;
    fn predicate(&self) -> T;
}

pub struct CodePredicate {
    codes: Vec<Code>,
}

impl CodePredicate {
    pub fn new(codes: Vec<Code>) -> Self {
        Self { codes }
    }
}

impl<E> Predicate<E> for CodePredicate
where
    E: TryAs<Status>,
{
    fn should_retry(&mut self, error: &E) -> bool {
        match error.try_as() {
            Some(status) => self.codes.contains(&status.code()),
            None => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RetrySetting {
    /// Wait between two attempts.
    pub delay: Duration,
    /// Total attempts including the first one.
    pub max_attempts: usize,
    pub codes: Vec<Code>,
}

impl<E: TryAs<Status>> Retry<E, CodePredicate> for RetrySetting {
    fn strategy(&self) -> Take<FixedBackoff> {
        FixedBackoff::new(self.delay).take(self.max_attempts.saturating_sub(1))
    }

    fn predicate(&self) -> CodePredicate {
        CodePredicate::new(self.codes.clone())
    }
}

impl Default for RetrySetting {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 3,
            codes: vec![Code::TooManyRequests],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Attempting,
    Backoff,
    Succeeded,
    Failed,
}

fn transition(from: &mut State, to: State, attempt: usize) {
    tracing::trace!("retry state : from={:?} to={:?} attempt={}", from, to, attempt);
    *from = to;
}

/// The outcome of [`invoke_counted`] along with how many times the action ran.
#[derive(Debug)]
pub struct Invocation<R, E> {
    pub result: Result<R, E>,
    pub attempts: usize,
}

/// Runs `a` until it succeeds, fails with an error the predicate rejects,
/// or the attempts run out. Waiting between attempts and the attempts themselves
/// are interrupted by `cancel`.
pub async fn invoke<A, R, RT, C, E>(
    cancel: Option<CancellationToken>,
    retry: Option<RT>,
    a: impl FnMut() -> A,
) -> Result<R, E>
where
    E: TryAs<Status> + From<Cancelled>,
    A: Future<Output = Result<R, E>>,
    C: Predicate<E>,
    RT: Retry<E, C> + Default,
{
    invoke_counted(cancel, retry, a).await.result
}

pub async fn invoke_counted<A, R, RT, C, E>(
    cancel: Option<CancellationToken>,
    retry: Option<RT>,
    mut a: impl FnMut() -> A,
) -> Invocation<R, E>
where
    E: TryAs<Status> + From<Cancelled>,
    A: Future<Output = Result<R, E>>,
    C: Predicate<E>,
    RT: Retry<E, C> + Default,
{
    let retry = retry.unwrap_or_default();
    let mut strategy = retry.strategy();
    let mut predicate = retry.predicate();
    let mut state = State::Attempting;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let result = match &cancel {
            Some(cancel) => {
                select! {
                    biased;
                    _ = cancel.cancelled() => Err(Cancelled),
                    v = a() => Ok(v),
                }
            }
            None => Ok(a().await),
        };
        let error = match result {
            Err(cancelled) => {
                transition(&mut state, State::Failed, attempts);
                return Invocation {
                    result: Err(cancelled.into()),
                    attempts,
                };
            }
            Ok(Ok(v)) => {
                transition(&mut state, State::Succeeded, attempts);
                return Invocation { result: Ok(v), attempts };
            }
            Ok(Err(e)) => e,
        };

        let delay = if predicate.should_retry(&error) {
            strategy.next()
        } else {
            None
        };
        let delay = match delay {
            Some(delay) => delay,
            None => {
                transition(&mut state, State::Failed, attempts);
                return Invocation {
                    result: Err(error),
                    attempts,
                };
            }
        };

        transition(&mut state, State::Backoff, attempts);
        let waited = match &cancel {
            Some(cancel) => cancel.sleep(delay).await,
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        };
        if let Err(cancelled) = waited {
            transition(&mut state, State::Failed, attempts);
            return Invocation {
                result: Err(cancelled.into()),
                attempts,
            };
        }
        transition(&mut state, State::Attempting, attempts);
    }
}

/// [`invoke_counted`] bound to one [`RetrySetting`].
#[derive(Clone, Debug, Default)]
pub struct RetryingInvoker {
    setting: RetrySetting,
}

impl RetryingInvoker {
    pub fn new(setting: RetrySetting) -> Self {
        Self { setting }
    }

    pub fn setting(&self) -> &RetrySetting {
        &self.setting
    }

    pub async fn invoke<A, R, E>(&self, cancel: Option<CancellationToken>, a: impl FnMut() -> A) -> Invocation<R, E>
    where
        E: TryAs<Status> + From<Cancelled>,
        A: Future<Output = Result<R, E>>,
    {
        invoke_counted(cancel, Some(self.setting.clone()), a).await
    }
}
