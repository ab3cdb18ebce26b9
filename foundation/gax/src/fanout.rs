use std::future::Future;

use futures_util::future::join_all;

/// Runs `f` for every item concurrently and waits for all of them.
/// Results keep the order of `items`.
pub async fn fan_out<I, T, F, Fut, R, E>(items: I, f: F) -> Vec<Result<R, E>>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let tasks = items.into_iter().map(f);
    let results = join_all(tasks).await;
    tracing::trace!("fan out completed : count={}", results.len());
    results
}

/// Like [`fan_out`] but reports the first failure, in item order, after every call has finished.
pub async fn try_fan_out<I, T, F, Fut, R, E>(items: I, f: F) -> Result<Vec<R>, E>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    fan_out(items, f).await.into_iter().collect()
}
