use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// The token fired before the raced future finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Extension trait for making futures cancellable.
///
/// The debouncer uses this to abandon a quiet-period timer when a newer
/// trigger for the same key arrives.
#[async_trait]
pub trait OrCancelExt: Sized {
    type Output;

    /// Resolves to `Ok(output)` if the future wins, `Err(Cancelled)` if the
    /// token fires first. An already-cancelled token always wins.
    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, Cancelled>;
}

#[async_trait]
impl<F> OrCancelExt for F
where
    F: Future + Send,
    F::Output: Send,
{
    type Output = F::Output;

    async fn or_cancel(self, token: &CancellationToken) -> Result<Self::Output, Cancelled> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Cancelled),
            res = self => Ok(res),
        }
    }
}
