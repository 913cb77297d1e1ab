//! Cooperative cancellation helpers

use crate::error::{Error, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Race `fut` against `token`, returning [`Error::Cancelled`] if the token fires first
pub async fn with_cancel<F, T>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// Cancel `token` on the first Ctrl-C
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_cancel_passes_result_through() {
        let token = CancellationToken::new();
        let value = with_cancel(&token, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_with_cancel_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<()> = with_cancel(&token, std::future::pending()).await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
