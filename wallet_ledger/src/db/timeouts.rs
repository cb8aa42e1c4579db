//! Database query timeout helpers
//!
//! Store calls are bounded so that a stuck connection fails the request
//! instead of hanging it. A timed-out transaction is dropped, which rolls it back.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::ledger::{LedgerError, LedgerResult};

/// Default timeout for database queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Execute a store operation with timeout
///
/// # Arguments
///
/// * `duration` - Timeout duration
/// * `future` - Async operation to execute
///
/// # Returns
///
/// * `LedgerResult<T>` - Result, or `LedgerError::Timeout`
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> LedgerResult<T>
where
    F: Future<Output = Result<T, E>>,
    LedgerError: From<E>,
{
    match timeout(duration, future).await {
        Ok(result) => result.map_err(LedgerError::from),
        Err(_) => Err(LedgerError::Timeout(duration)),
    }
}

/// Execute a query with default timeout (5 seconds)
pub async fn with_default_timeout<F, T, E>(future: F) -> LedgerResult<T>
where
    F: Future<Output = Result<T, E>>,
    LedgerError: From<E>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), async {
            Ok::<_, LedgerError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_expires() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, LedgerError>(42)
        })
        .await;
        assert!(matches!(result, Err(LedgerError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_timeout_propagates_error() {
        let result = with_default_timeout(async {
            Err::<i32, _>(LedgerError::InvalidSignature)
        })
        .await;
        assert!(matches!(result, Err(LedgerError::InvalidSignature)));
    }
}
