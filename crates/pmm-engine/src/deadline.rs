//! Adapter call deadlines.
//!
//! Every adapter call inside a tick is wrapped here; an elapsed deadline
//! surfaces as `AdapterError::Unknown` so the caller treats the outcome as
//! unresolved and lets the next reconciliation tick settle it.

use std::future::Future;
use std::time::Duration;

use pmm_adapter::{AdapterError, AdapterResult};

/// Await `fut` for at most `timeout_ms`, mapping a timeout to
/// `AdapterError::Unknown`.
pub async fn with_deadline<T, F>(timeout_ms: u64, fut: F) -> AdapterResult<T>
where
    F: Future<Output = AdapterResult<T>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Unknown(format!(
            "no reply within {timeout_ms} ms"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let result = with_deadline(1_000, async { Ok::<_, AdapterError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_slow_call_becomes_unknown() {
        let result = with_deadline(10, async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, AdapterError>(42)
        })
        .await;
        assert!(matches!(result, Err(AdapterError::Unknown(_))));
    }

    #[tokio::test]
    async fn test_error_passes_through() {
        let result: AdapterResult<u32> =
            with_deadline(1_000, async { Err(AdapterError::PostOnlyRejected) }).await;
        assert!(matches!(result, Err(AdapterError::PostOnlyRejected)));
    }
}
