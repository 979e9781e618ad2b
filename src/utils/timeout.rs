//! Timeout utilities for page driver operations
//!
//! Every browser call a session makes goes through [`with_timeout`] so that
//! a hung renderer can never stall a session indefinitely.

use std::future::Future;
use std::time::Duration;

use crate::page_driver::DriverError;

/// Wrap an async driver operation with an explicit timeout
///
/// Returns the operation's own error when it fails, and
/// [`DriverError::Timeout`] naming the operation when the deadline passes
/// first.
pub async fn with_timeout<F, T>(
    operation: F,
    timeout: Duration,
    operation_name: &'static str,
) -> Result<T, DriverError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout {
            operation: operation_name,
            after: timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let value = with_timeout(async { Ok(7) }, Duration::from_secs(1), "noop")
            .await
            .expect("fast operation should complete");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_reports_timeout_with_operation_name() {
        let result: Result<(), _> = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            Duration::from_millis(10),
            "goto",
        )
        .await;

        match result {
            Err(DriverError::Timeout { operation, .. }) => assert_eq!(operation, "goto"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_passes_inner_error_through() {
        let result: Result<(), _> = with_timeout(
            async { Err(DriverError::Navigation("net::ERR_NAME_NOT_RESOLVED".into())) },
            Duration::from_secs(1),
            "goto",
        )
        .await;
        assert!(matches!(result, Err(DriverError::Navigation(_))));
    }
}
