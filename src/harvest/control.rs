//! Cooperative cancellation shared between a session, its manager and its timer

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use super::types::StopReason;

/// Cancellation handle for one session
///
/// Cheap to clone; all clones observe the same signal. The first reason
/// passed to [`cancel`](Self::cancel) wins, so a timer firing while the
/// session is being superseded cannot relabel the outcome.
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl SessionControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; later calls keep the first reason
    pub fn cancel(&self, reason: StopReason) {
        // Reason is set before the token fires so observers always see it
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation has been requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_reason_wins() {
        let control = SessionControl::new();
        assert!(!control.is_cancelled());
        assert_eq!(control.reason(), None);

        control.cancel(StopReason::Superseded);
        control.cancel(StopReason::TimedOut);

        assert!(control.is_cancelled());
        assert_eq!(control.reason(), Some(StopReason::Superseded));
    }

    #[tokio::test]
    async fn test_clones_share_signal() {
        let control = SessionControl::new();
        let timer = control.clone();

        let waiter = tokio::spawn({
            let control = control.clone();
            async move {
                control.cancelled().await;
                control.reason()
            }
        });

        timer.cancel(StopReason::TimedOut);

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert_eq!(reason, Some(StopReason::TimedOut));
    }
}
