//! Expiry timers for forming games
//!
//! Each forming game owns one [`ExpiryTimer`]. When the timer fires it does
//! not touch the game itself; it only posts an [`ExpiryRequest`] to the
//! coordinator's expiry worker, which re-checks the registry before acting.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Requests handled by the coordinator's expiry worker
#[derive(Debug)]
pub(crate) enum ExpiryRequest {
    /// A timer elapsed for the given formation
    Expire { channel: String, formation_id: Uuid },

    /// Stop the worker
    Shutdown,
}

/// Cancellable scheduled expiry
///
/// Cancelling is idempotent and safe after the timer already fired. Dropping
/// the timer cancels it.
#[derive(Debug)]
pub(crate) struct ExpiryTimer {
    task: JoinHandle<()>,
}

impl ExpiryTimer {
    /// Spawn a task that requests expiry of `formation_id` after `after`
    pub(crate) fn schedule(
        tx: mpsc::Sender<ExpiryRequest>,
        channel: String,
        formation_id: Uuid,
        after: Duration,
    ) -> Self {
        debug!(%channel, %formation_id, ?after, "ExpiryTimer::schedule: called");
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            debug!(%channel, %formation_id, "ExpiryTimer: elapsed");
            if tx
                .send(ExpiryRequest::Expire { channel, formation_id })
                .await
                .is_err()
            {
                debug!(%formation_id, "ExpiryTimer: expiry worker gone, dropping request");
            }
        });
        Self { task }
    }

    pub(crate) fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::channel(4);
        let id = Uuid::now_v7();
        let _timer = ExpiryTimer::schedule(tx, "C1".to_string(), id, Duration::from_secs(30));

        match rx.recv().await {
            Some(ExpiryRequest::Expire { channel, formation_id }) => {
                assert_eq!(channel, "C1");
                assert_eq!(formation_id, id);
            }
            other => panic!("Unexpected request: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::channel(4);
        let timer = ExpiryTimer::schedule(tx, "C1".to_string(), Uuid::now_v7(), Duration::from_secs(30));

        timer.cancel();
        timer.cancel();

        // The aborted task drops the only sender, so the channel closes empty
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (tx, mut rx) = mpsc::channel(4);
        let timer = ExpiryTimer::schedule(tx, "C1".to_string(), Uuid::now_v7(), Duration::from_secs(30));

        drop(timer);

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_harmless() {
        let (tx, mut rx) = mpsc::channel(4);
        let timer = ExpiryTimer::schedule(tx, "C1".to_string(), Uuid::now_v7(), Duration::from_millis(10));

        assert!(rx.recv().await.is_some());
        timer.cancel();
        assert!(rx.recv().await.is_none());
    }
}
