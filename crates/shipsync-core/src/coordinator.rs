//! Single-flight run coordination.
//!
//! At most one sync run exists at a time, whatever triggered it. The
//! scheduled loop and manual triggers all go through [`SyncCoordinator`]:
//! `try_start` either claims the slot or reports a run in flight, `finish`
//! releases it and records the outcome, `snapshot` serves the status
//! endpoint. Callers that asked to wait park on a notify until the slot
//! frees up.

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

use shipsync_types::models::{SyncStats, SyncStatus, TriggerKind};
use shipsync_types::SyncError;

#[derive(Debug, Default)]
struct Inner {
    running: bool,
    running_since: Option<DateTime<Utc>>,
    last_trigger: Option<TriggerKind>,
    last_error: Option<String>,
    last_stats: Option<SyncStats>,
}

#[derive(Debug, Default)]
pub struct SyncCoordinator {
    inner: Mutex<Inner>,
    idle: Notify,
}

impl SyncCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the run slot. Returns false when a run is already in flight;
    /// the caller must not proceed in that case.
    pub async fn try_start(&self, trigger: TriggerKind) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.running {
            return false;
        }
        inner.running = true;
        inner.running_since = Some(Utc::now());
        inner.last_trigger = Some(trigger);
        true
    }

    /// Release the slot and record the run's outcome. Stats are retained on
    /// success; on failure only the error message is, never a backtrace.
    pub async fn finish(&self, result: Result<SyncStats, SyncError>) {
        {
            let mut inner = self.inner.lock().await;
            inner.running = false;
            inner.running_since = None;
            match result {
                Ok(stats) => {
                    inner.last_error = None;
                    inner.last_stats = Some(stats);
                },
                Err(err) => {
                    inner.last_error = Some(err.to_string());
                },
            }
        }
        self.idle.notify_waiters();
    }

    pub async fn snapshot(&self) -> SyncStatus {
        let inner = self.inner.lock().await;
        SyncStatus {
            running: inner.running,
            running_since: inner.running_since,
            last_trigger: inner.last_trigger,
            last_error: inner.last_error.clone(),
            last_stats: inner.last_stats.clone(),
        }
    }

    /// Resolve once no run is in flight. Returns immediately when idle.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if !self.inner.lock().await.running {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipsync_types::models::SyncMode;
    use std::sync::Arc;

    fn stats() -> SyncStats {
        SyncStats::empty(TriggerKind::Manual, SyncMode::Quick, Utc::now())
    }

    #[tokio::test]
    async fn test_second_start_rejected_until_finish() {
        let coord = SyncCoordinator::new();
        assert!(coord.try_start(TriggerKind::Scheduled).await);
        assert!(!coord.try_start(TriggerKind::Manual).await);

        coord.finish(Ok(stats())).await;
        assert!(coord.try_start(TriggerKind::Manual).await);
    }

    #[tokio::test]
    async fn test_snapshot_reflects_outcomes() {
        let coord = SyncCoordinator::new();
        assert!(coord.try_start(TriggerKind::Manual).await);

        let snap = coord.snapshot().await;
        assert!(snap.running);
        assert!(snap.running_since.is_some());
        assert_eq!(snap.last_trigger, Some(TriggerKind::Manual));

        coord.finish(Err(SyncError::MissingIdentifier)).await;
        let snap = coord.snapshot().await;
        assert!(!snap.running);
        assert!(snap.last_error.is_some());
        assert!(snap.last_stats.is_none());

        assert!(coord.try_start(TriggerKind::Scheduled).await);
        coord.finish(Ok(stats())).await;
        let snap = coord.snapshot().await;
        assert!(snap.last_error.is_none());
        assert!(snap.last_stats.is_some());
    }

    #[tokio::test]
    async fn test_wait_idle_parks_until_finish() {
        let coord = Arc::new(SyncCoordinator::new());
        assert!(coord.try_start(TriggerKind::Scheduled).await);

        let waiter = {
            let coord = coord.clone();
            tokio::spawn(async move { coord.wait_idle().await })
        };
        // Still running, the waiter must not have resolved.
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        coord.finish(Ok(stats())).await;
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_idle_immediate_when_idle() {
        let coord = SyncCoordinator::new();
        coord.wait_idle().await;
    }
}
