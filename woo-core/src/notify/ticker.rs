//! Batch Ticker
//!
//! Background tokio task that flushes a [`ChangeNotifier`] on a fixed
//! interval. The task holds the notifier weakly and stops on its own once
//! the runtime is dropped.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::notifier::ChangeNotifier;

/// Handle to a running batch ticker. Dropping it stops the task.
#[derive(Debug)]
pub struct BatchTicker {
    handle: JoinHandle<()>,
}

impl BatchTicker {
    /// Spawn the ticker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(notifier: &Arc<ChangeNotifier>) -> Self {
        let period = notifier.interval();
        let notifier = Arc::downgrade(notifier);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(notifier) = notifier.upgrade() else {
                    tracing::debug!("notifier dropped, stopping batch ticker");
                    break;
                };
                let report = notifier.flush();
                if !report.is_idle() {
                    tracing::trace!(?report, "batch dispatched");
                }
            }
        });

        Self { handle }
    }

    /// Check if the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the ticker. Pending notices stay queued.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for BatchTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
