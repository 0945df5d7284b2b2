//! Background liveness sweeps
//!
//! The sweep loop sleeps for the interval, runs one sweep to completion and
//! only then sleeps again, so two sweeps never overlap. It stops on its own
//! once the swept target is gone.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Entries validated between yields to the runtime
pub const SWEEP_CHUNK: usize = 64;

/// Something the sweep loop can run against
#[async_trait]
pub(crate) trait SweepTarget: Send + Sync + 'static {
    /// Validate every entry, returning how many were removed
    async fn sweep_incremental(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct Sweeper {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn start<T: SweepTarget>(
        &self,
        runtime: &Handle,
        interval: Duration,
        target: Weak<T>,
    ) {
        let mut task = self.task.lock();
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }

        tracing::debug!("Sweeper started with interval {:?}", interval);
        *task = Some(runtime.spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(target) = target.upgrade() else {
                    break;
                };
                target.sweep_incremental().await;
            }
        }));
    }

    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::debug!("Sweeper stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(AtomicUsize);

    #[async_trait]
    impl SweepTarget for Counting {
        async fn sweep_incremental(&self) -> usize {
            self.0.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_on_interval() {
        let target = Arc::new(Counting(AtomicUsize::new(0)));
        let sweeper = Sweeper::new();
        sweeper.start(
            &Handle::current(),
            Duration::from_secs(1),
            Arc::downgrade(&target),
        );
        assert!(sweeper.is_running());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(target.0.load(Ordering::SeqCst), 3);

        sweeper.stop();
        assert!(!sweeper.is_running());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(target.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_target_dropped() {
        let target = Arc::new(Counting(AtomicUsize::new(0)));
        let sweeper = Sweeper::new();
        sweeper.start(
            &Handle::current(),
            Duration::from_millis(100),
            Arc::downgrade(&target),
        );

        drop(target);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!sweeper.is_running());
    }
}
