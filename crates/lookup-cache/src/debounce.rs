//! Debouncer
//!
//! Each [`Debouncer::schedule`] call aborts the pending timer and starts a
//! new one, so only the last call of a burst fires.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `f` once `delay` has passed without another call. Returns `false`
    /// when there is no tokio runtime to schedule on; `f` is then dropped.
    pub fn schedule<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            return false;
        };

        let delay = self.delay;
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        }));
        true
    }

    /// Cancel the pending invocation. Returns whether one was waiting.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(task) => {
                let waiting = !task.is_finished();
                task.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once() {
        let debouncer = Debouncer::new(Duration::from_millis(16));
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let fired = Arc::clone(&fired);
            assert!(debouncer.schedule(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            }));
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_fire_separately() {
        let debouncer = Debouncer::new(Duration::from_millis(5));
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let fired = Arc::clone(&fired);
            debouncer.schedule(move || {
                fired.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let debouncer = Debouncer::new(Duration::from_millis(5));
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        debouncer.schedule(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_without_runtime() {
        let debouncer = Debouncer::new(Duration::from_millis(5));
        assert!(!debouncer.schedule(|| {}));
        assert!(!debouncer.is_pending());
    }
}
