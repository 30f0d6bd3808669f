/*!
 * Completion Signal
 *
 * One-shot channel from worker to watcher. Capacity one: the first notify is
 * buffered so a watcher that starts waiting late still sees it, later notifies
 * are dropped.
 */

use flume::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug)]
pub(crate) struct CompletionSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl CompletionSignal {
    pub(crate) fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Signal completion; never blocks
    pub(crate) fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                trace!("completion already signalled");
                false
            }
            Err(TrySendError::Disconnected(())) => {
                trace!("completion receiver gone");
                false
            }
        }
    }

    /// Wait up to `limit` for completion; true if it was signalled
    pub(crate) fn wait_for(&self, limit: Duration) -> bool {
        let result = match Instant::now().checked_add(limit) {
            Some(deadline) => self.rx.recv_deadline(deadline),
            None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match result {
            Ok(()) => true,
            // Both halves live in the signal, so this means it is being torn down.
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_notify_before_wait() {
        let signal = CompletionSignal::new();
        assert!(signal.notify());
        assert!(signal.wait_for(Duration::ZERO));
    }

    #[test]
    fn test_second_notify_is_harmless() {
        let signal = CompletionSignal::new();
        assert!(signal.notify());
        assert!(!signal.notify());
        assert!(signal.wait_for(Duration::from_millis(1)));
    }

    #[test]
    fn test_wait_times_out() {
        let signal = CompletionSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_for(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_notify_from_other_thread() {
        let signal = CompletionSignal::new();
        thread::scope(|scope| {
            scope.spawn(|| {
                thread::sleep(Duration::from_millis(10));
                signal.notify();
            });
            assert!(signal.wait_for(Duration::from_secs(5)));
        });
    }

    #[test]
    fn test_unbounded_limit() {
        let signal = CompletionSignal::new();
        signal.notify();
        assert!(signal.wait_for(Duration::MAX));
    }
}
