/*!
 * Abortable Condition Variable
 *
 * Sequence-counter condvar in the style of a futex condvar: a waiter samples
 * the counter while still holding the mutex, releases the mutex and parks
 * only if the counter is unchanged. A notifier must have taken the mutex to
 * change the guarded state, so its increment always lands after the sample.
 */

use super::mutex::MutexGuard;
use super::parking::{self, Wakeup};
use crate::errors::Aborted;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Whether a timed wait returned because its timeout elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeoutResult(bool);

impl WaitTimeoutResult {
    #[inline]
    pub fn timed_out(&self) -> bool {
        self.0
    }
}

/// Condition variable paired with `interrupt::Mutex`
///
/// Waits return `Err(Aborted)` as soon as the waiting worker is aborted; the
/// mutex is not re-acquired in that case.
#[derive(Debug, Default)]
pub struct Condvar {
    sequence: AtomicUsize,
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            sequence: AtomicUsize::new(0),
        }
    }

    /// Block until notified
    ///
    /// Spurious wakeups are possible; use `wait_while` to wait for a condition.
    pub fn wait<'a, T: ?Sized>(&self, guard: MutexGuard<'a, T>) -> Result<MutexGuard<'a, T>, Aborted> {
        self.park(guard, None).map(|(guard, _)| guard)
    }

    /// Block while `condition` holds
    pub fn wait_while<'a, T, F>(
        &self,
        mut guard: MutexGuard<'a, T>,
        mut condition: F,
    ) -> Result<MutexGuard<'a, T>, Aborted>
    where
        T: ?Sized,
        F: FnMut(&mut T) -> bool,
    {
        while condition(&mut *guard) {
            guard = self.wait(guard)?;
        }
        Ok(guard)
    }

    /// Block until notified or `timeout` elapses
    pub fn wait_timeout<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> Result<(MutexGuard<'a, T>, WaitTimeoutResult), Aborted> {
        self.park(guard, Instant::now().checked_add(timeout))
    }

    /// Wake one waiter
    pub fn notify_one(&self) -> bool {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        parking::wake_one(self.key()) > 0
    }

    /// Wake all waiters
    pub fn notify_all(&self) -> usize {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        parking::wake_all(self.key())
    }

    fn park<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        deadline: Option<Instant>,
    ) -> Result<(MutexGuard<'a, T>, WaitTimeoutResult), Aborted> {
        let handle = super::current();
        let seen = self.sequence.load(Ordering::SeqCst);
        let mutex = guard.mutex();
        drop(guard);

        let unchanged = || self.sequence.load(Ordering::SeqCst) == seen;
        let reacquired = parking::park(handle.as_deref(), self.key(), deadline, unchanged)
            .and_then(|wakeup| Ok((mutex.lock()?, wakeup)));

        match reacquired {
            Ok((guard, wakeup)) => Ok((guard, WaitTimeoutResult(wakeup == Wakeup::TimedOut))),
            Err(aborted) => {
                // Forward a notification this waiter may have consumed, whether
                // the abort hit the park or the re-lock.
                self.notify_one();
                Err(aborted)
            }
        }
    }

    #[inline]
    fn key(&self) -> usize {
        &self.sequence as *const AtomicUsize as usize
    }
}
