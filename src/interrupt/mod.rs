/*!
 * Abort-Aware Blocking Primitives
 *
 * Every worker thread started by a `TimeoutGuard` carries an abort context.
 * When the deadline expires the watcher aborts that context: the abort flag is
 * raised, the worker is unparked from whichever primitive of this module it is
 * blocked in, and (when configured) a signal knocks it out of a blocking
 * system call. The work does not poll for cancellation; each primitive
 * observes the abort at its blocking point and returns `Aborted`.
 *
 * Outside a guarded worker the primitives behave as ordinary blocking
 * primitives and never return `Aborted`.
 *
 * # Example
 *
 * ```
 * use hard_timeout::interrupt::{self, Condvar, Mutex};
 * use hard_timeout::{timeout, Aborted};
 *
 * let lock = Mutex::new(false);
 * let ready = Condvar::new();
 *
 * let result = timeout(0.01, || {
 *     let guard = lock.lock()?;
 *     let _guard = ready.wait_while(guard, |done| !*done)?;
 *     Ok::<_, Aborted>(())
 * });
 * assert!(result.unwrap_err().is_timeout());
 * assert!(!interrupt::is_aborted());
 * ```
 */

mod condvar;
mod mutex;
mod parking;
pub(crate) mod syscall;

pub use condvar::{Condvar, WaitTimeoutResult};
pub use mutex::{Mutex, MutexGuard};

pub use crate::errors::Aborted;
use parking::Wakeup;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

thread_local! {
    static CURRENT: RefCell<Option<Arc<AbortHandle>>> = const { RefCell::new(None) };
}

/// Abort context shared between a worker and its watcher
#[derive(Debug, Default)]
pub(crate) struct AbortHandle {
    aborted: AtomicBool,
    /// Parking key the worker is blocked on (0 when not parked)
    parked_on: AtomicUsize,
    #[cfg(target_os = "linux")]
    thread: std::sync::OnceLock<nix::sys::pthread::Pthread>,
}

impl AbortHandle {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[inline]
    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Install this context on the calling thread until the scope drops
    pub(crate) fn enter(self: &Arc<Self>) -> AbortScope {
        #[cfg(target_os = "linux")]
        let _ = self.thread.set(nix::sys::pthread::pthread_self());

        let previous = CURRENT.with(|current| current.replace(Some(Arc::clone(self))));
        AbortScope { previous }
    }

    /// Raise the abort flag and wake the worker if it is parked
    pub(crate) fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        let key = self.parked_on.load(Ordering::SeqCst);
        if key != 0 {
            let woken = parking::wake_all(key);
            trace!(woken, "unparked aborted worker");
        }
    }

    /// Send `signal` to the worker thread so a blocking syscall returns EINTR
    ///
    /// Returns false when the worker has not registered its thread yet or the
    /// delivery failed.
    #[cfg(target_os = "linux")]
    pub(crate) fn interrupt_syscall(&self, signal: nix::sys::signal::Signal) -> bool {
        match self.thread.get() {
            Some(&thread) => syscall::deliver(thread, signal),
            None => false,
        }
    }

    /// Stable parking key unique to this context
    #[inline]
    fn key(&self) -> usize {
        self as *const Self as usize
    }
}

/// Restores the previous abort context on drop
pub(crate) struct AbortScope {
    previous: Option<Arc<AbortHandle>>,
}

impl Drop for AbortScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

#[inline]
pub(crate) fn current() -> Option<Arc<AbortHandle>> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Check if the current worker has been aborted
pub fn is_aborted() -> bool {
    CURRENT.with(|current| current.borrow().as_ref().is_some_and(|handle| handle.is_aborted()))
}

/// Return `Err(Aborted)` if the current worker has been aborted
///
/// Use in CPU-bound loops and after system calls that failed with
/// `ErrorKind::Interrupted`.
#[inline]
pub fn checkpoint() -> Result<(), Aborted> {
    if is_aborted() {
        Err(Aborted)
    } else {
        Ok(())
    }
}

/// Sleep for `duration`, returning early if the current worker is aborted
pub fn sleep(duration: Duration) -> Result<(), Aborted> {
    let Some(handle) = current() else {
        thread::sleep(duration);
        return Ok(());
    };

    let deadline = Instant::now().checked_add(duration);
    loop {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Ok(());
        }
        match parking::park(Some(&handle), handle.key(), deadline, || true)? {
            Wakeup::TimedOut => return Ok(()),
            Wakeup::Woken => continue,
        }
    }
}

/// Block until the current worker is aborted
///
/// Outside a guarded worker this never returns.
pub fn block_until_aborted() -> Aborted {
    loop {
        if let Err(aborted) = sleep(Duration::MAX) {
            return aborted;
        }
    }
}
