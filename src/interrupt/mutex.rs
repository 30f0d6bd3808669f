/*!
 * Abortable Mutex
 *
 * `parking_lot::Mutex` acquired through `try_lock`, with contended waiters
 * parked on a release generation counter so an aborted worker can be pulled
 * out of the wait.
 */

use super::parking;
use crate::errors::Aborted;
use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Mutual exclusion lock whose `lock` returns `Aborted` when the waiting worker is aborted
pub struct Mutex<T: ?Sized> {
    /// Bumped on every release; doubles as the parking key
    generation: AtomicUsize,
    /// Threads parked (or about to park) in `lock`
    waiters: AtomicUsize,
    inner: parking_lot::Mutex<T>,
}

impl<T> Mutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            generation: AtomicUsize::new(0),
            waiters: AtomicUsize::new(0),
            inner: parking_lot::const_mutex(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquire the lock, blocking until it is free or the current worker is aborted
    pub fn lock(&self) -> Result<MutexGuard<'_, T>, Aborted> {
        let handle = super::current();
        loop {
            // Read before trying so a release between the attempt and the park
            // is seen by the validate callback.
            let seen = self.generation.load(Ordering::SeqCst);
            if let Some(guard) = self.try_lock() {
                return Ok(guard);
            }
            let still_held = || self.generation.load(Ordering::SeqCst) == seen;
            self.waiters.fetch_add(1, Ordering::SeqCst);
            let parked = parking::park(handle.as_deref(), self.key(), None, still_held);
            self.waiters.fetch_sub(1, Ordering::SeqCst);
            parked?;
        }
    }

    /// Acquire the lock if it is free
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.inner.try_lock().map(|guard| MutexGuard {
            mutex: self,
            guard: ManuallyDrop::new(guard),
        })
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    #[inline]
    fn key(&self) -> usize {
        &self.generation as *const AtomicUsize as usize
    }

    fn released(&self) {
        // A waiter registers before its validate callback reads the generation,
        // so either it sees this bump and skips parking or we see it here.
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return;
        }
        // Wake all: a single woken waiter may be an aborted worker that leaves
        // without taking the lock.
        parking::wake_all(self.key());
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(guard) => f.debug_struct("Mutex").field("data", &&*guard).finish(),
            None => f.debug_struct("Mutex").field("data", &"<locked>").finish(),
        }
    }
}

/// RAII guard for `Mutex`; releases and wakes waiters on drop
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
    guard: ManuallyDrop<parking_lot::MutexGuard<'a, T>>,
}

impl<'a, T: ?Sized> MutexGuard<'a, T> {
    pub(crate) fn mutex(&self) -> &'a Mutex<T> {
        self.mutex
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the inner guard is dropped exactly once, here.
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        self.mutex.released();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::AbortHandle;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_lock_uncontended() {
        let mutex = Mutex::new(1);
        *mutex.lock().unwrap() += 1;
        assert_eq!(mutex.into_inner(), 2);
    }

    #[test]
    fn test_try_lock_while_held() {
        let mutex = Mutex::new(());
        let _held = mutex.lock().unwrap();
        assert!(mutex.try_lock().is_none());
    }

    #[test]
    fn test_contended_lock_handoff() {
        let mutex = Mutex::new(0u32);

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..1000 {
                        *mutex.lock().unwrap() += 1;
                    }
                });
            }
        });

        assert_eq!(*mutex.lock().unwrap(), 4000);
        assert_eq!(mutex.waiters.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_uncontended_release_has_no_waiters() {
        let mutex = Mutex::new(0);
        for _ in 0..100 {
            *mutex.lock().unwrap() += 1;
            assert_eq!(mutex.waiters.load(Ordering::SeqCst), 0);
        }
        assert_eq!(mutex.into_inner(), 100);
    }

    #[test]
    fn test_waiter_registered_while_parked() {
        let mutex = Mutex::new(());
        let held = mutex.lock().unwrap();

        thread::scope(|scope| {
            let waiter = scope.spawn(|| drop(mutex.lock().unwrap()));
            let deadline = Instant::now() + Duration::from_secs(5);
            while mutex.waiters.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
                thread::yield_now();
            }
            assert_eq!(mutex.waiters.load(Ordering::SeqCst), 1);
            drop(held);
            waiter.join().unwrap();
        });

        assert_eq!(mutex.waiters.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_abort_while_waiting_for_lock() {
        let mutex = Mutex::new(());
        let handle = AbortHandle::new();
        let _held = mutex.lock().unwrap();
        let start = Instant::now();

        let result = thread::scope(|scope| {
            let waiter = scope.spawn(|| {
                let _scope = handle.enter();
                mutex.lock().map(|_| ())
            });
            thread::sleep(Duration::from_millis(20));
            handle.abort();
            waiter.join().unwrap()
        });

        assert_eq!(result, Err(Aborted));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(mutex.waiters.load(Ordering::SeqCst), 0);
    }
}
