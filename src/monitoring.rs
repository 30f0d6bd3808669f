/*!
 * Timeout Observability
 *
 * Per-guard counters for timeout events. Counters are monotonic except
 * `active_threads`, which tracks guard threads that have not yet exited.
 */

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Live counters owned by a `TimeoutGuard`
#[derive(Debug)]
pub struct GuardStats {
    runs: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    bypassed: AtomicU64,
    spawn_failures: AtomicU64,
    syscall_interrupts: AtomicU64,
    active_threads: AtomicUsize,
}

/// Point-in-time copy of `GuardStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub runs: u64,
    pub completed: u64,
    pub timed_out: u64,
    pub bypassed: u64,
    pub spawn_failures: u64,
    pub syscall_interrupts: u64,
    pub active_threads: usize,
}

impl GuardStats {
    pub const fn new() -> Self {
        Self {
            runs: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            bypassed: AtomicU64::new(0),
            spawn_failures: AtomicU64::new(0),
            syscall_interrupts: AtomicU64::new(0),
            active_threads: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
            syscall_interrupts: self.syscall_interrupts.load(Ordering::Relaxed),
            active_threads: self.active_threads.load(Ordering::Acquire),
        }
    }

    /// Guard threads currently alive
    #[inline]
    pub fn active_threads(&self) -> usize {
        self.active_threads.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_bypass(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_spawn_failure(&self) {
        self.spawn_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_syscall_interrupt(&self) {
        self.syscall_interrupts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count the calling thread as active until the returned ticket drops
    pub(crate) fn enter_thread(&self) -> ThreadTicket<'_> {
        self.active_threads.fetch_add(1, Ordering::AcqRel);
        ThreadTicket { stats: self }
    }
}

impl Default for GuardStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements `active_threads` on drop, including during unwinding
pub(crate) struct ThreadTicket<'a> {
    stats: &'a GuardStats,
}

impl Drop for ThreadTicket<'_> {
    fn drop(&mut self) {
        self.stats.active_threads.fetch_sub(1, Ordering::AcqRel);
    }
}
