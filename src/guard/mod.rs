/*!
 * Timeout Guard
 *
 * Runs work on a dedicated worker thread while a watcher thread waits on a
 * one-shot completion signal for the time limit.
 *
 * # Race
 *
 * The worker and the watcher both try to claim the outcome of the run. If
 * the worker finishes first its result is returned unchanged. If the
 * deadline claims it, the caller gets a timeout error and whatever the
 * worker produces afterwards is discarded.
 *
 * # Abort
 *
 * Threads are not killed. The watcher aborts the worker's context: the
 * blocking primitives in `interrupt` return `Aborted`, and with syscall
 * interrupts configured a signal makes blocking system calls fail with
 * `EINTR`. The caller returns once the worker has unwound, so no thread
 * outlives a call.
 *
 * # Example
 *
 * ```
 * use hard_timeout::{GuardConfig, TimeoutGuard};
 *
 * let guard = TimeoutGuard::new(GuardConfig::new().with_thread_name("lookup"));
 * let value = guard.run(0.5, || Ok::<_, std::io::Error>(42)).unwrap();
 * assert_eq!(value, 42);
 * assert_eq!(guard.stats().snapshot().completed, 1);
 * ```
 */

mod race;
mod signal;
mod watcher;

use crate::config::GuardConfig;
use crate::errors::{saturating_millis, Error, SpawnError, TimeoutError};
use crate::interrupt::AbortHandle;
use crate::monitoring::GuardStats;
use crate::seconds::{self, IntoSeconds};
use race::RaceCell;
use signal::CompletionSignal;
use std::panic::resume_unwind;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use watcher::{Verdict, Watcher};

static DEFAULT_GUARD: TimeoutGuard = TimeoutGuard::new(GuardConfig::new());

/// Process-wide guard used by the free entry points
#[inline]
pub fn default_guard() -> &'static TimeoutGuard {
    &DEFAULT_GUARD
}

/// Outcome of a race that got both threads started
pub(crate) enum Resolution<T, E> {
    /// The work finished first; carries its result or its panic
    Completed(thread::Result<Result<T, E>>),
    TimedOut(TimeoutError),
}

/// Claims the outcome and signals the watcher when the work returns or unwinds
struct CompletionNotice<'a> {
    signal: &'a CompletionSignal,
    race: &'a RaceCell,
}

impl Drop for CompletionNotice<'_> {
    fn drop(&mut self) {
        if !self.race.complete() {
            trace!("work returned after the deadline, result discarded");
        }
        self.signal.notify();
    }
}

/// Runs work under a hard time limit
#[derive(Debug)]
pub struct TimeoutGuard {
    config: GuardConfig,
    stats: GuardStats,
}

impl TimeoutGuard {
    pub const fn new(config: GuardConfig) -> Self {
        Self {
            config,
            stats: GuardStats::new(),
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn stats(&self) -> &GuardStats {
        &self.stats
    }

    /// Run `work`, failing with `TimeoutError` if it takes longer than `seconds`
    ///
    /// A missing or invalid `seconds` fails with `Error::Argument` before the
    /// work starts. A panic in the work is resumed on the calling thread.
    pub fn run<S, T, E, F>(&self, seconds: S, work: F) -> Result<T, Error<E>>
    where
        S: IntoSeconds,
        F: FnOnce() -> Result<T, E> + Send,
        T: Send,
        E: Send,
    {
        self.run_with(seconds, |err| err, work)
    }

    /// Like `run`, with the timeout mapped into a caller-chosen kind
    pub fn run_with<S, K, M, T, E, F>(&self, seconds: S, kind: M, work: F) -> Result<T, Error<E, K>>
    where
        S: IntoSeconds,
        M: FnOnce(TimeoutError) -> K,
        F: FnOnce() -> Result<T, E> + Send,
        T: Send,
        E: Send,
    {
        let limit = seconds::required(seconds)?;
        self.run_for(limit, kind, work)
    }

    pub(crate) fn run_for<K, M, T, E, F>(&self, limit: Duration, kind: M, work: F) -> Result<T, Error<E, K>>
    where
        M: FnOnce(TimeoutError) -> K,
        F: FnOnce() -> Result<T, E> + Send,
        T: Send,
        E: Send,
    {
        match self.race(limit, work)? {
            Resolution::Completed(Ok(result)) => result.map_err(Error::Work),
            Resolution::Completed(Err(panic)) => resume_unwind(panic),
            Resolution::TimedOut(err) => Err(Error::Timeout(kind(err))),
        }
    }

    fn race<T, E, F>(&self, limit: Duration, work: F) -> Result<Resolution<T, E>, SpawnError>
    where
        F: FnOnce() -> Result<T, E> + Send,
        T: Send,
        E: Send,
    {
        let stats = &self.stats;
        stats.record_run();

        let started = Instant::now();
        let syscall_signal = watcher::prepare_syscall_signal(&self.config);
        let signal = CompletionSignal::new();
        let race = RaceCell::new();
        let abort = AbortHandle::new();
        debug!(timeout_ms = saturating_millis(limit), "starting guarded run");

        let resolution = thread::scope(|scope| {
            let watcher = Watcher {
                signal: &signal,
                race: &race,
                abort: &*abort,
                config: &self.config,
                stats,
                limit,
                started,
                syscall_signal,
            };
            let watcher = self
                .config
                .spawn_scoped(scope, "watcher", move || watcher.run())
                .map_err(|err| SpawnError::new("watcher", err))?;

            let (signal, race, abort) = (&signal, &race, &abort);
            let worker = self.config.spawn_scoped(scope, "worker", move || {
                let _ticket = stats.enter_thread();
                let _scope = abort.enter();
                let _notice = CompletionNotice { signal, race };
                work()
            });
            let worker = match worker {
                Ok(worker) => worker,
                Err(err) => {
                    race.complete();
                    signal.notify();
                    let _ = watcher.join();
                    return Err(SpawnError::new("worker", err));
                }
            };

            let verdict = match watcher.join() {
                Ok(verdict) => verdict,
                Err(panic) => {
                    abort.abort();
                    let _ = worker.join();
                    resume_unwind(panic)
                }
            };
            let outcome = worker.join();

            match verdict {
                Verdict::Completed => {
                    stats.record_completed();
                    debug!(elapsed_ms = saturating_millis(started.elapsed()), "guarded run completed");
                    Ok(Resolution::Completed(outcome))
                }
                Verdict::Expired(elapsed) => {
                    stats.record_timeout();
                    if outcome.is_err() {
                        trace!("aborted work panicked while unwinding");
                    }
                    let err = TimeoutError::new(limit, elapsed);
                    warn!(
                        timeout_ms = err.timeout_ms,
                        elapsed_ms = err.elapsed_ms,
                        unwind_ms = saturating_millis(started.elapsed().saturating_sub(elapsed)),
                        "execution expired"
                    );
                    Ok(Resolution::TimedOut(err))
                }
            }
        });

        if let Err(err) = &resolution {
            stats.record_spawn_failure();
            warn!(role = err.role, error = %err.source, "guarded run could not start");
        }
        resolution
    }
}

impl Default for TimeoutGuard {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Aborted, ArgumentError};
    use crate::interrupt;

    #[test]
    fn test_fast_work_returns_value() {
        let guard = TimeoutGuard::default();
        let value = guard.run(5.0, || Ok::<_, Aborted>(7)).unwrap();
        assert_eq!(value, 7);

        let stats = guard.stats().snapshot();
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.timed_out, 0);
        assert_eq!(stats.active_threads, 0);
    }

    #[test]
    fn test_blocking_work_times_out() {
        let guard = TimeoutGuard::default();
        let start = Instant::now();

        let err = guard
            .run(0.01, || {
                interrupt::sleep(Duration::from_secs(30))?;
                Ok::<_, Aborted>(())
            })
            .unwrap_err();

        assert!(start.elapsed() < Duration::from_millis(200));
        match err {
            Error::Timeout(timeout) => {
                assert_eq!(timeout.timeout_ms, 10);
                assert!(timeout.elapsed_ms >= 10);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        let stats = guard.stats().snapshot();
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.active_threads, 0);
    }

    #[test]
    fn test_work_error_propagates() {
        let guard = TimeoutGuard::default();
        let err = guard.run(5u64, || Err::<(), _>("boom")).unwrap_err();
        assert_eq!(err.into_work(), Some("boom"));
    }

    #[test]
    fn test_missing_seconds_never_runs_work() {
        let guard = TimeoutGuard::default();
        let err = guard
            .run(None::<f64>, || -> Result<(), Aborted> { panic!("must not run") })
            .unwrap_err();

        assert!(matches!(err, Error::Argument(ArgumentError::MissingSeconds)));
        assert_eq!(guard.stats().snapshot().runs, 0);
    }

    #[test]
    fn test_custom_timeout_kind() {
        #[derive(Debug, PartialEq)]
        struct SlowQuery(u64);

        let guard = TimeoutGuard::default();
        let err = guard
            .run_with(
                0.01,
                |err| SlowQuery(err.timeout_ms),
                || {
                    interrupt::sleep(Duration::from_secs(30))?;
                    Ok::<_, Aborted>(())
                },
            )
            .unwrap_err();

        assert_eq!(err.timeout(), Some(&SlowQuery(10)));
    }

    #[test]
    fn test_zero_seconds_times_out_blocking_work() {
        let guard = TimeoutGuard::default();
        let err = guard
            .run(0u64, || {
                interrupt::sleep(Duration::from_secs(30))?;
                Ok::<_, Aborted>(())
            })
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    #[should_panic(expected = "work panicked")]
    fn test_work_panic_is_resumed() {
        let guard = TimeoutGuard::default();
        let _ = guard.run(5.0, || -> Result<(), Aborted> { panic!("work panicked") });
    }

    #[test]
    fn test_worker_runs_with_named_thread() {
        let guard = TimeoutGuard::new(GuardConfig::new().with_thread_name("probe"));
        let name = guard
            .run(5.0, || Ok::<_, Aborted>(thread::current().name().map(String::from)))
            .unwrap();
        assert_eq!(name.as_deref(), Some("probe-worker"));
    }

    #[test]
    fn test_default_guard_is_shared() {
        assert!(std::ptr::eq(default_guard(), default_guard()));
        assert_eq!(default_guard().config(), &GuardConfig::new());
    }
}
