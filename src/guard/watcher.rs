/*!
 * Deadline Watcher
 *
 * Waits on the completion signal for the time limit. On expiry it claims the
 * outcome, aborts the worker and then escorts it: the syscall interrupt is
 * re-sent every nudge interval until the worker reports done, since a signal
 * that arrives before the worker enters its blocking call is lost.
 */

use super::race::RaceCell;
use super::signal::CompletionSignal;
use crate::config::GuardConfig;
use crate::errors::saturating_millis;
use crate::interrupt::AbortHandle;
use crate::monitoring::GuardStats;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[cfg(target_os = "linux")]
pub(crate) type SyscallSignal = nix::sys::signal::Signal;
#[cfg(not(target_os = "linux"))]
pub(crate) type SyscallSignal = ();

/// How the watcher saw the run end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Completed,
    /// Deadline claimed; carries the time from start to abort
    Expired(Duration),
}

pub(crate) struct Watcher<'a> {
    pub(crate) signal: &'a CompletionSignal,
    pub(crate) race: &'a RaceCell,
    pub(crate) abort: &'a AbortHandle,
    pub(crate) config: &'a GuardConfig,
    pub(crate) stats: &'a GuardStats,
    pub(crate) limit: Duration,
    pub(crate) started: Instant,
    pub(crate) syscall_signal: Option<SyscallSignal>,
}

impl Watcher<'_> {
    pub(crate) fn run(self) -> Verdict {
        let _ticket = self.stats.enter_thread();

        if self.signal.wait_for(self.limit) {
            return Verdict::Completed;
        }
        if !self.race.expire() {
            // The worker finished between the deadline and the claim.
            return Verdict::Completed;
        }

        let aborted_at = Instant::now();
        self.abort.abort();
        self.interrupt_syscall();
        debug!(
            timeout_ms = saturating_millis(self.limit),
            "deadline expired, worker aborted"
        );

        self.escort(aborted_at);
        Verdict::Expired(aborted_at.duration_since(self.started))
    }

    fn escort(&self, aborted_at: Instant) {
        let mut warned = false;
        while !self.signal.wait_for(self.config.nudge_interval) {
            self.interrupt_syscall();

            let waited = aborted_at.elapsed();
            if !warned && waited >= self.config.straggler_warning {
                warned = true;
                warn!(
                    waited_ms = saturating_millis(waited),
                    "aborted worker has not returned; it may be blocked outside the guard's primitives"
                );
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn interrupt_syscall(&self) {
        if let Some(signal) = self.syscall_signal {
            if self.abort.interrupt_syscall(signal) {
                self.stats.record_syscall_interrupt();
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn interrupt_syscall(&self) {}
}

/// Resolve and install the configured syscall signal, if any
#[cfg(target_os = "linux")]
pub(crate) fn prepare_syscall_signal(config: &GuardConfig) -> Option<SyscallSignal> {
    use crate::interrupt::syscall;

    let signal = syscall::resolve(config.syscall_signal?)?;
    syscall::install(signal).then_some(signal)
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn prepare_syscall_signal(config: &GuardConfig) -> Option<SyscallSignal> {
    if config.syscall_signal.is_some() {
        debug!("syscall interrupts are only supported on Linux");
    }
    None
}
