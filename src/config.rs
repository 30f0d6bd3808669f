/*!
 * Guard Configuration
 *
 * Runtime configuration for timeout guards. The defaults are available as a
 * `const fn` so a guard can live in a `static`.
 */

use std::io;
use std::thread;
use std::time::Duration;

/// Signal used to knock a worker out of a blocking system call (`SIGURG`)
///
/// Its default disposition is "ignore", so a stray delivery is harmless.
pub const DEFAULT_SYSCALL_SIGNAL: i32 = nix::libc::SIGURG;

/// Timeout guard configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    /// Prefix for worker and watcher thread names
    pub thread_name: &'static str,
    /// Stack size for guard threads (platform default when `None`)
    pub stack_size: Option<usize>,
    /// Signal delivered to an aborted worker to interrupt system calls (Linux only)
    pub syscall_signal: Option<i32>,
    /// How often an aborted worker is re-signalled while it unwinds
    pub nudge_interval: Duration,
    /// Warn when an aborted worker is still running after this long
    pub straggler_warning: Duration,
}

impl GuardConfig {
    /// Create config with defaults
    pub const fn new() -> Self {
        Self {
            thread_name: "timeout-guard",
            stack_size: None,
            syscall_signal: None,
            nudge_interval: Duration::from_millis(10),
            straggler_warning: Duration::from_secs(1),
        }
    }

    /// Set thread name prefix
    pub fn with_thread_name(mut self, name: &'static str) -> Self {
        self.thread_name = name;
        self
    }

    /// Set guard thread stack size
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Interrupt blocking system calls of aborted workers with `SIGURG`
    pub fn with_syscall_interrupts(self) -> Self {
        self.with_syscall_signal(DEFAULT_SYSCALL_SIGNAL)
    }

    /// Interrupt blocking system calls of aborted workers with `signal`
    ///
    /// A no-op handler is installed for `signal` process-wide the first time a
    /// guard using it runs.
    pub fn with_syscall_signal(mut self, signal: i32) -> Self {
        self.syscall_signal = Some(signal);
        self
    }

    /// Set re-signal interval for aborted workers
    pub fn with_nudge_interval(mut self, interval: Duration) -> Self {
        self.nudge_interval = interval;
        self
    }

    /// Set straggler warning threshold
    pub fn with_straggler_warning(mut self, after: Duration) -> Self {
        self.straggler_warning = after;
        self
    }

    pub(crate) fn spawn_scoped<'scope, 'env, F, T>(
        &self,
        scope: &'scope thread::Scope<'scope, 'env>,
        role: &str,
        f: F,
    ) -> io::Result<thread::ScopedJoinHandle<'scope, T>>
    where
        F: FnOnce() -> T + Send + 'scope,
        T: Send + 'scope,
    {
        let mut builder = thread::Builder::new().name(format!("{}-{}", self.thread_name, role));
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        builder.spawn_scoped(scope, f)
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::new()
    }
}
