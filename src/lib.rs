/*!
 * Hard Timeout Library
 *
 * Runs a unit of work under a hard time limit: the work executes on a worker
 * thread, a watcher thread aborts it when the deadline passes, and the caller
 * receives either the work's own result or a timeout error.
 */

pub mod config;
pub mod entry;
pub mod errors;
pub mod guard;
pub mod interrupt;
pub mod monitoring;
pub mod seconds;

// Re-exports
pub use config::{GuardConfig, DEFAULT_SYSCALL_SIGNAL};
pub use entry::{
    just_optional_timeout, just_optional_timeout_or_else, just_timeout, just_timeout_or_else,
    optional_timeout, optional_timeout_with, timeout, timeout_with,
};
pub use errors::{Aborted, ArgumentError, Error, SpawnError, TimeoutError};
pub use guard::{default_guard, TimeoutGuard};
pub use monitoring::{GuardStats, StatsSnapshot};
pub use seconds::IntoSeconds;
