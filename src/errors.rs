/*!
 * Error Types
 *
 * Error taxonomy for timeout-guarded execution:
 * - `ArgumentError`: invalid invocation, raised before any thread starts
 * - `TimeoutError`: the default error kind produced when a deadline expires
 * - `SpawnError`: the OS refused to start a guard thread
 * - `Error<E, K>`: everything a guarded call can return, generic over the
 *   work's own error `E` and the timeout kind `K`
 */

use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;

/// Invalid arguments for a guarded call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("a seconds value is required")]
    MissingSeconds,

    #[error("seconds value must be numeric (`{given}` was given)")]
    NonNumeric { given: String },

    #[error("seconds value must be finite and non-negative (`{given}` was given)")]
    OutOfRange { given: String },
}

/// Default error kind returned when the deadline elapses before the work finishes
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("execution expired after {elapsed_ms}ms (limit {timeout_ms}ms)")]
pub struct TimeoutError {
    pub timeout_ms: u64,
    pub elapsed_ms: u64,
}

impl TimeoutError {
    pub(crate) fn new(limit: Duration, elapsed: Duration) -> Self {
        Self {
            timeout_ms: saturating_millis(limit),
            elapsed_ms: saturating_millis(elapsed),
        }
    }

    /// Configured limit
    #[inline]
    pub fn limit(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Time between the start of the race and the abort
    #[inline]
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

/// Whole milliseconds in `duration`, clamped to `u64::MAX`
#[inline]
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A guard thread could not be started
#[derive(Error, Debug)]
#[error("failed to spawn timeout {role} thread")]
pub struct SpawnError {
    pub role: &'static str,
    #[source]
    pub source: std::io::Error,
}

impl SpawnError {
    pub(crate) fn new(role: &'static str, source: std::io::Error) -> Self {
        Self { role, source }
    }
}

/// Returned by interrupt primitives when the current worker has been aborted
///
/// Work should propagate it with `?`; whatever the work returns after an abort
/// is discarded by the guard.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("work was aborted by its timeout guard")]
pub struct Aborted;

/// Outcome of a guarded call that did not produce a value
///
/// `K` is the timeout error kind. Entry points that route timeouts into a
/// handler use `K = Infallible`, so a timeout can never escape them.
#[derive(Error, Debug)]
pub enum Error<E, K = TimeoutError> {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("{0}")]
    Timeout(K),

    #[error("{0}")]
    Work(E),
}

impl<E, K> Error<E, K> {
    /// Check if the deadline expired
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Get the timeout kind, if the deadline expired
    pub fn timeout(&self) -> Option<&K> {
        match self {
            Self::Timeout(kind) => Some(kind),
            _ => None,
        }
    }

    /// Get the work's own error, if the work failed
    pub fn into_work(self) -> Option<E> {
        match self {
            Self::Work(err) => Some(err),
            _ => None,
        }
    }

    /// Map the work error, keeping every other variant
    pub fn map_work<F, O>(self, op: O) -> Error<F, K>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            Self::Argument(err) => Error::Argument(err),
            Self::Spawn(err) => Error::Spawn(err),
            Self::Timeout(kind) => Error::Timeout(kind),
            Self::Work(err) => Error::Work(op(err)),
        }
    }
}

impl<E> Error<E, TimeoutError> {
    /// Route the timeout into `handler`, keeping every other failure
    pub(crate) fn handle_timeout<T, H>(self, handler: H) -> Result<T, Error<E, Infallible>>
    where
        H: FnOnce() -> T,
    {
        match self {
            Self::Timeout(_) => Ok(handler()),
            Self::Argument(err) => Err(Error::Argument(err)),
            Self::Spawn(err) => Err(Error::Spawn(err)),
            Self::Work(err) => Err(Error::Work(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_error_names_value() {
        let err = ArgumentError::NonNumeric {
            given: "\"soon\"".to_string(),
        };
        assert!(err.to_string().contains("\"soon\""));
    }

    #[test]
    fn test_timeout_error_display() {
        let err = TimeoutError::new(Duration::from_millis(10), Duration::from_millis(12));
        assert_eq!(err.to_string(), "execution expired after 12ms (limit 10ms)");
        assert_eq!(err.limit(), Duration::from_millis(10));
        assert_eq!(err.elapsed(), Duration::from_millis(12));
    }

    #[test]
    fn test_timeout_error_saturates_huge_limits() {
        let err = TimeoutError::new(Duration::MAX, Duration::from_millis(5));
        assert_eq!(err.timeout_ms, u64::MAX);
        assert_eq!(err.elapsed_ms, 5);
        assert_eq!(saturating_millis(Duration::from_secs(u64::MAX / 1000)), u64::MAX / 1000 * 1000);
    }

    #[test]
    fn test_error_accessors() {
        let err: Error<&str> = Error::Timeout(TimeoutError::new(Duration::ZERO, Duration::ZERO));
        assert!(err.is_timeout());
        assert!(err.timeout().is_some());
        assert!(err.into_work().is_none());

        let err: Error<&str> = Error::Work("boom");
        assert!(!err.is_timeout());
        assert_eq!(err.map_work(str::len).into_work(), Some(4));
    }

    #[test]
    fn test_handle_timeout_only_catches_timeouts() {
        let timed_out: Error<&str> = Error::Timeout(TimeoutError::new(Duration::ZERO, Duration::ZERO));
        assert_eq!(timed_out.handle_timeout(|| 7).ok(), Some(7));

        let failed: Error<&str> = Error::Work("boom");
        assert!(matches!(failed.handle_timeout(|| 7), Err(Error::Work("boom"))));

        let invalid: Error<&str> = ArgumentError::MissingSeconds.into();
        assert!(matches!(
            invalid.handle_timeout(|| 7),
            Err(Error::Argument(ArgumentError::MissingSeconds))
        ));
    }
}
