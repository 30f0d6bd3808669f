/*!
 * Entry Points
 *
 * Four call shapes over `TimeoutGuard`:
 *
 * - `timeout`: a duration is required; expiry is an error
 * - `optional_timeout`: without a duration the work runs inline, unguarded
 * - `just_timeout`: expiry is handed to a handler instead of failing
 * - `just_optional_timeout`: both of the above
 *
 * The free functions use the process-wide `default_guard()`; the same shapes
 * are available as methods on any `TimeoutGuard`.
 */

use crate::errors::{Error, TimeoutError};
use crate::guard::{default_guard, TimeoutGuard};
use crate::seconds::{self, IntoSeconds};
use std::convert::Infallible;
use tracing::trace;

impl TimeoutGuard {
    /// Run `work` under `seconds` if given, otherwise run it inline
    pub fn run_optional<S, T, E, F>(&self, seconds: S, work: F) -> Result<T, Error<E>>
    where
        S: IntoSeconds,
        F: FnOnce() -> Result<T, E> + Send,
        T: Send,
        E: Send,
    {
        self.run_optional_with(seconds, |err| err, work)
    }

    pub fn run_optional_with<S, K, M, T, E, F>(
        &self,
        seconds: S,
        kind: M,
        work: F,
    ) -> Result<T, Error<E, K>>
    where
        S: IntoSeconds,
        M: FnOnce(TimeoutError) -> K,
        F: FnOnce() -> Result<T, E> + Send,
        T: Send,
        E: Send,
    {
        match seconds.into_seconds()? {
            Some(limit) => self.run_for(limit, kind, work),
            None => {
                self.stats().record_bypass();
                trace!("no time limit given, running inline");
                work().map_err(Error::Work)
            }
        }
    }

    /// Run `work`, yielding `None` instead of an error when the deadline expires
    pub fn just<S, T, E, F>(&self, seconds: S, work: F) -> Result<Option<T>, Error<E, Infallible>>
    where
        S: IntoSeconds,
        F: FnOnce() -> Result<T, E> + Send,
        T: Send,
        E: Send,
    {
        self.just_or_else(seconds, || work().map(Some), || None)
    }

    /// Run `work`, yielding `on_timeout()` when the deadline expires
    ///
    /// The handler runs on the calling thread after the worker has unwound.
    pub fn just_or_else<S, T, E, F, H>(
        &self,
        seconds: S,
        work: F,
        on_timeout: H,
    ) -> Result<T, Error<E, Infallible>>
    where
        S: IntoSeconds,
        F: FnOnce() -> Result<T, E> + Send,
        H: FnOnce() -> T,
        T: Send,
        E: Send,
    {
        let limit = seconds::required(seconds)?;
        self.run_for(limit, |err| err, work)
            .or_else(|err| err.handle_timeout(on_timeout))
    }

    /// `just` with an optional duration; without one the work runs inline
    pub fn just_optional<S, T, E, F>(&self, seconds: S, work: F) -> Result<Option<T>, Error<E, Infallible>>
    where
        S: IntoSeconds,
        F: FnOnce() -> Result<T, E> + Send,
        T: Send,
        E: Send,
    {
        self.just_optional_or_else(seconds, || work().map(Some), || None)
    }

    /// `just_or_else` with an optional duration; without one the work runs inline
    pub fn just_optional_or_else<S, T, E, F, H>(
        &self,
        seconds: S,
        work: F,
        on_timeout: H,
    ) -> Result<T, Error<E, Infallible>>
    where
        S: IntoSeconds,
        F: FnOnce() -> Result<T, E> + Send,
        H: FnOnce() -> T,
        T: Send,
        E: Send,
    {
        match seconds.into_seconds()? {
            Some(limit) => self
                .run_for(limit, |err| err, work)
                .or_else(|err| err.handle_timeout(on_timeout)),
            None => {
                self.stats().record_bypass();
                trace!("no time limit given, running inline");
                work().map_err(Error::Work)
            }
        }
    }
}

/// Run `work` with a hard time limit of `seconds`
///
/// # Example
///
/// ```
/// use hard_timeout::{interrupt, timeout, Aborted};
/// use std::time::Duration;
///
/// let err = timeout(0.05, || {
///     interrupt::sleep(Duration::from_secs(60))?;
///     Ok::<_, Aborted>("done")
/// })
/// .unwrap_err();
/// assert!(err.is_timeout());
///
/// assert_eq!(timeout(1, || Ok::<_, Aborted>("done")).unwrap(), "done");
/// ```
pub fn timeout<S, T, E, F>(seconds: S, work: F) -> Result<T, Error<E>>
where
    S: IntoSeconds,
    F: FnOnce() -> Result<T, E> + Send,
    T: Send,
    E: Send,
{
    default_guard().run(seconds, work)
}

/// `timeout` with the timeout error mapped into a caller-chosen kind
pub fn timeout_with<S, K, M, T, E, F>(seconds: S, kind: M, work: F) -> Result<T, Error<E, K>>
where
    S: IntoSeconds,
    M: FnOnce(TimeoutError) -> K,
    F: FnOnce() -> Result<T, E> + Send,
    T: Send,
    E: Send,
{
    default_guard().run_with(seconds, kind, work)
}

/// `timeout` when `seconds` is present, otherwise run `work` inline
pub fn optional_timeout<S, T, E, F>(seconds: S, work: F) -> Result<T, Error<E>>
where
    S: IntoSeconds,
    F: FnOnce() -> Result<T, E> + Send,
    T: Send,
    E: Send,
{
    default_guard().run_optional(seconds, work)
}

pub fn optional_timeout_with<S, K, M, T, E, F>(seconds: S, kind: M, work: F) -> Result<T, Error<E, K>>
where
    S: IntoSeconds,
    M: FnOnce(TimeoutError) -> K,
    F: FnOnce() -> Result<T, E> + Send,
    T: Send,
    E: Send,
{
    default_guard().run_optional_with(seconds, kind, work)
}

/// Run `work` with a time limit, yielding `None` on expiry
pub fn just_timeout<S, T, E, F>(seconds: S, work: F) -> Result<Option<T>, Error<E, Infallible>>
where
    S: IntoSeconds,
    F: FnOnce() -> Result<T, E> + Send,
    T: Send,
    E: Send,
{
    default_guard().just(seconds, work)
}

/// Run `work` with a time limit, yielding `on_timeout()` on expiry
pub fn just_timeout_or_else<S, T, E, F, H>(seconds: S, work: F, on_timeout: H) -> Result<T, Error<E, Infallible>>
where
    S: IntoSeconds,
    F: FnOnce() -> Result<T, E> + Send,
    H: FnOnce() -> T,
    T: Send,
    E: Send,
{
    default_guard().just_or_else(seconds, work, on_timeout)
}

pub fn just_optional_timeout<S, T, E, F>(seconds: S, work: F) -> Result<Option<T>, Error<E, Infallible>>
where
    S: IntoSeconds,
    F: FnOnce() -> Result<T, E> + Send,
    T: Send,
    E: Send,
{
    default_guard().just_optional(seconds, work)
}

pub fn just_optional_timeout_or_else<S, T, E, F, H>(
    seconds: S,
    work: F,
    on_timeout: H,
) -> Result<T, Error<E, Infallible>>
where
    S: IntoSeconds,
    F: FnOnce() -> Result<T, E> + Send,
    H: FnOnce() -> T,
    T: Send,
    E: Send,
{
    default_guard().just_optional_or_else(seconds, work, on_timeout)
}
