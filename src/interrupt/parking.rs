/*!
 * Abort-Aware Parking
 *
 * Thin layer over `parking_lot_core`. Before parking, the worker publishes the
 * key it is about to park on; the aborter raises the flag and then reads that
 * key. Both sides use sequentially consistent atomics, so at least one of them
 * observes the other: either the validate callback (run under the bucket lock)
 * sees the abort and refuses to park, or the aborter sees the key and its
 * `unpark_all` finds the worker in the queue.
 */

use super::AbortHandle;
use crate::errors::Aborted;
use parking_lot_core::{ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::sync::atomic::Ordering;
use std::time::Instant;

/// Why `park` returned without an abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wakeup {
    /// Unparked, or the blocking condition no longer held (may be spurious)
    Woken,
    TimedOut,
}

/// Park on `key` while `should_park` holds, until unparked or `deadline`
///
/// `should_park` runs under the parking lot bucket lock: it must be cheap, must
/// not panic and must not touch the parking lot.
pub(crate) fn park<V>(
    handle: Option<&AbortHandle>,
    key: usize,
    deadline: Option<Instant>,
    should_park: V,
) -> Result<Wakeup, Aborted>
where
    V: Fn() -> bool,
{
    if let Some(handle) = handle {
        if handle.is_aborted() {
            return Err(Aborted);
        }
        handle.parked_on.store(key, Ordering::SeqCst);
    }

    let validate = || should_park() && !handle.is_some_and(|handle| handle.is_aborted());
    // SAFETY: the callbacks only load atomics; they neither panic nor park.
    let result = unsafe {
        parking_lot_core::park(
            key,
            validate,
            || {},
            |_key, _was_last| {},
            DEFAULT_PARK_TOKEN,
            deadline,
        )
    };

    if let Some(handle) = handle {
        handle.parked_on.store(0, Ordering::SeqCst);
        if handle.is_aborted() {
            return Err(Aborted);
        }
    }

    Ok(match result {
        ParkResult::TimedOut => Wakeup::TimedOut,
        ParkResult::Unparked(_) | ParkResult::Invalid => Wakeup::Woken,
    })
}

/// Wake every thread parked on `key`
#[inline]
pub(crate) fn wake_all(key: usize) -> usize {
    // SAFETY: unparking has no preconditions beyond not being called from a
    // parking callback.
    unsafe { parking_lot_core::unpark_all(key, DEFAULT_UNPARK_TOKEN) }
}

/// Wake at most one thread parked on `key`
#[inline]
pub(crate) fn wake_one(key: usize) -> usize {
    // SAFETY: see `wake_all`.
    let result = unsafe { parking_lot_core::unpark_one(key, |_| DEFAULT_UNPARK_TOKEN) };
    result.unparked_threads
}
