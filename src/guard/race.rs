/*!
 * Outcome Race
 *
 * The worker and the watcher each try to claim the single outcome of a run.
 * Whichever claim lands first decides whether the caller sees the work's
 * result or a timeout.
 */

use std::sync::atomic::{AtomicU8, Ordering};

const RUNNING: u8 = 0;
const COMPLETED: u8 = 1;
const TIMED_OUT: u8 = 2;

#[derive(Debug)]
pub(crate) struct RaceCell {
    state: AtomicU8,
}

impl RaceCell {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU8::new(RUNNING),
        }
    }

    /// Claim the outcome for the worker
    #[inline]
    pub(crate) fn complete(&self) -> bool {
        self.transition(COMPLETED)
    }

    /// Claim the outcome for the watcher
    #[inline]
    pub(crate) fn expire(&self) -> bool {
        self.transition(TIMED_OUT)
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(RUNNING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_completion_wins() {
        let race = RaceCell::new();
        assert!(race.complete());
        assert!(!race.expire());
        assert!(!race.complete());
    }

    #[test]
    fn test_expiry_wins() {
        let race = RaceCell::new();
        assert!(race.expire());
        assert!(!race.complete());
    }

    #[test]
    fn test_exactly_one_winner_under_contention() {
        for _ in 0..200 {
            let race = RaceCell::new();
            let barrier = Barrier::new(2);

            let (completed, expired) = thread::scope(|scope| {
                let worker = scope.spawn(|| {
                    barrier.wait();
                    race.complete()
                });
                barrier.wait();
                let expired = race.expire();
                (worker.join().unwrap(), expired)
            });

            assert!(completed ^ expired);
        }
    }
}
