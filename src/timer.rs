//! Timer entity
//!
//! A `Timer` is one schedulable unit of work: a duration, an optional
//! callback, and the absolute deadline of its next firing. Timers are
//! shared between the caller and the scheduler's queue through a
//! reference-counted [`TimerHandle`]; the timer is dropped once neither
//! side holds a reference. Identity (for cancellation and liveness
//! queries) is the timer's unique id, never value equality: two timers
//! built from the same duration and callback are distinct.

use log::error;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static TIMER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_timer_id() -> u64 {
    TIMER_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A timer callback. The return value decides the timer's fate after a
/// firing: `true` re-arms it for another `duration` from now, `false`
/// discards it.
pub type Callback = Box<dyn FnMut() -> bool + Send>;

/// A shared-ownership handle to a [`Timer`].
///
/// The scheduler's queue holds one reference while the timer is live and
/// the caller holds another; cloning a handle never duplicates the timer
/// itself.
pub type TimerHandle = Arc<Timer>;

/// One schedulable unit: fires once or repeatedly every `duration`.
pub struct Timer {
    id: u64,
    duration: Duration,
    /// Only the scheduler's worker ever invokes the callback, one firing
    /// at a time; the mutex exists so the shared handle has interior
    /// mutability, not because the callback is contended.
    callback: Mutex<Option<Callback>>,
    /// Absolute monotonic deadline of the next firing. Recomputed as
    /// `now + duration` each time the timer is (re)inserted.
    deadline: Mutex<Instant>,
    /// Set by `stop` so a cancellation that raced an in-flight dispatch
    /// still takes effect: the worker checks this before re-arming, which
    /// bounds the race to at most one extra fire. Cleared on (re)insertion.
    cancelled: AtomicBool,
}

impl Timer {
    /// Create a timer that runs `callback` every `duration` until the
    /// callback returns `false` or the timer is stopped.
    pub fn new(duration: Duration, callback: impl FnMut() -> bool + Send + 'static) -> TimerHandle {
        Arc::new(Self {
            id: next_timer_id(),
            duration,
            callback: Mutex::new(Some(Box::new(callback))),
            deadline: Mutex::new(Instant::now() + duration),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Create a timer with no callback. Firing it is a no-op that behaves
    /// as a one-shot: the timer is discarded after its first deadline.
    pub fn noop(duration: Duration) -> TimerHandle {
        Arc::new(Self {
            id: next_timer_id(),
            duration,
            callback: Mutex::new(None),
            deadline: Mutex::new(Instant::now() + duration),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Unique id of this timer. Identity for `stop`/`is_running`.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The requested interval, immutable after creation.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Absolute deadline of the next firing.
    pub fn deadline(&self) -> Instant {
        *self.deadline.lock()
    }

    /// Re-arm: deadline becomes `now + duration`. Repeats therefore drift
    /// by dispatch latency instead of staying anchored to the first
    /// insertion.
    pub(crate) fn arm(&self) {
        self.set_deadline(Instant::now() + self.duration);
    }

    pub(crate) fn set_deadline(&self, at: Instant) {
        *self.deadline.lock() = at;
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reset_cancelled(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run the callback once and report whether the timer should be
    /// re-armed. A missing callback fires as a no-op one-shot. A panicking
    /// callback is caught, reported through the `log` facade, and treated
    /// as "discard".
    pub(crate) fn fire(&self) -> bool {
        let mut guard = self.callback.lock();
        let Some(callback) = guard.as_mut() else {
            return false;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| callback())) {
            Ok(reschedule) => reschedule,
            Err(_) => {
                error!("timer {} callback panicked; timer will not be re-armed", self.id);
                false
            }
        }
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("duration", &self.duration)
            .field("deadline", &self.deadline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Timer::noop(Duration::from_millis(10));
        let b = Timer::noop(Duration::from_millis(10));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_fire_returns_callback_decision() {
        let t = Timer::new(Duration::from_millis(1), || true);
        assert!(t.fire());

        let mut remaining = 2;
        let t = Timer::new(Duration::from_millis(1), move || {
            remaining -= 1;
            remaining > 0
        });
        assert!(t.fire());
        assert!(!t.fire());
    }

    #[test]
    fn test_noop_fires_as_one_shot() {
        let t = Timer::noop(Duration::from_millis(1));
        assert!(!t.fire());
    }

    #[test]
    fn test_panicking_callback_is_discarded() {
        let t = Timer::new(Duration::from_millis(1), || panic!("boom"));
        assert!(!t.fire());
    }

    #[test]
    fn test_arm_recomputes_deadline() {
        let t = Timer::noop(Duration::from_millis(50));
        let before = Instant::now();
        t.arm();
        assert!(t.deadline() >= before + Duration::from_millis(50));
    }
}
