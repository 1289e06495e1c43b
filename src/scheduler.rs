//! Scheduler - single-worker deadline dispatch
//!
//! Owns the deadline-ordered queue and the wake/wait flags behind one
//! mutex, paired with a condvar the worker parks on. Every caller-visible
//! mutation (insert, removal, shutdown) sets the `updated` flag and
//! signals, so the worker either times out at the earliest deadline (the
//! front timer is genuinely due) or wakes early and re-reads the queue.
//! Keeping the queue and the flag under a single guard makes a mutation
//! and its wakeup atomic, closing the missed-wakeup window that two
//! separate locks would leave.

use crate::queue::DeadlineQueue;
use crate::timer::{Timer, TimerHandle};
use log::{debug, trace};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Duration of the internal sentinel timer, on the order of a century.
/// The sentinel keeps the queue non-empty for the scheduler's whole life,
/// so the worker always has a deadline to wait on and never special-cases
/// emptiness.
const SENTINEL_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct State {
    queue: DeadlineQueue,
    /// Set by every insertion, removal, and shutdown request. Tells a
    /// woken worker that its current wait target may be invalid.
    updated: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<State>,
    /// The worker parks here until the earliest deadline or the next
    /// update, whichever comes first.
    wake: Condvar,
}

/// A timer scheduler with exactly one background worker thread.
///
/// Callers register timers with [`push`](Scheduler::push) (or construct
/// them up front and [`push_timer`](Scheduler::push_timer) them), cancel
/// them with [`stop`](Scheduler::stop), and query liveness with
/// [`is_running`](Scheduler::is_running). All of these are safe to call
/// concurrently from any number of threads and complete within a brief
/// critical section; only the worker ever blocks.
///
/// Callbacks run on the worker thread with no lock held, strictly one at
/// a time, in ascending deadline order. A long-running callback delays
/// later dispatches but never blocks `push`/`stop` callers.
///
/// Dropping the scheduler shuts it down and joins the worker.
pub struct Scheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Create a scheduler: installs the sentinel timer and starts the
    /// worker immediately.
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: DeadlineQueue::new(),
                updated: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        // Callers never receive a handle to the sentinel, so it cannot be
        // stopped through the public API.
        let sentinel = Timer::new(SENTINEL_DURATION, || true);
        {
            let mut state = shared.state.lock();
            sentinel.arm();
            state.queue.insert(sentinel);
        }

        let worker_shared = shared.clone();
        let worker = thread::spawn(move || worker_loop(&worker_shared));

        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Register a new timer: `callback` first runs `duration` from now,
    /// then repeatedly every `duration` for as long as it returns `true`.
    /// Returns the handle for later [`stop`](Scheduler::stop) /
    /// [`is_running`](Scheduler::is_running) calls.
    pub fn push(
        &self,
        duration: Duration,
        callback: impl FnMut() -> bool + Send + 'static,
    ) -> TimerHandle {
        self.push_timer(&Timer::new(duration, callback))
    }

    /// Register a timer with no callback: it fires once, does nothing,
    /// and is discarded.
    pub fn push_noop(&self, duration: Duration) -> TimerHandle {
        self.push_timer(&Timer::noop(duration))
    }

    /// (Re)insert a caller-constructed timer. Its deadline is recomputed
    /// as `now + duration` at this moment; pushing a timer that is already
    /// scheduled re-arms it at the fresh deadline.
    pub fn push_timer(&self, timer: &TimerHandle) -> TimerHandle {
        {
            let mut state = self.shared.state.lock();
            timer.reset_cancelled();
            timer.arm();
            state.queue.insert(timer.clone());
            state.updated = true;
        }
        // The new timer may be earlier than whatever the worker waits on.
        self.shared.wake.notify_one();
        trace!("scheduled timer {} (+{:?})", timer.id(), timer.duration());
        timer.clone()
    }

    /// Cancel a timer by identity. A timer that already
    /// fired-and-was-discarded, or was already stopped, is a benign
    /// no-op. A timer that is concurrently being popped for dispatch may
    /// fire one final time before the removal takes effect.
    pub fn stop(&self, timer: &TimerHandle) {
        let removed = {
            let mut state = self.shared.state.lock();
            let removed = state.queue.remove(timer.id()).is_some();
            // A timer that is mid-dispatch is no longer in the queue; the
            // flag tells the worker to discard it instead of re-arming,
            // bounding the race to at most one extra fire.
            timer.cancel();
            if removed {
                // The worker may be waiting on exactly this deadline.
                state.updated = true;
            }
            removed
        };
        if removed {
            self.shared.wake.notify_one();
            trace!("stopped timer {}", timer.id());
        }
    }

    /// True iff the timer is currently scheduled (not yet
    /// fired-and-discarded, not stopped).
    pub fn is_running(&self, timer: &TimerHandle) -> bool {
        self.shared.state.lock().queue.contains(timer.id())
    }

    /// Request shutdown and wake the worker. Idempotent; does not wait
    /// for the worker to exit (see [`join`](Scheduler::join)). An
    /// in-flight callback finishes, but no further callbacks are
    /// dispatched once the worker observes the flag.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            state.updated = true;
        }
        self.shared.wake.notify_one();
        debug!("scheduler shutdown requested");
    }

    /// Shut down (if not already requested) and wait for the worker
    /// thread to terminate.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// The worker loop: alternates between waiting on the earliest deadline
/// and dispatching one due callback.
///
/// Only a wait that timed out with no intervening update means the front
/// timer is genuinely due; a signaled wake (insert/remove/shutdown) just
/// re-reads the queue and waits again. The callback itself runs with the
/// state lock released, so it never blocks concurrent `push`/`stop`
/// callers.
fn worker_loop(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }

        // The sentinel keeps the queue non-empty for as long as the
        // scheduler is live; observing it empty here means internal state
        // was corrupted and continuing would dispatch garbage.
        let Some(deadline) = state.queue.peek_deadline() else {
            panic!("timer queue empty while scheduler is live (sentinel lost)");
        };

        let mut timed_out = false;
        while !state.updated && !timed_out {
            timed_out = shared.wake.wait_until(&mut state, deadline).timed_out();
        }

        // An update that raced the timeout wins: re-read the queue rather
        // than firing against a possibly changed front.
        let due = timed_out && !state.updated;
        state.updated = false;
        if !due {
            continue;
        }

        let Some(timer) = state.queue.pop() else {
            panic!("timer queue empty while scheduler is live (sentinel lost)");
        };

        trace!(
            "dispatching timer {} ({} still queued)",
            timer.id(),
            state.queue.len()
        );
        let reschedule = MutexGuard::unlocked(&mut state, || timer.fire());
        if reschedule && !timer.is_cancelled() {
            timer.arm();
            state.queue.insert(timer);
        }
    }
    debug!("scheduler worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_and_join() {
        let scheduler = Scheduler::new();
        scheduler.join();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let scheduler = Scheduler::new();
        scheduler.shutdown();
        scheduler.shutdown();
        scheduler.join();
    }

    #[test]
    fn test_drop_joins_worker() {
        let scheduler = Scheduler::new();
        let _handle = scheduler.push_noop(Duration::from_secs(60));
        drop(scheduler);
    }

    #[test]
    fn test_push_is_running_stop() {
        let scheduler = Scheduler::new();
        let timer = scheduler.push(Duration::from_secs(60), || true);
        assert!(scheduler.is_running(&timer));

        scheduler.stop(&timer);
        assert!(!scheduler.is_running(&timer));

        // Stopping again is a benign no-op.
        scheduler.stop(&timer);
        assert!(!scheduler.is_running(&timer));
        scheduler.join();
    }

    #[test]
    fn test_push_timer_form_matches_push() {
        let scheduler = Scheduler::new();
        let timer = Timer::new(Duration::from_secs(60), || true);
        assert!(!scheduler.is_running(&timer));

        let returned = scheduler.push_timer(&timer);
        assert_eq!(returned.id(), timer.id());
        assert!(scheduler.is_running(&timer));
        scheduler.join();
    }
}
