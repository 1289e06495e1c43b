//! Timer Pool
//!
//! A software timer scheduler: callers register callbacks that fire once
//! or repeatedly after a delay, and a single background worker dispatches
//! them at (or after) their deadlines, in deadline order, without
//! busy-waiting.
//!
//! - One-shot and repeating timers (the callback's return value decides
//!   whether it is re-armed)
//! - Strictly serialized dispatch on one worker thread
//! - Cancellation and liveness queries through shared timer handles
//! - Efficient waiting: the worker sleeps until the earliest deadline and
//!   wakes early when the queue changes
//!
//! Repeats are re-armed as `now + duration` at each firing, so they drift
//! by dispatch latency; there is no anchored/absolute scheduling.

pub mod scheduler;
pub mod timer;

mod queue;


pub use scheduler::Scheduler;
pub use timer::{Callback, Timer, TimerHandle};
