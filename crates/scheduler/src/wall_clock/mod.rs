//! Wall-clock scheduler: an active dispatch loop on its own thread.
//!
//! Split into focused submodules:
//! - `core`: the scheduler struct, startup, shutdown, and the submission surface
//! - `dispatch_loop`: the loop state machine, recalibrated waits, and passes
//!
//! The loop sleeps on a condition variable paired with the task store lock.
//! Submissions, cancellations, and shutdown all notify it, so it never sleeps
//! past a newly due task.

mod core;
mod dispatch_loop;

pub use self::core::WallClockScheduler;
