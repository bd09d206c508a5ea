//! Owner-scoped task scheduling for a host that runs in discrete steps.
//!
//! Two schedulers share one task model and one dispatch predicate:
//! - [`TickScheduler`] is passive and counts host ticks. The host drives it
//!   through [`TickScheduler::on_server_tick`].
//! - [`WallClockScheduler`] runs its own dispatch thread against a monotonic
//!   millisecond clock.
//!
//! Both are used through the [`Scheduler`] trait.

pub mod clock;
mod dispatch;
pub mod error;
pub mod facade;
pub mod metrics;
mod recalibrate;
pub mod store;
pub mod task;
pub mod tick;
mod validation;
pub mod wall_clock;

pub use clock::{Clock, MonotonicClock, TickCounter};
pub use dispatch::PassOutcome;
pub use error::{SchedulerError, ValidationError};
pub use facade::Scheduler;
pub use metrics::DispatchMetrics;
pub use store::TaskStore;
pub use task::{TaskBody, TaskHandle, TaskState, TaskSynchronicity};
pub use tick::{TickPhase, TickScheduler};
pub use wall_clock::WallClockScheduler;
