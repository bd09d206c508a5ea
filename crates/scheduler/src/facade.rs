//! The public scheduling surface shared by both schedulers.

use tickwork_core::{Identifiable, Owner};
use tracing::warn;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::metrics::DispatchMetrics;
use crate::store::TaskStore;
use crate::task::{TaskBody, TaskHandle};

/// Submit, query, and cancel scheduled work.
///
/// Implementors supply the time unit ([`Scheduler::Span`]), the task store,
/// owner resolution and [`Scheduler::submit`]; everything else is provided.
pub trait Scheduler {
    /// Caller-facing duration type (ticks or wall-clock time).
    type Span: Copy;

    /// Convert a span to the scheduler's clock unit. May be negative.
    fn to_units(span: Self::Span) -> i64;

    fn store(&self) -> &TaskStore;

    /// Validate and insert a task with `offset` and `period` in clock units.
    fn submit(
        &self,
        owner: Option<Owner>,
        body: Option<TaskBody>,
        offset: i64,
        period: i64,
    ) -> Result<TaskHandle, ValidationError>;

    /// Snapshot of this scheduler's dispatch metrics.
    fn metrics(&self) -> DispatchMetrics;

    /// Registered id of `owner`, or `None` if the resolver does not know it.
    fn resolve_owner(&self, owner: &dyn Identifiable) -> Option<String>;

    /// Run once, as soon as the dispatch loop sees it.
    fn run_task(
        &self,
        owner: Option<Owner>,
        body: Option<TaskBody>,
    ) -> Result<TaskHandle, ValidationError> {
        logged(self.submit(owner, body, 0, 0))
    }

    /// Run once after `delay`.
    fn run_task_after(
        &self,
        owner: Option<Owner>,
        body: Option<TaskBody>,
        delay: Self::Span,
    ) -> Result<TaskHandle, ValidationError> {
        logged(self.submit(owner, body, Self::to_units(delay), 0))
    }

    /// Run now and then every `interval`.
    fn run_repeating_task(
        &self,
        owner: Option<Owner>,
        body: Option<TaskBody>,
        interval: Self::Span,
    ) -> Result<TaskHandle, ValidationError> {
        logged(self.submit(owner, body, 0, Self::to_units(interval)))
    }

    /// Run after `delay` and then every `interval`.
    fn run_repeating_task_after(
        &self,
        owner: Option<Owner>,
        body: Option<TaskBody>,
        interval: Self::Span,
        delay: Self::Span,
    ) -> Result<TaskHandle, ValidationError> {
        logged(self.submit(
            owner,
            body,
            Self::to_units(delay),
            Self::to_units(interval),
        ))
    }

    fn task_by_id(&self, id: Uuid) -> Option<TaskHandle> {
        self.store().get(id)
    }

    /// Id of the first task with exactly this name.
    fn task_id_by_name(&self, name: &str) -> Option<Uuid> {
        self.store().id_by_name(name)
    }

    /// Tasks whose whole name matches the regular expression `pattern`.
    /// An invalid pattern matches nothing.
    fn tasks_by_name(&self, pattern: &str) -> Vec<TaskHandle> {
        self.store().matching_name(pattern).unwrap_or_else(|e| {
            warn!(pattern, error = %e, "invalid task name pattern");
            Vec::new()
        })
    }

    /// Copy of all known tasks.
    fn scheduled_tasks(&self) -> Vec<TaskHandle> {
        self.store().snapshot()
    }

    /// Copy of the tasks belonging to `owner`, or `None` when the owner is
    /// not registered.
    fn scheduled_tasks_for(&self, owner: &dyn Identifiable) -> Option<Vec<TaskHandle>> {
        let Some(owner_id) = self.resolve_owner(owner) else {
            warn!(owner = %owner.id(), "cannot list tasks: owner is not registered");
            return None;
        };
        Some(self.store().snapshot_for(&owner_id))
    }

    /// Cancel a task. Safe to call any number of times.
    fn cancel(&self, handle: &TaskHandle) -> bool {
        handle.cancel()
    }
}

fn logged(result: Result<TaskHandle, ValidationError>) -> Result<TaskHandle, ValidationError> {
    if let Err(e) = &result {
        warn!(reason = %e, "cannot make task");
    }
    result
}
