//! The per-task dispatch predicate and body execution, shared by both
//! schedulers. Only the clock and the driver differ between them.
//!
//! A pass has three steps:
//! 1. [`collect_due`] under the store lock: purge canceled tasks, pick due
//!    ones and restamp them with `now`.
//! 2. [`execute_all`] without the lock, sequentially on the calling thread, so
//!    bodies may submit, cancel, or query tasks on the same scheduler.
//! 3. [`retire_one_shots`] under the lock again: drop one-shot tasks that
//!    were just attempted.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock, TryLockError};
use std::time::Instant;

use tracing::{debug, error};
use uuid::Uuid;

use crate::metrics::DispatchMetrics;
use crate::store::{TaskMap, TaskStore};
use crate::task::{ScheduledTask, TaskState};

/// Result of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Bodies run this pass.
    pub executed: usize,
    /// Bodies that returned an error or panicked.
    pub failed: usize,
}

/// What a scan found: tasks to run now, and canceled tasks it dropped.
#[derive(Debug, Default)]
pub(crate) struct Scan {
    pub(crate) due: Vec<Arc<ScheduledTask>>,
    pub(crate) purged: Vec<Uuid>,
}

/// Remove canceled tasks and collect the ones due at `now`, restamped.
pub(crate) fn collect_due(tasks: &mut TaskMap, now: i64) -> Scan {
    let mut scan = Scan::default();
    tasks.retain(|id, task| {
        if task.state() == TaskState::Canceled {
            debug!(task_id = %id, task = %task.name(), "purging canceled task");
            scan.purged.push(*id);
            return false;
        }
        if task.is_due(now) {
            task.stamp(now);
            scan.due.push(Arc::clone(task));
        }
        true
    });
    scan
}

/// Run every due task in order. Faults are logged and counted, never raised.
pub(crate) fn execute_all(
    due: &[Arc<ScheduledTask>],
    metrics: &RwLock<DispatchMetrics>,
) -> PassOutcome {
    let mut outcome = PassOutcome::default();
    for task in due {
        match execute(task, metrics) {
            Some(true) => outcome.executed += 1,
            Some(false) => {
                outcome.executed += 1;
                outcome.failed += 1;
            }
            None => {}
        }
    }
    outcome
}

/// Run one task body. Returns `None` if it was skipped, otherwise whether it
/// succeeded.
fn execute(task: &ScheduledTask, metrics: &RwLock<DispatchMetrics>) -> Option<bool> {
    // Canceled between the scan and now.
    if task.state() == TaskState::Canceled {
        return None;
    }

    let name = task.name();
    let mut body = match task.body().try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => {
            debug!(task_id = %task.id(), task = %name, "task body already running, skipping");
            return None;
        }
    };

    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| body.call()));
    let elapsed = started.elapsed();
    drop(body);

    let succeeded = match outcome {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(task_id = %task.id(), task = %name, error = %e, "task body failed");
            false
        }
        Err(payload) => {
            error!(
                task_id = %task.id(),
                task = %name,
                panic = %panic_message(payload.as_ref()),
                "task body failed"
            );
            false
        }
    };

    // Repeating tasks move on to their period even after a failed first run.
    if succeeded || !task.is_one_shot() {
        task.mark_running();
    }

    metrics
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .record_execution(task.id(), &name, elapsed, succeeded);

    Some(succeeded)
}

/// Drop one-shot tasks that were attempted this pass, whatever the outcome.
/// Returns the ids actually removed.
pub(crate) fn retire_one_shots(tasks: &mut TaskMap, attempted: &[Arc<ScheduledTask>]) -> Vec<Uuid> {
    let mut retired = Vec::new();
    for task in attempted.iter().filter(|t| t.is_one_shot()) {
        if tasks.shift_remove(&task.id()).is_some() {
            debug!(task_id = %task.id(), task = %task.name(), "retired one-shot task");
            retired.push(task.id());
        }
    }
    retired
}

/// Record the end of a pass, dropping metrics of every task it removed.
pub(crate) fn finish_pass(
    metrics: &RwLock<DispatchMetrics>,
    mut removed: Vec<Uuid>,
    retired: Vec<Uuid>,
    pending: usize,
) {
    removed.extend(retired);
    metrics
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .record_pass(&removed, pending);
}

/// A full pass over `store` at `now`, taking the store lock twice.
pub(crate) fn run_pass(
    store: &TaskStore,
    now: i64,
    metrics: &RwLock<DispatchMetrics>,
) -> PassOutcome {
    let Scan { due, purged } = collect_due(&mut store.lock(), now);
    let outcome = execute_all(&due, metrics);

    let mut tasks = store.lock();
    let retired = retire_one_shots(&mut tasks, &due);
    let pending = tasks.len();
    drop(tasks);

    finish_pass(metrics, purged, retired, pending);
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
