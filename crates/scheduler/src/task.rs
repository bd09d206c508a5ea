//! Task entity and the handle given back to callers.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tickwork_core::Owner;
use uuid::Uuid;

/// Lifecycle state of a scheduled task.
///
/// `Waiting` until the first dispatch, `Running` afterwards for repeating
/// tasks. `Canceled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TaskState {
    Waiting = 0,
    Running = 1,
    Canceled = 2,
}

impl TaskState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Waiting,
            1 => TaskState::Running,
            _ => TaskState::Canceled,
        }
    }
}

/// Which scheduler a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskSynchronicity {
    /// Driven by the host simulation step (ticks).
    Synchronous,
    /// Driven by the wall-clock dispatch thread (milliseconds).
    Asynchronous,
}

/// The unit of work a task runs.
pub struct TaskBody(Box<dyn FnMut() -> anyhow::Result<()> + Send>);

impl TaskBody {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// Wrap a body that cannot report failure.
    pub fn from_fn<F>(mut f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::new(move || {
            f();
            Ok(())
        })
    }

    pub(crate) fn call(&mut self) -> anyhow::Result<()> {
        (self.0)()
    }
}

impl fmt::Debug for TaskBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskBody")
    }
}

/// A schedulable unit of work plus its timing parameters.
///
/// `offset` and `period` are in the owning scheduler's time unit and are
/// fixed at construction. `timestamp` and `state` change as the dispatch
/// loop processes the task.
pub(crate) struct ScheduledTask {
    id: Uuid,
    owner: Owner,
    owner_id: String,
    offset: i64,
    period: i64,
    timestamp: AtomicI64,
    state: AtomicU8,
    name: RwLock<String>,
    body: Mutex<TaskBody>,
    synchronicity: TaskSynchronicity,
}

impl ScheduledTask {
    /// Callers validate `offset`/`period` first; see `TaskFactory`.
    pub(crate) fn new(
        owner: Owner,
        owner_id: String,
        body: TaskBody,
        offset: i64,
        period: i64,
        name: String,
        synchronicity: TaskSynchronicity,
    ) -> Self {
        debug_assert!(offset >= 0 && period >= 0);
        Self {
            id: Uuid::new_v4(),
            owner,
            owner_id,
            offset,
            period,
            timestamp: AtomicI64::new(0),
            state: AtomicU8::new(TaskState::Waiting as u8),
            name: RwLock::new(name),
            body: Mutex::new(body),
            synchronicity,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub(crate) fn offset(&self) -> i64 {
        self.offset
    }

    pub(crate) fn period(&self) -> i64 {
        self.period
    }

    pub(crate) fn is_one_shot(&self) -> bool {
        self.period == 0
    }

    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn timestamp(&self) -> i64 {
        self.timestamp.load(Ordering::Acquire)
    }

    pub(crate) fn stamp(&self, now: i64) {
        self.timestamp.store(now, Ordering::Release);
    }

    pub(crate) fn name(&self) -> String {
        self.name.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_name(&self, name: String) {
        *self.name.write().unwrap_or_else(|e| e.into_inner()) = name;
    }

    /// How long this task waits in its current state, or `None` once canceled.
    pub(crate) fn threshold(&self) -> Option<i64> {
        match self.state() {
            TaskState::Waiting => Some(self.offset),
            TaskState::Running => Some(self.period),
            TaskState::Canceled => None,
        }
    }

    /// Whether at least `threshold` time units have passed since `timestamp`.
    pub(crate) fn is_due(&self, now: i64) -> bool {
        match self.threshold() {
            Some(threshold) => now.saturating_sub(self.timestamp()) >= threshold,
            None => false,
        }
    }

    /// Returns `true` if the task had not been dispatched yet.
    pub(crate) fn cancel(&self) -> bool {
        let previous = self.state.swap(TaskState::Canceled as u8, Ordering::AcqRel);
        TaskState::from_u8(previous) == TaskState::Waiting
    }

    /// `Waiting -> Running`. Leaves `Running` and `Canceled` untouched.
    pub(crate) fn mark_running(&self) {
        let _ = self.state.compare_exchange(
            TaskState::Waiting as u8,
            TaskState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn body(&self) -> &Mutex<TaskBody> {
        &self.body
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("owner", &self.owner_id)
            .field("name", &self.name())
            .field("offset", &self.offset)
            .field("period", &self.period)
            .field("timestamp", &self.timestamp())
            .field("state", &self.state())
            .field("synchronicity", &self.synchronicity)
            .finish()
    }
}

/// Caller-facing reference to a scheduled task.
///
/// Cloning is cheap; all clones refer to the same task.
#[derive(Clone)]
pub struct TaskHandle {
    task: Arc<ScheduledTask>,
}

impl TaskHandle {
    pub(crate) fn new(task: Arc<ScheduledTask>) -> Self {
        Self { task }
    }

    pub fn id(&self) -> Uuid {
        self.task.id
    }

    pub fn owner(&self) -> &Owner {
        &self.task.owner
    }

    /// Registered id of the owner at submission time.
    pub fn owner_id(&self) -> &str {
        self.task.owner_id()
    }

    /// Initial delay, absent when the task starts immediately.
    pub fn delay(&self) -> Option<i64> {
        (self.task.offset > 0).then_some(self.task.offset)
    }

    /// Repeat interval, absent for one-shot tasks.
    pub fn interval(&self) -> Option<i64> {
        (self.task.period > 0).then_some(self.task.period)
    }

    pub fn name(&self) -> String {
        self.task.name()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.task.set_name(name.into());
    }

    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    pub fn is_synchronous(&self) -> bool {
        self.task.synchronicity == TaskSynchronicity::Synchronous
    }

    /// Stop the task from being dispatched again.
    ///
    /// Returns `true` if the task had not been dispatched yet, `false` if it
    /// had already run or was already canceled. Never fails.
    pub fn cancel(&self) -> bool {
        self.task.cancel()
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.task.id == other.task.id
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.task.id)
            .field("owner", &self.task.owner_id)
            .field("name", &self.task.name())
            .field("state", &self.task.state())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tickwork_core::OwnerInfo;

    pub(crate) fn make_task(offset: i64, period: i64) -> Arc<ScheduledTask> {
        Arc::new(ScheduledTask::new(
            Arc::new(OwnerInfo::new("tester", "Tester")),
            "tester".to_string(),
            TaskBody::from_fn(|| {}),
            offset,
            period,
            "tester-S1".to_string(),
            TaskSynchronicity::Synchronous,
        ))
    }

    #[test]
    fn new_task_starts_waiting() {
        let task = make_task(5, 0);
        assert_eq!(task.state(), TaskState::Waiting);
        assert_eq!(task.threshold(), Some(5));
        assert!(task.is_one_shot());
    }

    #[test]
    fn due_at_exact_threshold() {
        let task = make_task(5, 0);
        task.stamp(10);
        assert!(!task.is_due(14));
        assert!(task.is_due(15));
        assert!(task.is_due(16));
    }

    #[test]
    fn running_task_uses_period() {
        let task = make_task(100, 3);
        task.stamp(0);
        task.mark_running();
        assert_eq!(task.state(), TaskState::Running);
        assert_eq!(task.threshold(), Some(3));
        assert!(task.is_due(3));
    }

    #[test]
    fn cancel_reports_whether_task_was_waiting() {
        let waiting = make_task(0, 0);
        assert!(waiting.cancel());
        assert!(!waiting.cancel());
        assert_eq!(waiting.state(), TaskState::Canceled);

        let running = make_task(0, 5);
        running.mark_running();
        assert!(!running.cancel());
        assert_eq!(running.state(), TaskState::Canceled);
    }

    #[test]
    fn canceled_is_terminal() {
        let task = make_task(0, 5);
        task.cancel();
        task.mark_running();
        assert_eq!(task.state(), TaskState::Canceled);
        assert_eq!(task.threshold(), None);
        assert!(!task.is_due(i64::MAX));
    }

    #[test]
    fn handle_hides_zero_delay_and_interval() {
        let handle = TaskHandle::new(make_task(0, 0));
        assert_eq!(handle.delay(), None);
        assert_eq!(handle.interval(), None);

        let handle = TaskHandle::new(make_task(20, 40));
        assert_eq!(handle.delay(), Some(20));
        assert_eq!(handle.interval(), Some(40));
        assert!(handle.is_synchronous());
    }

    #[test]
    fn handle_rename_is_shared_between_clones() {
        let handle = TaskHandle::new(make_task(0, 0));
        let clone = handle.clone();
        clone.set_name("autosave");
        assert_eq!(handle.name(), "autosave");
        assert_eq!(handle, clone);
    }

    #[test]
    fn body_errors_surface_from_call() {
        let mut body = TaskBody::new(|| anyhow::bail!("boom"));
        assert!(body.call().is_err());
        let mut ok = TaskBody::from_fn(|| {});
        assert!(ok.call().is_ok());
    }
}
