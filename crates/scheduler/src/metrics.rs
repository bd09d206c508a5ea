//! Dispatch counters for one scheduler.
//!
//! Totals cover the scheduler's whole lifetime. Per-task figures are kept
//! only while the task is in the store and are dropped when a pass retires
//! or purges it.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Figures for one live task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStats {
    /// Task name at its latest execution.
    pub name: String,
    pub executions: u64,
    pub failures: u64,
    /// Summed body run time.
    pub busy: Duration,
    pub last_run: DateTime<Utc>,
}

impl TaskStats {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            executions: 0,
            failures: 0,
            busy: Duration::ZERO,
            last_run: Utc::now(),
        }
    }

    /// Mean body run time over all executions.
    pub fn mean_duration(&self) -> Duration {
        let runs = u32::try_from(self.executions).unwrap_or(u32::MAX).max(1);
        self.busy / runs
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchMetrics {
    /// Completed dispatch passes.
    pub passes: u64,
    /// Body executions, successful or not.
    pub executions: u64,
    /// Bodies that returned an error or panicked.
    pub failures: u64,
    /// Live tasks that have run at least once, by id.
    pub tasks: HashMap<Uuid, TaskStats>,
    /// Tasks in the store at the end of the last pass.
    pub tasks_pending: usize,
}

impl DispatchMetrics {
    pub(crate) fn record_execution(
        &mut self,
        id: Uuid,
        name: &str,
        duration: Duration,
        succeeded: bool,
    ) {
        self.executions += 1;
        let stats = self.tasks.entry(id).or_insert_with(|| TaskStats::new(name));
        if stats.name != name {
            stats.name = name.to_string();
        }
        stats.executions += 1;
        stats.busy = stats.busy.saturating_add(duration);
        stats.last_run = Utc::now();
        if !succeeded {
            self.failures += 1;
            stats.failures += 1;
        }
    }

    /// Close a pass: forget the tasks it removed from the store.
    pub(crate) fn record_pass(&mut self, removed: &[Uuid], tasks_pending: usize) {
        for id in removed {
            self.tasks.remove(id);
        }
        self.passes += 1;
        self.tasks_pending = tasks_pending;
    }

    pub fn task(&self, id: Uuid) -> Option<&TaskStats> {
        self.tasks.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_updates_totals_and_task() {
        let mut m = DispatchMetrics::default();
        let id = Uuid::new_v4();
        m.record_execution(id, "autosave", Duration::from_millis(30), true);
        m.record_execution(id, "autosave", Duration::from_millis(10), false);

        assert_eq!((m.executions, m.failures), (2, 1));
        let stats = m.task(id).unwrap();
        assert_eq!((stats.executions, stats.failures), (2, 1));
        assert_eq!(stats.mean_duration(), Duration::from_millis(20));
    }

    #[test]
    fn rename_is_picked_up() {
        let mut m = DispatchMetrics::default();
        let id = Uuid::new_v4();
        m.record_execution(id, "plugin-S1", Duration::ZERO, true);
        m.record_execution(id, "backup", Duration::ZERO, true);
        assert_eq!(m.task(id).unwrap().name, "backup");
        assert_eq!(m.tasks.len(), 1);
    }

    #[test]
    fn removed_tasks_are_forgotten_but_totals_stay() {
        let mut m = DispatchMetrics::default();
        let kept = Uuid::new_v4();
        let retired = Uuid::new_v4();
        m.record_execution(kept, "kept", Duration::ZERO, true);
        m.record_execution(retired, "retired", Duration::ZERO, false);

        m.record_pass(&[retired], 1);

        assert!(m.task(retired).is_none());
        assert!(m.task(kept).is_some());
        assert_eq!((m.executions, m.failures), (2, 1));
        assert_eq!((m.passes, m.tasks_pending), (1, 1));
    }

    #[test]
    fn serializes_with_task_ids_as_keys() {
        let mut m = DispatchMetrics::default();
        let id = Uuid::new_v4();
        m.record_execution(id, "heartbeat", Duration::from_millis(1), true);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["executions"], 1);
        assert_eq!(json["tasks"][id.to_string()]["name"], "heartbeat");
        assert_eq!(json["passes"], 0);
    }
}
