//! The task store: every task a scheduler currently knows about.
//!
//! One mutex guards the map. Submission, the dispatch scan, and queries all
//! go through it; queries return snapshot copies, never live views.

use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use regex::Regex;
use tracing::error;
use uuid::Uuid;

use crate::task::{ScheduledTask, TaskHandle};

/// Tasks keyed by id, kept in submission order.
pub(crate) type TaskMap = IndexMap<Uuid, Arc<ScheduledTask>>;

#[derive(Default)]
pub struct TaskStore {
    tasks: Mutex<TaskMap>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the map. A poisoned lock is logged and recovered.
    pub(crate) fn lock(&self) -> MutexGuard<'_, TaskMap> {
        self.tasks.lock().unwrap_or_else(|poisoned| {
            error!("catastrophic error in scheduler: task store lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub(crate) fn insert(&self, task: Arc<ScheduledTask>) {
        self.lock().insert(task.id(), task);
    }

    pub fn get(&self, id: Uuid) -> Option<TaskHandle> {
        self.lock().get(&id).cloned().map(TaskHandle::new)
    }

    /// Copy of every task in the store.
    pub fn snapshot(&self) -> Vec<TaskHandle> {
        self.lock().values().cloned().map(TaskHandle::new).collect()
    }

    /// Copy of the tasks registered by `owner_id`.
    pub fn snapshot_for(&self, owner_id: &str) -> Vec<TaskHandle> {
        self.lock()
            .values()
            .filter(|task| task.owner_id() == owner_id)
            .cloned()
            .map(TaskHandle::new)
            .collect()
    }

    /// Id of the first task named exactly `name`.
    pub fn id_by_name(&self, name: &str) -> Option<Uuid> {
        self.lock()
            .values()
            .find(|task| task.name() == name)
            .map(|task| task.id())
    }

    /// Tasks whose whole name matches the regular expression `pattern`.
    pub fn matching_name(&self, pattern: &str) -> Result<Vec<TaskHandle>, regex::Error> {
        let matcher = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(self
            .lock()
            .values()
            .filter(|task| matcher.is_match(&task.name()))
            .cloned()
            .map(TaskHandle::new)
            .collect())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::tests::make_task;

    #[test]
    fn insert_get_and_snapshot() {
        let store = TaskStore::new();
        let a = make_task(0, 0);
        let b = make_task(5, 5);
        store.insert(a.clone());
        store.insert(b.clone());

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(a.id()).map(|h| h.id()), Some(a.id()));
        assert!(store.get(Uuid::new_v4()).is_none());

        let ids: Vec<Uuid> = store.snapshot().iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
    }

    #[test]
    fn snapshot_is_not_a_live_view() {
        let store = TaskStore::new();
        store.insert(make_task(0, 0));
        let snapshot = store.snapshot();
        store.insert(make_task(0, 0));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn lookup_by_name() {
        let store = TaskStore::new();
        let task = make_task(0, 0);
        store.insert(task.clone());
        TaskHandle::new(task.clone()).set_name("autosave-world");

        assert_eq!(store.id_by_name("autosave-world"), Some(task.id()));
        assert_eq!(store.id_by_name("autosave"), None);
        assert_eq!(store.matching_name("autosave-.*").unwrap().len(), 1);
        assert_eq!(store.matching_name("backup-.*").unwrap().len(), 0);
    }

    #[test]
    fn name_patterns_match_the_whole_name() {
        let store = TaskStore::new();
        for name in ["worldedit-S1", "worldedit-S12", "backup"] {
            let task = make_task(0, 0);
            store.insert(task.clone());
            TaskHandle::new(task).set_name(name);
        }
        let count = |pattern: &str| store.matching_name(pattern).unwrap().len();

        assert_eq!(count(".*"), 3);
        assert_eq!(count("worldedit-S."), 1);
        assert_eq!(count("worldedit-S\\d+"), 2);
        assert_eq!(count("back"), 0);
        assert_eq!(count("backup|worldedit-S1"), 2);
        assert_eq!(count("BACKUP"), 0);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let store = TaskStore::new();
        store.insert(make_task(0, 0));
        assert!(store.matching_name("(").is_err());
        assert!(store.matching_name("*").is_err());
    }
}
