//! Input validation and task construction shared by both schedulers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tickwork_core::{Identifiable, Owner, OwnerResolver};
use tracing::{error, warn};

use crate::error::ValidationError;
use crate::task::{ScheduledTask, TaskBody, TaskSynchronicity};

/// Validates submit arguments and builds [`ScheduledTask`]s with default names.
pub(crate) struct TaskFactory {
    resolver: Arc<dyn OwnerResolver>,
    synchronicity: TaskSynchronicity,
    sequence: AtomicU64,
}

impl TaskFactory {
    pub(crate) fn new(resolver: Arc<dyn OwnerResolver>, synchronicity: TaskSynchronicity) -> Self {
        Self {
            resolver,
            synchronicity,
            sequence: AtomicU64::new(0),
        }
    }

    /// Registered id of `owner`, if any.
    pub(crate) fn resolve(&self, owner: &dyn Identifiable) -> Option<String> {
        self.resolver.resolve(owner)
    }

    /// Check arguments in order and build a `Waiting` task.
    ///
    /// The returned task's timestamp is unset; the scheduler stamps it when
    /// inserting.
    pub(crate) fn build(
        &self,
        owner: Option<Owner>,
        body: Option<TaskBody>,
        offset: i64,
        period: i64,
    ) -> Result<ScheduledTask, ValidationError> {
        let Some(owner) = owner else {
            warn!("cannot schedule task: owner is missing");
            return Err(ValidationError::MissingOwner);
        };

        let Some(owner_id) = self.resolve(owner.as_ref()) else {
            warn!(owner = %owner.id(), "cannot schedule task: owner is not registered");
            return Err(ValidationError::InvalidOwner);
        };

        let Some(body) = body else {
            warn!(owner = %owner_id, "cannot schedule task: body is missing");
            return Err(ValidationError::MissingBody);
        };

        if offset < 0 {
            error!(owner = %owner_id, delay = offset, "cannot schedule task: delay is negative");
            return Err(ValidationError::NegativeDelay);
        }

        if period < 0 {
            error!(owner = %owner_id, interval = period, "cannot schedule task: interval is negative");
            return Err(ValidationError::NegativeInterval);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let name = default_name(&owner_id, sequence, self.synchronicity);

        Ok(ScheduledTask::new(
            owner,
            owner_id,
            body,
            offset,
            period,
            name,
            self.synchronicity,
        ))
    }
}

/// `<owner>-S<n>` for tick tasks, `<owner>-A<n>` for wall-clock tasks.
fn default_name(owner_id: &str, sequence: u64, synchronicity: TaskSynchronicity) -> String {
    if owner_id.is_empty() {
        return format!("Unknown-{}", sequence);
    }
    let tag = match synchronicity {
        TaskSynchronicity::Synchronous => 'S',
        TaskSynchronicity::Asynchronous => 'A',
    };
    format!("{}-{}{}", owner_id, tag, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickwork_core::{OwnerInfo, OwnerRegistry};

    fn factory(sync: TaskSynchronicity) -> (TaskFactory, Owner) {
        let registry = Arc::new(OwnerRegistry::new());
        let owner: Owner = Arc::new(OwnerInfo::new("essentials", "Essentials"));
        registry.register(owner.as_ref()).unwrap();
        (TaskFactory::new(registry, sync), owner)
    }

    fn body() -> Option<TaskBody> {
        Some(TaskBody::from_fn(|| {}))
    }

    #[test]
    fn builds_waiting_task_with_sequenced_name() {
        let (factory, owner) = factory(TaskSynchronicity::Synchronous);
        let first = factory.build(Some(owner.clone()), body(), 5, 10).unwrap();
        let second = factory.build(Some(owner), body(), 0, 0).unwrap();

        assert_eq!(first.name(), "essentials-S1");
        assert_eq!(second.name(), "essentials-S2");
        assert_eq!(first.offset(), 5);
        assert_eq!(first.period(), 10);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn async_names_use_a_tag() {
        let (factory, owner) = factory(TaskSynchronicity::Asynchronous);
        let task = factory.build(Some(owner), body(), 0, 0).unwrap();
        assert_eq!(task.name(), "essentials-A1");
    }

    #[test]
    fn missing_owner_checked_first() {
        let (factory, _) = factory(TaskSynchronicity::Synchronous);
        let err = factory.build(None, None, -1, -1).unwrap_err();
        assert_eq!(err, ValidationError::MissingOwner);
    }

    #[test]
    fn unregistered_owner_is_invalid() {
        let (factory, _) = factory(TaskSynchronicity::Synchronous);
        let stranger: Owner = Arc::new(OwnerInfo::new("stranger", "Stranger"));
        let err = factory.build(Some(stranger), body(), 0, 0).unwrap_err();
        assert_eq!(err, ValidationError::InvalidOwner);
    }

    #[test]
    fn missing_body_before_negative_values() {
        let (factory, owner) = factory(TaskSynchronicity::Synchronous);
        let err = factory.build(Some(owner), None, -1, -1).unwrap_err();
        assert_eq!(err, ValidationError::MissingBody);
    }

    #[test]
    fn negative_delay_before_negative_interval() {
        let (factory, owner) = factory(TaskSynchronicity::Synchronous);
        assert_eq!(
            factory.build(Some(owner.clone()), body(), -1, -1).unwrap_err(),
            ValidationError::NegativeDelay
        );
        assert_eq!(
            factory.build(Some(owner), body(), 0, -1).unwrap_err(),
            ValidationError::NegativeInterval
        );
    }

    #[test]
    fn rejected_submissions_do_not_consume_sequence() {
        let (factory, owner) = factory(TaskSynchronicity::Synchronous);
        let _ = factory.build(Some(owner.clone()), None, 0, 0);
        let task = factory.build(Some(owner.clone()), body(), 0, 0).unwrap();
        assert_eq!(task.name(), format!("{}-S1", owner.id()));
    }

    #[test]
    fn empty_owner_id_gets_unknown_name() {
        assert_eq!(default_name("", 7, TaskSynchronicity::Synchronous), "Unknown-7");
    }
}
