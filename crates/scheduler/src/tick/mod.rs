//! Tick scheduler: passive, driven by the host once per simulation step.
//!
//! There is no thread. The host calls [`TickScheduler::on_server_tick`] at the
//! start of every step; the counter advances and every due task runs to
//! completion on the caller's thread before the call returns.

use std::sync::{Arc, RwLock};

use tickwork_core::{Identifiable, Owner, OwnerResolver};
use tracing::trace;

use crate::clock::{Clock, TickCounter};
use crate::dispatch::{self, PassOutcome};
use crate::error::ValidationError;
use crate::facade::Scheduler;
use crate::metrics::DispatchMetrics;
use crate::store::TaskStore;
use crate::task::{TaskBody, TaskHandle, TaskSynchronicity};
use crate::validation::TaskFactory;


/// Phase of a host simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Start,
    End,
}

pub struct TickScheduler {
    store: TaskStore,
    factory: TaskFactory,
    clock: TickCounter,
    metrics: RwLock<DispatchMetrics>,
}

impl TickScheduler {
    pub fn new(resolver: Arc<dyn OwnerResolver>) -> Self {
        Self {
            store: TaskStore::new(),
            factory: TaskFactory::new(resolver, TaskSynchronicity::Synchronous),
            clock: TickCounter::new(),
            metrics: RwLock::new(DispatchMetrics::default()),
        }
    }

    /// Host notification. Only the start of a step dispatches.
    pub fn on_server_tick(&self, phase: TickPhase) -> PassOutcome {
        match phase {
            TickPhase::Start => self.tick(),
            TickPhase::End => PassOutcome::default(),
        }
    }

    /// Advance one tick and dispatch every due task.
    pub fn tick(&self) -> PassOutcome {
        let now = self.clock.advance();
        let outcome = dispatch::run_pass(&self.store, now, &self.metrics);
        if outcome.executed > 0 {
            trace!(tick = now, executed = outcome.executed, failed = outcome.failed, "tick pass");
        }
        outcome
    }

    /// Ticks elapsed since the scheduler was created.
    pub fn current_tick(&self) -> i64 {
        self.clock.now()
    }
}

impl Scheduler for TickScheduler {
    /// Ticks.
    type Span = i64;

    fn to_units(span: i64) -> i64 {
        span
    }

    fn store(&self) -> &TaskStore {
        &self.store
    }

    fn submit(
        &self,
        owner: Option<Owner>,
        body: Option<TaskBody>,
        offset: i64,
        period: i64,
    ) -> Result<TaskHandle, ValidationError> {
        let task = Arc::new(self.factory.build(owner, body, offset, period)?);
        task.stamp(self.clock.now());
        self.store.insert(Arc::clone(&task));
        Ok(TaskHandle::new(task))
    }

    fn metrics(&self) -> DispatchMetrics {
        self.metrics.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn resolve_owner(&self, owner: &dyn Identifiable) -> Option<String> {
        self.factory.resolve(owner)
    }
}
