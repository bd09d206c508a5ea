use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use tickwork_core::{Identifiable, Owner, OwnerResolver, SchedulerConfig};
use tracing::{error, info, warn};

use super::dispatch_loop;
use crate::clock::{Clock, MonotonicClock};
use crate::error::{SchedulerError, ValidationError};
use crate::facade::Scheduler;
use crate::metrics::DispatchMetrics;
use crate::store::TaskStore;
use crate::task::{TaskBody, TaskHandle, TaskSynchronicity};
use crate::validation::TaskFactory;

/// State shared between the public handle and the dispatch thread.
pub(super) struct Shared {
    pub(super) store: TaskStore,
    /// Paired with the store lock; notified on every change the loop must see.
    pub(super) wakeup: Condvar,
    pub(super) factory: TaskFactory,
    pub(super) clock: MonotonicClock,
    pub(super) metrics: RwLock<DispatchMetrics>,
    pub(super) shutdown: AtomicBool,
    /// Idle wait cap in milliseconds.
    pub(super) max_wait: i64,
}

impl Shared {
    pub(super) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Wake the loop so it recalibrates.
    fn notify(&self) {
        // Taking the lock orders the notification after any in-progress
        // recalibration, so the wakeup cannot be lost.
        let _tasks = self.store.lock();
        self.wakeup.notify_all();
    }
}

/// Millisecond-resolution scheduler with a dedicated dispatch thread.
///
/// Task bodies run one after another on that thread. Dropping the scheduler
/// stops the loop and joins the thread.
pub struct WallClockScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WallClockScheduler {
    /// Create the scheduler and start its dispatch thread.
    pub fn start(
        resolver: Arc<dyn OwnerResolver>,
        config: &SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        let shared = Arc::new(Shared {
            store: TaskStore::new(),
            wakeup: Condvar::new(),
            factory: TaskFactory::new(resolver, TaskSynchronicity::Asynchronous),
            clock: MonotonicClock::new(),
            metrics: RwLock::new(DispatchMetrics::default()),
            shutdown: AtomicBool::new(false),
            max_wait: i64::try_from(config.max_idle_wait_ms.max(1)).unwrap_or(i64::MAX),
        });

        let loop_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || dispatch_loop::run(&loop_shared))?;

        info!(
            thread = %config.thread_name,
            max_idle_wait_ms = config.max_idle_wait_ms,
            "wall-clock scheduler started"
        );
        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Whether the dispatch loop is still accepting work for execution.
    pub fn is_running(&self) -> bool {
        !self.shared.is_shut_down()
    }

    /// Stop the dispatch loop and wait for it to exit. Idempotent.
    ///
    /// A pass already executing bodies finishes first. When called from a
    /// task body the loop is signalled but not joined.
    pub fn shutdown(&self) {
        {
            let _tasks = self.shared.store.lock();
            self.shared.shutdown.store(true, Ordering::Release);
            self.shared.wakeup.notify_all();
        }

        let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return;
        };

        if worker.thread().id() == thread::current().id() {
            info!("wall-clock scheduler stopping from its own dispatch thread");
            return;
        }
        if worker.join().is_err() {
            error!("wall-clock dispatch thread panicked");
        }
    }
}

impl Drop for WallClockScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Scheduler for WallClockScheduler {
    /// Wall-clock time, millisecond resolution.
    type Span = chrono::Duration;

    /// Whole milliseconds. Negative spans stay negative even below 1 ms.
    fn to_units(span: chrono::Duration) -> i64 {
        if span < chrono::Duration::zero() {
            span.num_milliseconds().min(-1)
        } else {
            span.num_milliseconds()
        }
    }

    fn store(&self) -> &TaskStore {
        &self.shared.store
    }

    fn submit(
        &self,
        owner: Option<Owner>,
        body: Option<TaskBody>,
        offset: i64,
        period: i64,
    ) -> Result<TaskHandle, ValidationError> {
        let task = Arc::new(self.shared.factory.build(owner, body, offset, period)?);
        if self.shared.is_shut_down() {
            warn!(task_id = %task.id(), task = %task.name(), "scheduler is shut down, task will not run");
        }

        {
            let mut tasks = self.shared.store.lock();
            task.stamp(self.shared.clock.now());
            tasks.insert(task.id(), Arc::clone(&task));
            self.shared.wakeup.notify_all();
        }
        Ok(TaskHandle::new(task))
    }

    fn metrics(&self) -> DispatchMetrics {
        self.shared
            .metrics
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn resolve_owner(&self, owner: &dyn Identifiable) -> Option<String> {
        self.shared.factory.resolve(owner)
    }

    fn cancel(&self, handle: &TaskHandle) -> bool {
        let was_waiting = handle.cancel();
        self.shared.notify();
        was_waiting
    }
}
