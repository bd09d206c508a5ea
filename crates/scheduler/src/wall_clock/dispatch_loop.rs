use std::time::Duration;

use tracing::{debug, error, info, trace};

use super::core::Shared;
use crate::clock::Clock;
use crate::dispatch::{collect_due, execute_all, finish_pass, retire_one_shots, Scan};
use crate::recalibrate::recalibrate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    PreInit,
    Init,
    Run,
    NotRunning,
}

/// Body of the dispatch thread. Returns once shutdown is observed.
pub(super) fn run(shared: &Shared) {
    let mut state = LoopState::PreInit;
    let mut last_processing = 0;

    loop {
        state = match state {
            LoopState::PreInit => {
                debug!("dispatch loop initializing");
                LoopState::Init
            }
            LoopState::Init => {
                last_processing = shared.clock.now();
                info!("dispatch loop running");
                LoopState::Run
            }
            LoopState::Run => {
                if pass(shared, &mut last_processing) {
                    LoopState::Run
                } else {
                    LoopState::NotRunning
                }
            }
            LoopState::NotRunning => {
                info!("dispatch loop stopped");
                return;
            }
        };
    }
}

/// Wait until something may be due, then dispatch. Returns `false` on
/// shutdown.
fn pass(shared: &Shared, last_processing: &mut i64) -> bool {
    let mut tasks = shared.store.lock();
    if shared.is_shut_down() {
        return false;
    }

    let before_wait = shared.clock.now();
    let timeout = recalibrate(tasks.values(), before_wait, shared.max_wait);
    if timeout > 0 {
        trace!(
            timeout_ms = timeout,
            since_last_pass_ms = before_wait - *last_processing,
            pending = tasks.len(),
            "dispatch loop waiting"
        );
        let wait = Duration::from_millis(u64::try_from(timeout).unwrap_or(0));
        tasks = match shared.wakeup.wait_timeout(tasks, wait) {
            Ok((guard, _)) => guard,
            Err(poisoned) => {
                error!("catastrophic error in scheduler: task store lock poisoned while waiting");
                poisoned.into_inner().0
            }
        };
        if shared.is_shut_down() {
            return false;
        }
    }

    let now = shared.clock.now();
    let Scan { due, purged } = collect_due(&mut tasks, now);
    drop(tasks);

    let outcome = execute_all(&due, &shared.metrics);

    let mut tasks = shared.store.lock();
    let retired = retire_one_shots(&mut tasks, &due);
    let pending = tasks.len();
    drop(tasks);

    *last_processing = now;
    finish_pass(&shared.metrics, purged, retired, pending);

    if outcome.executed > 0 {
        debug!(
            executed = outcome.executed,
            failed = outcome.failed,
            pending,
            "dispatch pass complete"
        );
    }
    true
}
