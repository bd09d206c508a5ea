//! Sleep-interval computation for the wall-clock dispatch loop.
//!
//! Recomputed from scratch before every wait rather than maintained
//! incrementally, so tasks added or canceled in between are always accounted
//! for. Each task is measured from its own timestamp, so waking the loop
//! early never pushes a pending task back.

use std::sync::Arc;

use crate::task::ScheduledTask;

/// Time left until `task` is due at `now`, floored at 0. `None` once canceled.
pub(crate) fn next_due_in(task: &ScheduledTask, now: i64) -> Option<i64> {
    let threshold = task.threshold()?;
    let elapsed = now.saturating_sub(task.timestamp()).max(0);
    Some(threshold.saturating_sub(elapsed).max(0))
}

/// Longest safe wait before the next pass, in clock units.
///
/// The smallest `next_due_in` over all live tasks, capped at `max_wait`.
/// Returns `max_wait` when there is nothing to wait for.
pub(crate) fn recalibrate<'a, I>(tasks: I, now: i64, max_wait: i64) -> i64
where
    I: IntoIterator<Item = &'a Arc<ScheduledTask>>,
{
    tasks
        .into_iter()
        .filter_map(|t| next_due_in(t, now))
        .min()
        .map_or(max_wait, |wait| wait.min(max_wait))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::tests::make_task;

    const FOREVER: i64 = 60_000;

    /// Waiting one-shot (5), running repeating (20), waiting repeating (3, 7).
    fn mixed_tasks() -> Vec<Arc<ScheduledTask>> {
        let one_shot = make_task(5, 0);
        let running = make_task(0, 20);
        running.mark_running();
        let delayed_repeating = make_task(3, 7);
        vec![one_shot, running, delayed_repeating]
    }

    #[test]
    fn next_due_in_per_state() {
        let tasks = mixed_tasks();
        assert_eq!(next_due_in(&tasks[0], 0), Some(5));
        assert_eq!(next_due_in(&tasks[1], 0), Some(20));
        assert_eq!(next_due_in(&tasks[2], 0), Some(3));

        let canceled = make_task(1, 1);
        canceled.cancel();
        assert_eq!(next_due_in(&canceled, 0), None);
    }

    #[test]
    fn minimum_across_tasks() {
        let tasks = mixed_tasks();
        assert_eq!(recalibrate(&tasks, 0, FOREVER), 3);
    }

    #[test]
    fn elapsed_time_is_subtracted() {
        let tasks = mixed_tasks();
        assert_eq!(recalibrate(&tasks, 2, FOREVER), 1);
    }

    #[test]
    fn floored_at_zero() {
        let tasks = mixed_tasks();
        assert_eq!(recalibrate(&tasks, 50, FOREVER), 0);
    }

    #[test]
    fn each_task_counts_from_its_own_timestamp() {
        let early = make_task(300, 0);
        let late = make_task(10_000, 0);
        late.stamp(250);

        // The later submission does not reset the earlier task's countdown.
        assert_eq!(recalibrate(&[early, late], 250, FOREVER), 50);
    }

    #[test]
    fn future_timestamp_does_not_extend_wait() {
        let task = make_task(3, 0);
        task.stamp(10);
        assert_eq!(recalibrate(&[task], 0, FOREVER), 3);
    }

    #[test]
    fn empty_store_waits_forever() {
        let tasks: Vec<Arc<ScheduledTask>> = Vec::new();
        assert_eq!(recalibrate(&tasks, 0, FOREVER), FOREVER);
    }

    #[test]
    fn only_canceled_tasks_waits_forever() {
        let task = make_task(1, 0);
        task.cancel();
        assert_eq!(recalibrate(&[task], 0, FOREVER), FOREVER);
    }

    #[test]
    fn long_offsets_are_capped() {
        let tasks = vec![make_task(FOREVER * 10, 0)];
        assert_eq!(recalibrate(&tasks, 0, FOREVER), FOREVER);
    }
}
