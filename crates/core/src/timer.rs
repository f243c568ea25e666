//! Per-occurrence countdown timers.
//!
//! One timer exists per occurrence tuple, created lazily on first start. The
//! 1 Hz tick lives in `weekplan-sync`; this module only provides the pure
//! collection transforms it applies.

use chrono::NaiveDate;

use crate::completion::{clear_completion, complete_once};
use crate::keys::TimerKey;
use crate::model::{BlockId, Completion, Task, TimerRecord, TimerStatus};

/// Start (or resume) the timer for one occurrence of `task`.
///
/// Returns `None` when the task has no duration; an existing timer keeps its
/// remaining seconds and just switches to running.
pub fn start_timer(
    timers: &[TimerRecord],
    task: &Task,
    user_id: &str,
    date: NaiveDate,
    block: BlockId,
) -> Option<Vec<TimerRecord>> {
    if task.duration_minutes == 0 {
        return None;
    }
    let id = TimerKey::new(task.id.clone(), user_id, date, block).to_string();
    let mut next = timers.to_vec();
    match next.iter_mut().find(|t| t.id == id) {
        Some(existing) => existing.status = TimerStatus::Running,
        None => next.push(TimerRecord {
            id,
            task_id: task.id.clone(),
            user_id: user_id.to_string(),
            date,
            block,
            remaining_sec: task.duration_minutes * 60,
            status: TimerStatus::Running,
        }),
    }
    Some(next)
}

/// Pause the timer for one occurrence; a missing timer is left as-is.
pub fn pause_timer(
    timers: &[TimerRecord],
    task_id: &str,
    user_id: &str,
    date: NaiveDate,
    block: BlockId,
) -> Vec<TimerRecord> {
    let id = TimerKey::new(task_id, user_id, date, block).to_string();
    timers
        .iter()
        .map(|t| {
            if t.id == id {
                TimerRecord {
                    status: TimerStatus::Paused,
                    ..t.clone()
                }
            } else {
                t.clone()
            }
        })
        .collect()
}

/// Reset one occurrence: timer paused at the full duration, completion cleared.
///
/// Both collections are returned so the caller saves them in one patch.
pub fn restart_occurrence(
    timers: &[TimerRecord],
    completions: &[Completion],
    task_id: &str,
    user_id: &str,
    date: NaiveDate,
    block: BlockId,
    minutes: u32,
) -> (Vec<TimerRecord>, Vec<Completion>) {
    let id = TimerKey::new(task_id, user_id, date, block).to_string();
    let secs = minutes.max(1) * 60;
    let mut next = timers.to_vec();
    match next.iter_mut().find(|t| t.id == id) {
        Some(existing) => {
            existing.remaining_sec = secs;
            existing.status = TimerStatus::Paused;
        }
        None => next.push(TimerRecord {
            id,
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            date,
            block,
            remaining_sec: secs,
            status: TimerStatus::Paused,
        }),
    }
    let completions = clear_completion(completions, task_id, user_id, date, block);
    (next, completions)
}

/// Advance every running timer by one second.
///
/// A timer reaching zero pauses itself and completes its occurrence (at most
/// once). Returns `None` when nothing changed, so idle ticks cause no write.
pub fn tick_second(
    timers: &[TimerRecord],
    completions: &[Completion],
) -> Option<(Vec<TimerRecord>, Vec<Completion>)> {
    if !timers.iter().any(|t| t.status == TimerStatus::Running) {
        return None;
    }
    let mut next_timers = Vec::with_capacity(timers.len());
    let mut next_completions = completions.to_vec();
    for timer in timers {
        if timer.status != TimerStatus::Running {
            next_timers.push(timer.clone());
            continue;
        }
        let remaining = timer.remaining_sec.saturating_sub(1);
        if remaining == 0 {
            next_completions = complete_once(
                &next_completions,
                &timer.task_id,
                &timer.user_id,
                timer.date,
                timer.block,
            );
            next_timers.push(TimerRecord {
                remaining_sec: 0,
                status: TimerStatus::Paused,
                ..timer.clone()
            });
        } else {
            next_timers.push(TimerRecord {
                remaining_sec: remaining,
                ..timer.clone()
            });
        }
    }
    Some((next_timers, next_completions))
}
