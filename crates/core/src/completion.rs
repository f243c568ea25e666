//! Completion records: occurrence-scoped done marks.
//!
//! All operations take and return full replacement collections; the sync
//! engine always writes a collection wholesale.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::model::{BlockId, Completion};
use crate::new_id;

/// Toggle the done state of one occurrence.
///
/// Removes every record matching the tuple if any exist (also cleaning up
/// duplicates introduced by historic races), otherwise appends exactly one.
/// Toggling twice returns to the original state.
pub fn toggle_completion(
    completions: &[Completion],
    task_id: &str,
    user_id: &str,
    date: NaiveDate,
    block: BlockId,
) -> Vec<Completion> {
    let existed = completions
        .iter()
        .any(|c| c.matches(task_id, user_id, date, block));
    let mut next: Vec<Completion> = completions
        .iter()
        .filter(|c| !c.matches(task_id, user_id, date, block))
        .cloned()
        .collect();
    if !existed {
        next.push(Completion {
            id: new_id("done"),
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            date,
            block,
        });
    }
    next
}

/// Mark one occurrence done, keeping at most one record for the tuple.
pub fn complete_once(
    completions: &[Completion],
    task_id: &str,
    user_id: &str,
    date: NaiveDate,
    block: BlockId,
) -> Vec<Completion> {
    let mut next = completions.to_vec();
    if !next.iter().any(|c| c.matches(task_id, user_id, date, block)) {
        next.push(Completion {
            id: new_id("done"),
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            date,
            block,
        });
    }
    next
}

/// Remove the record for one occurrence, if present.
pub fn clear_completion(
    completions: &[Completion],
    task_id: &str,
    user_id: &str,
    date: NaiveDate,
    block: BlockId,
) -> Vec<Completion> {
    completions
        .iter()
        .filter(|c| !c.matches(task_id, user_id, date, block))
        .cloned()
        .collect()
}

/// Done-set for one user and date: `"{taskId}::{block}"` entries, the shape
/// the child view checks per rendered occurrence.
pub fn completed_keys(completions: &[Completion], user_id: &str, date: NaiveDate) -> BTreeSet<String> {
    completions
        .iter()
        .filter(|c| c.user_id == user_id && c.date == date)
        .map(|c| format!("{}::{}", c.task_id, c.block))
        .collect()
}
