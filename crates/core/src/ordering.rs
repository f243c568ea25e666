//! Display-order maintenance for task occurrences within a block.
//!
//! Orders are explicit task-id sequences in `sortOrders`; reordering returns a
//! new sequence instead of mutating shared state, keeping the engine's
//! write-whole-collection contract race-free.

use crate::model::Task;
use crate::occurrence::Occurrence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Reconcile a stored order against the ids currently present.
///
/// Stale ids are dropped, the relative order of surviving ids is preserved,
/// and ids not yet ordered are appended in occurrence order.
pub fn reconcile_order(existing: &[String], current_ids: &[String]) -> Vec<String> {
    let mut next: Vec<String> = existing
        .iter()
        .filter(|id| current_ids.contains(id))
        .cloned()
        .collect();
    for id in current_ids {
        if !next.contains(id) {
            next.push(id.clone());
        }
    }
    next
}

/// Sort occurrences by a stored order; unlisted ids sink to the end in their
/// derivation order.
pub fn sorted_by_order<'a>(
    occurrences: &[Occurrence<'a>],
    order: &[String],
) -> Vec<Occurrence<'a>> {
    let position = |task: &Task| {
        order
            .iter()
            .position(|id| *id == task.id)
            .unwrap_or(usize::MAX)
    };
    let mut sorted = occurrences.to_vec();
    sorted.sort_by_key(|occurrence| position(occurrence.task));
    sorted
}

/// Move one task a single step within an order.
///
/// Returns `None` when the move is a no-op (id missing or already at the
/// edge), so the caller can skip the save entirely.
pub fn move_task(order: &[String], task_id: &str, direction: MoveDirection) -> Option<Vec<String>> {
    let index = order.iter().position(|id| id == task_id)?;
    let target = match direction {
        MoveDirection::Up => index.checked_sub(1)?,
        MoveDirection::Down => {
            if index + 1 >= order.len() {
                return None;
            }
            index + 1
        }
    };
    let mut next = order.to_vec();
    next.swap(index, target);
    Some(next)
}
