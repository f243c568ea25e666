//! Weekly-plan editing: explicit operations on the `planned` mapping.
//!
//! The drag-and-drop editor never mutates shared arrays in place; every
//! operation returns the full replacement mapping for the engine's
//! write-whole-collection contract.

use crate::document::PlannedWeek;
use crate::model::BlockId;
use crate::ordering::{move_task, MoveDirection};

/// Slot within the weekly plan a drag originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSlot {
    /// Monday = 1 .. Sunday = 7.
    pub weekday: u8,
    pub block: BlockId,
}

fn slot_tasks<'a>(
    planned: &'a PlannedWeek,
    user_id: &str,
    slot: PlanSlot,
) -> Option<&'a Vec<String>> {
    planned
        .get(user_id)
        .and_then(|week| week.get(&slot.weekday))
        .and_then(|day| day.get(&slot.block))
}

/// Drop a task into a slot, removing it from the source slot when the drag
/// moved it. Adding an id already present in the target is a no-op there.
pub fn plan_task(
    planned: &PlannedWeek,
    user_id: &str,
    target: PlanSlot,
    task_id: &str,
    source: Option<PlanSlot>,
) -> PlannedWeek {
    let mut next = planned.clone();
    let week = next.entry(user_id.to_string()).or_default();

    if let Some(source) = source {
        if let Some(tasks) = week
            .get_mut(&source.weekday)
            .and_then(|day| day.get_mut(&source.block))
        {
            tasks.retain(|id| id != task_id);
        }
    }

    let tasks = week
        .entry(target.weekday)
        .or_default()
        .entry(target.block)
        .or_default();
    if !tasks.iter().any(|id| id == task_id) {
        tasks.push(task_id.to_string());
    }
    next
}

/// Remove a task from one slot of the plan.
pub fn unplan_task(
    planned: &PlannedWeek,
    user_id: &str,
    slot: PlanSlot,
    task_id: &str,
) -> PlannedWeek {
    let mut next = planned.clone();
    if let Some(tasks) = next
        .get_mut(user_id)
        .and_then(|week| week.get_mut(&slot.weekday))
        .and_then(|day| day.get_mut(&slot.block))
    {
        tasks.retain(|id| id != task_id);
    }
    next
}

/// Move a task one step within its slot. `None` when the move is a no-op.
pub fn move_planned_task(
    planned: &PlannedWeek,
    user_id: &str,
    slot: PlanSlot,
    task_id: &str,
    direction: MoveDirection,
) -> Option<PlannedWeek> {
    let tasks = slot_tasks(planned, user_id, slot)?;
    let reordered = move_task(tasks, task_id, direction)?;
    let mut next = planned.clone();
    next.entry(user_id.to_string())
        .or_default()
        .entry(slot.weekday)
        .or_default()
        .insert(slot.block, reordered);
    Some(next)
}
