//! Occurrence derivation: which tasks show up for a user on a given day.
//!
//! Pure recomputation from the current collections; any memoization belongs to
//! the caller and must not change the output.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::blocks::DaySchedule;
use crate::keys::OccurrenceKey;
use crate::model::{BlockId, Task};
use crate::weekday_index;

/// One derivable task occurrence within a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence<'a> {
    pub task: &'a Task,
    pub block: BlockId,
}

/// Occurrences of one day, grouped per block in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayOccurrences<'a> {
    pub pre: Vec<Occurrence<'a>>,
    pub school: Vec<Occurrence<'a>>,
    pub post: Vec<Occurrence<'a>>,
}

impl<'a> DayOccurrences<'a> {
    pub fn block(&self, id: BlockId) -> &Vec<Occurrence<'a>> {
        match id {
            BlockId::Pre => &self.pre,
            BlockId::School => &self.school,
            BlockId::Post => &self.post,
        }
    }

    fn block_mut(&mut self, id: BlockId) -> &mut Vec<Occurrence<'a>> {
        match id {
            BlockId::Pre => &mut self.pre,
            BlockId::School => &mut self.school,
            BlockId::Post => &mut self.post,
        }
    }
}

/// Derive the visible occurrences for `user_id` on `date`.
///
/// A task contributes one occurrence per applicable block when it is assigned
/// to the user, recurs on the date's weekday, and is not suppressed for that
/// exact occurrence. Tasks in a `school` block that disallows tasks are
/// skipped unless flagged as school activities.
pub fn derive_occurrences<'a>(
    tasks: &'a [Task],
    suppressions: &BTreeSet<OccurrenceKey>,
    schedule: &DaySchedule,
    user_id: &str,
    date: NaiveDate,
) -> DayOccurrences<'a> {
    let weekday = weekday_index(date);
    let mut out = DayOccurrences::default();
    for task in tasks {
        if task.assignee_id != user_id {
            continue;
        }
        if !task.days.contains(&weekday) {
            continue;
        }
        for &block in &task.blocks {
            let meta = schedule.block(block);
            if block == BlockId::School && !meta.allow_tasks && !task.school_activity {
                continue;
            }
            if suppressions.contains(&OccurrenceKey::new(task.id.clone(), date, block)) {
                continue;
            }
            out.block_mut(block).push(Occurrence { task, block });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::default_day_schedule;
    use crate::model::DisplayKind;

    fn task(id: &str, assignee: &str, days: &[u8], blocks: &[BlockId]) -> Task {
        Task {
            id: id.to_string(),
            assignee_id: assignee.to_string(),
            title: id.to_string(),
            display_kind: DisplayKind::Text,
            image_url: None,
            days: days.iter().copied().collect(),
            blocks: blocks.iter().copied().collect(),
            duration_minutes: 0,
            library_id: None,
            school_activity: false,
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn filters_by_assignee_and_weekday() {
        let tasks = vec![
            task("t1", "u_lina", &[5], &[BlockId::Post]),
            task("t2", "u_leon", &[5], &[BlockId::Post]),
            task("t3", "u_lina", &[6], &[BlockId::Post]),
        ];
        // 2026-08-07 is a Friday.
        let friday = date("2026-08-07");
        let schedule = default_day_schedule(5);
        let occ = derive_occurrences(&tasks, &BTreeSet::new(), &schedule, "u_lina", friday);
        let ids: Vec<&str> = occ.post.iter().map(|o| o.task.id.as_str()).collect();
        assert_eq!(ids, vec!["t1"]);
        assert!(occ.pre.is_empty());
    }

    #[test]
    fn school_block_gated_unless_school_activity() {
        let mut reading = task("t_read", "u_lina", &[5], &[BlockId::School]);
        let friday = date("2026-08-07");
        let schedule = default_day_schedule(5);

        let occ = derive_occurrences(
            std::slice::from_ref(&reading),
            &BTreeSet::new(),
            &schedule,
            "u_lina",
            friday,
        );
        assert!(occ.school.is_empty());

        reading.school_activity = true;
        let occ = derive_occurrences(
            std::slice::from_ref(&reading),
            &BTreeSet::new(),
            &schedule,
            "u_lina",
            friday,
        );
        assert_eq!(occ.school.len(), 1);
    }

    #[test]
    fn suppression_hides_only_the_exact_occurrence() {
        let tasks = vec![task("t1", "u_lina", &[5, 6], &[BlockId::Pre, BlockId::Post])];
        let friday = date("2026-08-07");
        let saturday = date("2026-08-08");
        let mut suppressions = BTreeSet::new();
        suppressions.insert(OccurrenceKey::new("t1", friday, BlockId::Post));

        let fri = derive_occurrences(
            &tasks,
            &suppressions,
            &default_day_schedule(5),
            "u_lina",
            friday,
        );
        // Suppressed in the evening, still visible that morning.
        assert!(fri.post.is_empty());
        assert_eq!(fri.pre.len(), 1);

        // Same task and block on the next day is unaffected.
        let sat = derive_occurrences(
            &tasks,
            &suppressions,
            &default_day_schedule(6),
            "u_lina",
            saturday,
        );
        assert_eq!(sat.post.len(), 1);
    }

    #[test]
    fn dangling_assignee_yields_no_occurrences() {
        let tasks = vec![task("t1", "u_removed", &[5], &[BlockId::Post])];
        let occ = derive_occurrences(
            &tasks,
            &BTreeSet::new(),
            &default_day_schedule(5),
            "u_lina",
            date("2026-08-07"),
        );
        assert!(occ.post.is_empty());
    }
}
