//! Domain model and pure scheduling logic for the weekplan household planner.
//!
//! Everything in this crate is synchronous and I/O-free: the sync engine and
//! the presentation layer compose these types and functions, then persist the
//! resulting collections through `weekplan-sync`.

pub mod blocks;
pub mod completion;
pub mod document;
pub mod keys;
pub mod model;
pub mod occurrence;
pub mod ordering;
pub mod planned;
pub mod seed;
pub mod timer;

pub use blocks::{default_day_schedule, schedule_for, BlockSchedule, DaySchedule};
pub use document::{Collection, HouseholdDocument};
pub use keys::{KeyParseError, OccurrenceKey, SlotKey, TimerKey};
pub use model::{
    BlockId, Completion, DeviceBinding, DisplayKind, Person, Role, Task, TaskTemplate,
    TimerRecord, TimerStatus,
};

/// Weekday index as used throughout the document: Monday = 1 .. Sunday = 7.
pub fn weekday_index(date: chrono::NaiveDate) -> u8 {
    chrono::Datelike::weekday(&date).number_from_monday() as u8
}

/// Generate a new prefixed record id, e.g. `done_1f3a...`.
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn weekday_index_is_monday_based() {
        // 2026-08-03 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        assert_eq!(weekday_index(monday), 1);
        assert_eq!(weekday_index(monday + chrono::Duration::days(6)), 7);
    }

    #[test]
    fn new_id_carries_prefix() {
        let id = new_id("t");
        assert!(id.starts_with("t_"));
        assert!(id.len() > 10);
    }
}
