//! Day schedules: the three time-of-day blocks and their per-day overrides.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::BlockId;
use crate::weekday_index;

/// One time-of-day block of a concrete day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSchedule {
    pub id: BlockId,
    pub label: String,
    /// "HH:MM" wall-clock times; interpretation is local to the device.
    pub start: String,
    pub end: String,
    pub allow_tasks: bool,
}

/// The three blocks of one day, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub pre: BlockSchedule,
    pub school: BlockSchedule,
    pub post: BlockSchedule,
}

impl DaySchedule {
    pub fn block(&self, id: BlockId) -> &BlockSchedule {
        match id {
            BlockId::Pre => &self.pre,
            BlockId::School => &self.school,
            BlockId::Post => &self.post,
        }
    }

    pub fn blocks(&self) -> [&BlockSchedule; 3] {
        [&self.pre, &self.school, &self.post]
    }
}

/// Per-user, per-date schedule overrides keyed by ISO date.
pub type BlockOverrides = BTreeMap<String, BTreeMap<NaiveDate, DaySchedule>>;

fn block(id: BlockId, label: &str, start: &str, end: &str, allow_tasks: bool) -> BlockSchedule {
    BlockSchedule {
        id,
        label: label.to_string(),
        start: start.to_string(),
        end: end.to_string(),
        allow_tasks,
    }
}

/// Computed weekday default: weekends get an open midday block, school days a
/// closed school block.
pub fn default_day_schedule(weekday: u8) -> DaySchedule {
    let is_weekend = weekday == 6 || weekday == 7;
    if is_weekend {
        DaySchedule {
            pre: block(BlockId::Pre, "Morning", "08:00", "12:00", true),
            school: block(BlockId::School, "Midday", "12:00", "16:00", true),
            post: block(BlockId::Post, "Evening", "16:00", "19:45", true),
        }
    } else {
        DaySchedule {
            pre: block(BlockId::Pre, "Morning", "07:00", "08:30", true),
            school: block(BlockId::School, "School", "08:30", "16:00", false),
            post: block(BlockId::Post, "Evening", "16:00", "19:45", true),
        }
    }
}

/// Schedule for a user on a date: the stored override if present, else the
/// weekday default.
pub fn schedule_for(user_id: &str, date: NaiveDate, overrides: &BlockOverrides) -> DaySchedule {
    overrides
        .get(user_id)
        .and_then(|days| days.get(&date))
        .cloned()
        .unwrap_or_else(|| default_day_schedule(weekday_index(date)))
}
