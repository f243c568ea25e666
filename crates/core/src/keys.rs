//! Composite keys scoping state to one concrete occurrence.
//!
//! Suppressions, timers and sort orders are always keyed by the specific
//! occurrence tuple, never by task id alone, so the same task on another day
//! or block is tracked independently. The string form joins components with
//! `__` and is what the remote document stores; parsing splits from the right
//! so task ids may themselves contain the separator.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::model::BlockId;

const SEP: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("unknown block id '{0}'")]
    UnknownBlock(String),
    #[error("invalid date '{0}' in key")]
    InvalidDate(String),
    #[error("invalid weekday '{0}' in key (expected 1..=7)")]
    InvalidWeekday(String),
    #[error("malformed key '{0}'")]
    Malformed(String),
}

impl KeyParseError {
    pub(crate) fn unknown_block(raw: &str) -> Self {
        KeyParseError::UnknownBlock(raw.to_string())
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, KeyParseError> {
    raw.parse()
        .map_err(|_| KeyParseError::InvalidDate(raw.to_string()))
}

/// Key of one task occurrence: `"{taskId}__{date}__{block}"`.
///
/// The suppression collection is a set of these.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OccurrenceKey {
    pub task_id: String,
    pub date: NaiveDate,
    pub block: BlockId,
}

impl OccurrenceKey {
    pub fn new(task_id: impl Into<String>, date: NaiveDate, block: BlockId) -> Self {
        Self {
            task_id: task_id.into(),
            date,
            block,
        }
    }
}

impl fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEP}{}{SEP}{}", self.task_id, self.date, self.block)
    }
}

impl FromStr for OccurrenceKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, SEP);
        let block = parts.next().ok_or_else(|| KeyParseError::Malformed(s.into()))?;
        let date = parts.next().ok_or_else(|| KeyParseError::Malformed(s.into()))?;
        let task_id = parts.next().ok_or_else(|| KeyParseError::Malformed(s.into()))?;
        Ok(Self {
            task_id: task_id.to_string(),
            date: parse_date(date)?,
            block: block.parse()?,
        })
    }
}

/// Key of one timer occurrence: `"{taskId}__{userId}__{date}__{block}"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerKey {
    pub task_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub block: BlockId,
}

impl TimerKey {
    pub fn new(
        task_id: impl Into<String>,
        user_id: impl Into<String>,
        date: NaiveDate,
        block: BlockId,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            user_id: user_id.into(),
            date,
            block,
        }
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEP}{}{SEP}{}{SEP}{}",
            self.task_id, self.user_id, self.date, self.block
        )
    }
}

impl FromStr for TimerKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(4, SEP);
        let block = parts.next().ok_or_else(|| KeyParseError::Malformed(s.into()))?;
        let date = parts.next().ok_or_else(|| KeyParseError::Malformed(s.into()))?;
        let user_id = parts.next().ok_or_else(|| KeyParseError::Malformed(s.into()))?;
        let task_id = parts.next().ok_or_else(|| KeyParseError::Malformed(s.into()))?;
        Ok(Self {
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            date: parse_date(date)?,
            block: block.parse()?,
        })
    }
}

/// Key of one display-order slot: `"{userId}__{weekday}__{block}"`.
///
/// `sortOrders` maps these to ordered task-id sequences.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub user_id: String,
    /// Monday = 1 .. Sunday = 7.
    pub weekday: u8,
    pub block: BlockId,
}

impl SlotKey {
    pub fn new(user_id: impl Into<String>, weekday: u8, block: BlockId) -> Self {
        Self {
            user_id: user_id.into(),
            weekday,
            block,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEP}{}{SEP}{}", self.user_id, self.weekday, self.block)
    }
}

impl FromStr for SlotKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, SEP);
        let block = parts.next().ok_or_else(|| KeyParseError::Malformed(s.into()))?;
        let weekday = parts.next().ok_or_else(|| KeyParseError::Malformed(s.into()))?;
        let user_id = parts.next().ok_or_else(|| KeyParseError::Malformed(s.into()))?;
        let weekday: u8 = weekday
            .parse()
            .map_err(|_| KeyParseError::InvalidWeekday(weekday.to_string()))?;
        if !(1..=7).contains(&weekday) {
            return Err(KeyParseError::InvalidWeekday(weekday.to_string()));
        }
        Ok(Self {
            user_id: user_id.to_string(),
            weekday,
            block: block.parse()?,
        })
    }
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(OccurrenceKey);
string_serde!(TimerKey);
string_serde!(SlotKey);
