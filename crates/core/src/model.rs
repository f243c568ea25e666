//! Household document record types.
//!
//! Wire names are camelCase to match the remote document schema; collection
//! values are rewritten wholesale on every write, so these types carry no
//! per-field dirty tracking.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::keys::KeyParseError;

/// Account role within the household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Parent,
    Child,
}

/// One member of the household.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: String,
    pub role: Role,
    /// Avatar image reference (path or asset name); rendering is up to the UI.
    pub avatar: String,
    /// Parent accounts may carry a PIN; the gate itself lives in the UI layer.
    #[serde(default)]
    pub pin: Option<String>,
}

/// Time-of-day block identifier.
///
/// The middle block is labeled "School" on school days and "Midday" otherwise;
/// the id stays `school` either way so occurrence keys remain stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockId {
    Pre,
    School,
    Post,
}

impl BlockId {
    pub const ALL: [BlockId; 3] = [BlockId::Pre, BlockId::School, BlockId::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockId::Pre => "pre",
            BlockId::School => "school",
            BlockId::Post => "post",
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockId {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(BlockId::Pre),
            "school" => Ok(BlockId::School),
            "post" => Ok(BlockId::Post),
            other => Err(KeyParseError::unknown_block(other)),
        }
    }
}

// Manual serde so BlockId also works in map-key position.
impl Serialize for BlockId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// How a task renders on the child view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    Image,
    Text,
}

/// A recurring task assigned to one child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    /// May dangle after a person is removed; such tasks derive no occurrences.
    pub assignee_id: String,
    pub title: String,
    #[serde(rename = "displayType")]
    pub display_kind: DisplayKind,
    /// Present iff `display_kind` is `Image`.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Applicable weekdays, Monday = 1 .. Sunday = 7.
    pub days: BTreeSet<u8>,
    pub blocks: BTreeSet<BlockId>,
    /// 0 means the occurrence has no countdown timer.
    pub duration_minutes: u32,
    #[serde(default)]
    pub library_id: Option<String>,
    /// Allows the task to render in a `school` block that disallows tasks.
    #[serde(default)]
    pub school_activity: bool,
}

/// Template in the read-mostly task library from which tasks are instantiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: DisplayKind,
    #[serde(default)]
    pub image_url: Option<String>,
    pub default_blocks: BTreeSet<BlockId>,
    pub default_duration: u32,
    pub category: String,
}

/// Existence of a record marks the occurrence as done; absence means not done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub block: BlockId,
}

impl Completion {
    /// Tuple identity used for dedupe; `id` is a record id, not the key.
    pub fn matches(&self, task_id: &str, user_id: &str, date: NaiveDate, block: BlockId) -> bool {
        self.task_id == task_id && self.user_id == user_id && self.date == date && self.block == block
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Running,
    Paused,
}

/// Countdown timer for one occurrence, created lazily on first start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    /// Composite occurrence key in string form (see [`crate::keys::TimerKey`]).
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub block: BlockId,
    pub remaining_sec: u32,
    pub status: TimerStatus,
}

/// Maps a physical device to the person operating it.
///
/// Stored as one top-level field (keyed by `device_id`) of the per-family
/// registry document, so updating one device never rewrites its siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBinding {
    pub device_id: String,
    pub fam_id: String,
    pub label: String,
    pub role: Role,
    /// Bound person; `None` until a parent assigns the device.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub force_child_mode: bool,
    pub last_seen: DateTime<Utc>,
    pub platform: String,
}
