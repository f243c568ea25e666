//! The shared household document and its top-level collections.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::blocks::BlockOverrides;
use crate::keys::{OccurrenceKey, SlotKey};
use crate::model::{BlockId, Completion, Person, Task, TaskTemplate, TimerRecord};

/// Denormalized weekly-plan shape used by the drag-and-drop editor:
/// userId -> weekday (1..7) -> block -> ordered task ids.
pub type PlannedWeek = BTreeMap<String, BTreeMap<u8, BTreeMap<BlockId, Vec<String>>>>;

/// The nine top-level collections of the household document.
///
/// The sync engine merges at exactly this granularity: a save rewrites whole
/// collections, and a remote snapshot replaces whole collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Users,
    Tasks,
    Library,
    Suppressions,
    Completions,
    Timers,
    SortOrders,
    BlockOverrides,
    Planned,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Users,
        Collection::Tasks,
        Collection::Library,
        Collection::Suppressions,
        Collection::Completions,
        Collection::Timers,
        Collection::SortOrders,
        Collection::BlockOverrides,
        Collection::Planned,
    ];

    /// Wire field name inside the remote document.
    pub fn field_name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Tasks => "tasks",
            Collection::Library => "library",
            Collection::Suppressions => "suppressions",
            Collection::Completions => "completions",
            Collection::Timers => "timers",
            Collection::SortOrders => "sortOrders",
            Collection::BlockOverrides => "blockOverrides",
            Collection::Planned => "planned",
        }
    }

    /// Whether the collection is a JSON array (as opposed to a map) on the
    /// wire; used for defensive shape checks on incoming snapshots.
    pub fn is_sequence(&self) -> bool {
        !matches!(
            self,
            Collection::SortOrders | Collection::BlockOverrides | Collection::Planned
        )
    }
}

/// The single shared root record for one family unit.
///
/// `Default` is the fully-empty document used when creating the remote record;
/// first-run seed data lives in [`crate::seed`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdDocument {
    #[serde(default)]
    pub users: Vec<Person>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub library: Vec<TaskTemplate>,
    #[serde(default)]
    pub suppressions: BTreeSet<OccurrenceKey>,
    #[serde(default)]
    pub completions: Vec<Completion>,
    #[serde(default)]
    pub timers: Vec<TimerRecord>,
    #[serde(default)]
    pub sort_orders: BTreeMap<SlotKey, Vec<String>>,
    #[serde(default)]
    pub block_overrides: BlockOverrides,
    #[serde(default)]
    pub planned: PlannedWeek,
}

impl HouseholdDocument {
    /// Look up a person; dangling references yield `None`, never a panic.
    pub fn person(&self, user_id: &str) -> Option<&Person> {
        self.users.iter().find(|person| person.id == user_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }
}
