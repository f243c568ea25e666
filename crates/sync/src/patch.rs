//! Sparse updates to the household document.
//!
//! A patch names only the collections it replaces; each named collection
//! carries its complete new value, computed by the caller from the full
//! snapshot plus the intended change. There is no remote splice primitive,
//! so partial arrays are never sent.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use weekplan_core::blocks::BlockOverrides;
use weekplan_core::document::{Collection, HouseholdDocument, PlannedWeek};
use weekplan_core::keys::{OccurrenceKey, SlotKey};
use weekplan_core::model::{Completion, Person, Task, TaskTemplate, TimerRecord};
use weekplan_remote::DocumentFields;

use crate::error::Result;
use crate::sanitize::sanitize;

/// Sparse replacement of one or more top-level collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<Person>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<Vec<TaskTemplate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppressions: Option<BTreeSet<OccurrenceKey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<Vec<Completion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timers: Option<Vec<TimerRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_orders: Option<BTreeMap<SlotKey, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_overrides: Option<BlockOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned: Option<PlannedWeek>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(mut self, users: Vec<Person>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn with_library(mut self, library: Vec<TaskTemplate>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn with_suppressions(mut self, suppressions: BTreeSet<OccurrenceKey>) -> Self {
        self.suppressions = Some(suppressions);
        self
    }

    pub fn with_completions(mut self, completions: Vec<Completion>) -> Self {
        self.completions = Some(completions);
        self
    }

    pub fn with_timers(mut self, timers: Vec<TimerRecord>) -> Self {
        self.timers = Some(timers);
        self
    }

    pub fn with_sort_orders(mut self, sort_orders: BTreeMap<SlotKey, Vec<String>>) -> Self {
        self.sort_orders = Some(sort_orders);
        self
    }

    pub fn with_block_overrides(mut self, block_overrides: BlockOverrides) -> Self {
        self.block_overrides = Some(block_overrides);
        self
    }

    pub fn with_planned(mut self, planned: PlannedWeek) -> Self {
        self.planned = Some(planned);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.collections().is_empty()
    }

    /// Collections this patch replaces.
    pub fn collections(&self) -> Vec<Collection> {
        let mut out = Vec::new();
        if self.users.is_some() {
            out.push(Collection::Users);
        }
        if self.tasks.is_some() {
            out.push(Collection::Tasks);
        }
        if self.library.is_some() {
            out.push(Collection::Library);
        }
        if self.suppressions.is_some() {
            out.push(Collection::Suppressions);
        }
        if self.completions.is_some() {
            out.push(Collection::Completions);
        }
        if self.timers.is_some() {
            out.push(Collection::Timers);
        }
        if self.sort_orders.is_some() {
            out.push(Collection::SortOrders);
        }
        if self.block_overrides.is_some() {
            out.push(Collection::BlockOverrides);
        }
        if self.planned.is_some() {
            out.push(Collection::Planned);
        }
        out
    }

    /// Apply to an in-memory document, replacing every named collection.
    /// Returns the collections that were replaced.
    pub fn apply_to(&self, doc: &mut HouseholdDocument) -> Vec<Collection> {
        if let Some(users) = &self.users {
            doc.users = users.clone();
        }
        if let Some(tasks) = &self.tasks {
            doc.tasks = tasks.clone();
        }
        if let Some(library) = &self.library {
            doc.library = library.clone();
        }
        if let Some(suppressions) = &self.suppressions {
            doc.suppressions = suppressions.clone();
        }
        if let Some(completions) = &self.completions {
            doc.completions = completions.clone();
        }
        if let Some(timers) = &self.timers {
            doc.timers = timers.clone();
        }
        if let Some(sort_orders) = &self.sort_orders {
            doc.sort_orders = sort_orders.clone();
        }
        if let Some(block_overrides) = &self.block_overrides {
            doc.block_overrides = block_overrides.clone();
        }
        if let Some(planned) = &self.planned {
            doc.planned = planned.clone();
        }
        self.collections()
    }

    /// Fold `newer` into this patch; collections named by both are taken from
    /// `newer` (each save already carries the full replacement value).
    pub fn merge(&mut self, newer: DocumentPatch) {
        if newer.users.is_some() {
            self.users = newer.users;
        }
        if newer.tasks.is_some() {
            self.tasks = newer.tasks;
        }
        if newer.library.is_some() {
            self.library = newer.library;
        }
        if newer.suppressions.is_some() {
            self.suppressions = newer.suppressions;
        }
        if newer.completions.is_some() {
            self.completions = newer.completions;
        }
        if newer.timers.is_some() {
            self.timers = newer.timers;
        }
        if newer.sort_orders.is_some() {
            self.sort_orders = newer.sort_orders;
        }
        if newer.block_overrides.is_some() {
            self.block_overrides = newer.block_overrides;
        }
        if newer.planned.is_some() {
            self.planned = newer.planned;
        }
    }

    /// Serialize into sanitized top-level remote document fields.
    pub fn to_fields(&self) -> Result<DocumentFields> {
        let value = serde_json::to_value(self)?;
        let serde_json::Value::Object(raw) = value else {
            // A struct always serializes to an object.
            return Ok(DocumentFields::new());
        };
        let mut fields = DocumentFields::new();
        for (field, value) in raw {
            if let Some(clean) = sanitize(value) {
                fields.insert(field, clean);
            }
        }
        Ok(fields)
    }
}

/// Extract the full replacement patch for the whole document; used when the
/// remote record is first created.
pub fn full_document_patch(doc: &HouseholdDocument) -> DocumentPatch {
    DocumentPatch {
        users: Some(doc.users.clone()),
        tasks: Some(doc.tasks.clone()),
        library: Some(doc.library.clone()),
        suppressions: Some(doc.suppressions.clone()),
        completions: Some(doc.completions.clone()),
        timers: Some(doc.timers.clone()),
        sort_orders: Some(doc.sort_orders.clone()),
        block_overrides: Some(doc.block_overrides.clone()),
        planned: Some(doc.planned.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weekplan_core::model::{BlockId, DisplayKind, Role};

    fn person(id: &str, role: Role) -> Person {
        Person {
            id: id.to_string(),
            name: id.to_string(),
            role,
            avatar: String::new(),
            pin: None,
        }
    }

    #[test]
    fn apply_replaces_only_named_collections() {
        let mut doc = HouseholdDocument {
            users: vec![person("u_papa", Role::Parent)],
            ..Default::default()
        };
        let patch = DocumentPatch::new().with_completions(vec![]);
        let changed = patch.apply_to(&mut doc);
        assert_eq!(changed, vec![Collection::Completions]);
        assert_eq!(doc.users.len(), 1);
    }

    #[test]
    fn merge_prefers_newer_collections_and_keeps_the_rest() {
        let mut pending = DocumentPatch::new()
            .with_completions(vec![])
            .with_users(vec![person("u_papa", Role::Parent)]);
        let newer = DocumentPatch::new().with_users(vec![
            person("u_papa", Role::Parent),
            person("u_lina", Role::Child),
        ]);
        pending.merge(newer);
        assert_eq!(pending.users.as_ref().unwrap().len(), 2);
        assert!(pending.completions.is_some());
    }

    #[test]
    fn to_fields_names_only_present_collections() {
        let patch = DocumentPatch::new().with_timers(vec![]);
        let fields = patch.to_fields().unwrap();
        assert_eq!(fields.len(), 1);
        assert!(fields.contains_key("timers"));
    }

    #[test]
    fn to_fields_strips_unset_optionals_inside_collections() {
        let task = Task {
            id: "t1".into(),
            assignee_id: "u_lina".into(),
            title: "Dinner".into(),
            display_kind: DisplayKind::Text,
            image_url: None,
            days: [6].into_iter().collect(),
            blocks: [BlockId::Post].into_iter().collect(),
            duration_minutes: 0,
            library_id: None,
            school_activity: false,
        };
        let fields = DocumentPatch::new().with_tasks(vec![task]).to_fields().unwrap();
        let serialized = serde_json::to_string(&fields["tasks"]).unwrap();
        assert!(!serialized.contains("imageUrl"));
        assert!(!serialized.contains("null"));
    }

    #[test]
    fn wire_field_names_are_camel_case() {
        let patch = DocumentPatch::new()
            .with_sort_orders(BTreeMap::new())
            .with_block_overrides(BlockOverrides::new());
        let fields = patch.to_fields().unwrap();
        assert!(fields.contains_key("sortOrders"));
        assert!(fields.contains_key("blockOverrides"));
    }
}
