//! Strip unset optional fields from outgoing documents.
//!
//! Optional model fields are `Option<T>` and serialize to JSON `null`; the
//! remote store rejects those, and the document schema stores no literal
//! nulls (an unset key is simply absent). Every outgoing field map passes
//! through here, so individual models need no per-field serializer tweaks.

use serde_json::Value;

use weekplan_remote::DocumentFields;

/// Deep-sanitize one value. Returns `None` when the value itself is the
/// unset marker, so callers drop the surrounding key or array slot.
///
/// Scalars pass through unchanged. Sequence elements that sanitize to unset
/// are removed (the sequence shrinks; no hole is left). Mapping entries whose
/// value sanitizes to unset lose their key entirely. Input is acyclic by
/// construction, so plain recursion terminates.
pub fn sanitize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(Value::Array(
            items.into_iter().filter_map(sanitize).collect(),
        )),
        Value::Object(entries) => Some(Value::Object(
            entries
                .into_iter()
                .filter_map(|(key, value)| sanitize(value).map(|value| (key, value)))
                .collect(),
        )),
        primitive => Some(primitive),
    }
}

/// Sanitize a top-level field map before a merge-write.
pub fn sanitize_fields(fields: DocumentFields) -> DocumentFields {
    fields
        .into_iter()
        .filter_map(|(field, value)| sanitize(value).map(|value| (field, value)))
        .collect()
}
