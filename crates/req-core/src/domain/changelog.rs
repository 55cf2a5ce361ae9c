//! Append-only audit trail for requirement nodes.
//!
//! Entries are produced here and appended by the mutation protocol. They are
//! never edited or removed; they disappear only together with their node.
//!
//! Entry timestamps are client wall-clock values. The store resolves
//! server-side timestamps only for top-level document fields, never for
//! elements inside an array.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{Requirement, RequirementId, UserId};

/// Document fields that never appear in a diff.
const BOOKKEEPING_FIELDS: &[&str] = &["updatedAt", "changeLog"];

/// What kind of mutation an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The node was created.
    Created,
    /// Content fields were edited.
    Updated,
    /// The node was re-parented or re-ordered.
    Moved,
}

/// The old and new value of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the mutation.
    pub old: Value,
    /// Value after the mutation.
    pub new: Value,
}

/// The payload of a changelog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Changes {
    /// Full snapshot of a newly created node.
    Snapshot {
        /// The node as it was first written.
        #[serde(rename = "newValue")]
        new_value: Value,
    },
    /// Per-field old/new pairs.
    Fields(BTreeMap<String, FieldChange>),
}

impl Changes {
    /// The per-field changes, or `None` for a creation snapshot.
    #[must_use]
    pub const fn fields(&self) -> Option<&BTreeMap<String, FieldChange>> {
        match self {
            Self::Fields(fields) => Some(fields),
            Self::Snapshot { .. } => None,
        }
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Client wall-clock time of the mutation.
    pub timestamp: DateTime<Utc>,
    /// The acting user.
    pub user_id: UserId,
    /// What changed.
    pub changes: Changes,
}

impl ChangeLogEntry {
    /// The entry recorded when a node is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be snapshotted as JSON.
    pub fn created(
        requirement: &Requirement,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: ChangeKind::Created,
            timestamp,
            user_id,
            changes: Changes::Snapshot {
                new_value: requirement.snapshot()?,
            },
        })
    }

    /// The entry recorded when a node is moved.
    ///
    /// All three structural fields are recorded, whether or not each one
    /// individually changed.
    #[must_use]
    pub fn moved(
        from: &Placement,
        to: &Placement,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut changes = BTreeMap::new();
        changes.insert(
            "parentId".to_string(),
            FieldChange {
                old: id_value(from.parent_id.as_ref()),
                new: id_value(to.parent_id.as_ref()),
            },
        );
        changes.insert(
            "level".to_string(),
            FieldChange {
                old: from.level.into(),
                new: to.level.into(),
            },
        );
        changes.insert(
            "order".to_string(),
            FieldChange {
                old: from.order.into(),
                new: to.order.into(),
            },
        );

        Self {
            kind: ChangeKind::Moved,
            timestamp,
            user_id,
            changes: Changes::Fields(changes),
        }
    }

    /// The entry recorded for a content update, or `None` if nothing changed.
    #[must_use]
    pub fn updated(
        changes: BTreeMap<String, FieldChange>,
        user_id: UserId,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        if changes.is_empty() {
            return None;
        }
        Some(Self {
            kind: ChangeKind::Updated,
            timestamp,
            user_id,
            changes: Changes::Fields(changes),
        })
    }
}

/// The structural position of a node, as recorded by a `moved` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Parent node, `None` for a root.
    pub parent_id: Option<RequirementId>,
    /// Depth from the root.
    pub level: u32,
    /// 1-based sibling position.
    pub order: u32,
}

impl From<&Requirement> for Placement {
    fn from(requirement: &Requirement) -> Self {
        Self {
            parent_id: requirement.parent_id.clone(),
            level: requirement.level,
            order: requirement.order,
        }
    }
}

fn id_value(id: Option<&RequirementId>) -> Value {
    id.map_or(Value::Null, |id| Value::from(id.as_str()))
}

/// Computes the field-level difference between a document and a set of
/// updates.
///
/// Only fields whose value actually differs are reported. Values are compared
/// as whole JSON values; nested structures are not diffed further. Bookkeeping
/// fields (`updatedAt`, `changeLog`) are ignored. A field absent from the
/// current document compares as `null`.
#[must_use]
pub fn diff(current: &Map<String, Value>, updates: &Map<String, Value>) -> BTreeMap<String, FieldChange> {
    updates
        .iter()
        .filter(|(field, _)| !BOOKKEEPING_FIELDS.contains(&field.as_str()))
        .filter_map(|(field, new)| {
            let old = current.get(field).cloned().unwrap_or(Value::Null);
            (old != *new).then(|| {
                (
                    field.clone(),
                    FieldChange {
                        old,
                        new: new.clone(),
                    },
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn diff_reports_only_changed_fields() {
        let current = object(json!({"title": "Old", "status": "draft", "description": "same"}));
        let updates = object(json!({"title": "New", "status": "review", "description": "same"}));

        let changes = diff(&current, &updates);

        assert_eq!(changes.len(), 2);
        assert_eq!(changes["title"].old, "Old");
        assert_eq!(changes["title"].new, "New");
        assert_eq!(changes["status"].old, "draft");
        assert_eq!(changes["status"].new, "review");
    }

    #[test]
    fn diff_ignores_bookkeeping_fields() {
        let current = object(json!({"updatedAt": "a", "changeLog": []}));
        let updates = object(json!({"updatedAt": "b", "changeLog": [1]}));
        assert!(diff(&current, &updates).is_empty());
    }

    #[test]
    fn diff_treats_missing_field_as_null() {
        let current = object(json!({}));
        let updates = object(json!({"sectionPrefix": null, "tags": ["a"]}));
        let changes = diff(&current, &updates);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["tags"].old, Value::Null);
    }

    #[test]
    fn empty_diff_produces_no_entry() {
        assert!(ChangeLogEntry::updated(BTreeMap::new(), "alice".into(), Utc::now()).is_none());
    }

    #[test]
    fn moved_entry_records_structural_fields() {
        let from = Placement {
            parent_id: Some("p".into()),
            level: 1,
            order: 1,
        };
        let to = Placement {
            parent_id: None,
            level: 0,
            order: 1,
        };
        let entry = ChangeLogEntry::moved(&from, &to, "alice".into(), Utc::now());
        let fields = entry.changes.fields().unwrap();
        assert_eq!(entry.kind, ChangeKind::Moved);
        assert_eq!(fields["parentId"].old, "p");
        assert_eq!(fields["parentId"].new, Value::Null);
        assert_eq!(fields["level"].old, 1);
        assert_eq!(fields["order"].new, 1);
    }

    #[test]
    fn entries_round_trip_through_json() {
        let entry = ChangeLogEntry {
            kind: ChangeKind::Created,
            timestamp: Utc::now(),
            user_id: "alice".into(),
            changes: Changes::Snapshot {
                new_value: json!({"title": "x"}),
            },
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "created");
        assert_eq!(value["changes"]["newValue"]["title"], "x");
        let back: ChangeLogEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);

        let updated = json!({
            "type": "updated",
            "timestamp": "2024-01-01T00:00:00Z",
            "userId": "bob",
            "changes": {"title": {"old": "a", "new": "b"}},
        });
        let parsed: ChangeLogEntry = serde_json::from_value(updated).unwrap();
        assert_eq!(parsed.kind, ChangeKind::Updated);
        assert_eq!(parsed.changes.fields().unwrap()["title"].new, "b");
    }
}
