use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{
    changelog::ChangeLogEntry, HierarchicalPath, ProjectId, RequirementId, SectionPrefix, UserId,
};

/// The status assigned to a requirement when the draft does not name one.
pub const DEFAULT_STATUS: &str = "draft";

/// A node in a project's requirement forest.
///
/// The structural fields `level`, `order` and `hierarchical_path` are derived:
/// whatever a mutation writes to them is provisional until the next
/// regeneration pass over the project rewrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    /// Store-assigned identifier.
    pub id: RequirementId,
    /// Short title.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// The project whose forest this node belongs to.
    pub project_id: ProjectId,
    /// The parent node, or `None` for a root.
    #[serde(default)]
    pub parent_id: Option<RequirementId>,
    /// Depth from the root (roots are level 0).
    #[serde(default)]
    pub level: u32,
    /// 1-based position among siblings. `0` means "not yet positioned".
    #[serde(default)]
    pub order: u32,
    /// Derived positional identifier, e.g. `REQ_2.1.3`.
    #[serde(default)]
    pub hierarchical_path: Option<HierarchicalPath>,
    /// Status within the project's status taxonomy.
    #[serde(default = "default_status")]
    pub status: String,
    /// Ordered, duplicate-free tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Prefix override, honoured when this node is a root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_prefix: Option<SectionPrefix>,
    /// When the node was created.
    pub created_at: DateTime<Utc>,
    /// When the node was last modified.
    pub updated_at: DateTime<Utc>,
    /// The user who created the node.
    pub created_by: UserId,
    /// Append-only audit trail.
    #[serde(default)]
    pub change_log: Vec<ChangeLogEntry>,
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

impl Requirement {
    /// Whether this node is declared as a root.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// The hierarchical path as display text, or the id if the node has never
    /// been positioned.
    #[must_use]
    pub fn label(&self) -> String {
        self.hierarchical_path
            .as_ref()
            .map_or_else(|| self.id.to_string(), ToString::to_string)
    }

    /// A JSON snapshot of the node without its changelog.
    ///
    /// Used as the payload of a `created` changelog entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be represented as JSON.
    pub fn snapshot(&self) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut value {
            fields.remove("changeLog");
        }
        Ok(value)
    }
}

/// The caller-supplied part of a new requirement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequirementDraft {
    /// The owning project. Required.
    pub project_id: ProjectId,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Parent node; `None` creates a root.
    pub parent_id: Option<RequirementId>,
    /// Initial status; defaults to [`DEFAULT_STATUS`].
    pub status: Option<String>,
    /// Initial tags.
    pub tags: Vec<String>,
    /// Prefix override for a root node.
    pub section_prefix: Option<SectionPrefix>,
}

impl RequirementDraft {
    /// Starts a draft for a root node in the given project.
    #[must_use]
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            ..Self::default()
        }
    }

    /// Places the new node under `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: RequirementId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Field-level content updates for an existing requirement.
///
/// `None` leaves a field untouched. Structural fields are not updatable here;
/// they change only by moving the node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequirementUpdate {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New status.
    pub status: Option<String>,
    /// Replacement tag list.
    pub tags: Option<Vec<String>>,
    /// Set (`Some(Some(_))`) or clear (`Some(None)`) the prefix override.
    pub section_prefix: Option<Option<SectionPrefix>>,
}

impl RequirementUpdate {
    /// Returns `true` if no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.tags.is_none()
            && self.section_prefix.is_none()
    }

    /// The update as a map of document field names to new values.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(title) = &self.title {
            fields.insert("title".into(), Value::from(title.as_str()));
        }
        if let Some(description) = &self.description {
            fields.insert("description".into(), Value::from(description.as_str()));
        }
        if let Some(status) = &self.status {
            fields.insert("status".into(), Value::from(status.as_str()));
        }
        if let Some(tags) = &self.tags {
            fields.insert("tags".into(), Value::from(dedup_tags(tags.clone())));
        }
        if let Some(prefix) = &self.section_prefix {
            fields.insert(
                "sectionPrefix".into(),
                prefix
                    .as_ref()
                    .map_or(Value::Null, |p| Value::from(p.as_str())),
            );
        }
        fields
    }
}

/// Removes repeated tags, keeping the first occurrence of each.
#[must_use]
pub fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
