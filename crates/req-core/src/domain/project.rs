use serde::{Deserialize, Serialize};

use crate::domain::{ProjectId, SectionPrefix, UserId};

/// Project metadata as far as the requirement tree is concerned.
///
/// Projects are owned elsewhere; only the prefix, the creator and the member
/// list are read here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project identifier.
    pub id: ProjectId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Prefix for root paths. Falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_prefix: Option<SectionPrefix>,
    /// The user who created the project.
    pub created_by: UserId,
    /// Users allowed to edit the project's requirements.
    #[serde(default)]
    pub members: Vec<UserId>,
}

impl Project {
    /// Whether `user` may edit this project's requirements.
    #[must_use]
    pub fn is_member(&self, user: &UserId) -> bool {
        self.created_by == *user || self.members.contains(user)
    }

    /// The prefix for root paths, falling back to `default`.
    #[must_use]
    pub fn prefix_or<'a>(&'a self, default: &'a SectionPrefix) -> &'a SectionPrefix {
        self.section_prefix.as_ref().unwrap_or(default)
    }
}
