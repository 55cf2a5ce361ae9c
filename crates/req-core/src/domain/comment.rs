use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CommentId, RequirementId, UserId};

/// A discussion entry attached to a requirement.
///
/// Threading is a flat reference to another comment; no cycle or depth checks
/// are performed on `parent_comment_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Store-assigned identifier.
    pub id: CommentId,
    /// The owning requirement.
    pub requirement_id: RequirementId,
    /// The comment this one replies to, if any.
    #[serde(default)]
    pub parent_comment_id: Option<CommentId>,
    /// Comment text.
    pub body: String,
    /// Whether the thread has been marked resolved.
    #[serde(default)]
    pub resolved: bool,
    /// The user who wrote the comment.
    pub author_id: UserId,
    /// When the comment was created.
    pub created_at: DateTime<Utc>,
    /// When the comment was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// Whether this comment starts a thread.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_comment_id.is_none()
    }
}

/// The caller-supplied part of a new comment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentDraft {
    /// Comment text.
    pub body: String,
    /// The comment being replied to.
    pub parent_comment_id: Option<CommentId>,
}

impl CommentDraft {
    /// A top-level comment.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            parent_comment_id: None,
        }
    }
}
