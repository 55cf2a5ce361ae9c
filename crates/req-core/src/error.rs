use crate::{
    domain::{CommentId, ProjectId, RequirementId},
    storage::StoreError,
};

/// Errors returned by the requirement service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced document does not exist.
    #[error("{0} not found")]
    NotFound(Missing),

    /// The acting user lacks the required relationship to the project or
    /// requirement.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The operation would break the shape of the forest.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Recomputing derived paths failed after the primary write committed.
    ///
    /// The primary write stands. Derived fields stay stale until the next
    /// successful regeneration.
    #[error("path regeneration for project {project} failed: {source}")]
    RegenerationFailure {
        /// The project whose paths are stale.
        project: ProjectId,
        /// The underlying store failure.
        #[source]
        source: StoreError,
    },

    /// The store rejected a read or the primary write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The kind of document a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Missing {
    /// A requirement addressed directly.
    #[error("requirement {0}")]
    Requirement(RequirementId),
    /// A requirement named as the new parent.
    #[error("parent requirement {0}")]
    Parent(RequirementId),
    /// The owning project.
    #[error("project {0}")]
    Project(ProjectId),
    /// A comment.
    #[error("comment {0}")]
    Comment(CommentId),
}
