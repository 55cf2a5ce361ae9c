//! Hierarchical requirement trees.
//!
//! Requirements form one forest per project. Each node carries a derived,
//! human-readable [`HierarchicalPath`] (such as `REQ_2.1.3`) that is
//! recomputed for the whole project whenever the shape of the forest changes.
//! Every mutation appends to the node's changelog, and nodes carry threaded
//! comments with a live update feed.
//!
//! The [`RequirementService`] is the entry point. It reaches persisted data
//! only through the [`Store`](storage::Store) trait.

pub mod domain;
pub use domain::{
    ChangeKind, ChangeLogEntry, Comment, CommentDraft, CommentId, Config, HierarchicalPath,
    Project, ProjectId, Requirement, RequirementDraft, RequirementId, RequirementUpdate,
    SectionPrefix, UserId,
};

mod error;
pub use error::{Error, Missing};

/// Document storage, project metadata and identity.
pub mod storage;
pub use storage::{MemoryStore, StaticIdentity, StoredProjects};

mod service;
pub use service::{CommentSubscription, MoveRequest, Mutation, Regeneration, RequirementService};
