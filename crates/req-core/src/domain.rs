//! Domain models for hierarchical requirements.
//!
//! This module contains the document types (requirements, comments,
//! projects), the derived hierarchical path, the changelog, and the pure path
//! regeneration over a project's forest.

/// Requirement nodes and the payloads that create or edit them.
pub mod requirement;
pub use requirement::{Requirement, RequirementDraft, RequirementUpdate, DEFAULT_STATUS};

/// Hierarchical paths and section prefixes.
pub mod path;
pub use path::{HierarchicalPath, InvalidPrefixError, PathParseError, SectionPrefix};

mod ids;
pub use ids::{generate as generate_id, CommentId, ProjectId, RequirementId, UserId};

pub mod changelog;
pub use changelog::{ChangeKind, ChangeLogEntry, Changes, FieldChange};

mod comment;
pub use comment::{Comment, CommentDraft};

mod project;
pub use project::Project;

mod config;
pub use config::{Config, ConfigError};

pub mod forest;
pub use forest::{generate_paths, place};
