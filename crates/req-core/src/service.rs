//! The requirement service: tree mutations, regeneration and comments.
//!
//! Every structural mutation runs in two phases. The primary phase validates
//! and commits the direct change, together with its changelog entry, in one
//! atomic batch; if it fails, nothing is written and the error is returned.
//! The regeneration phase then reloads the whole project, recomputes derived
//! paths and writes back whatever changed. A failing regeneration phase does
//! not undo the primary write: the call still succeeds, and the failure is
//! reported in [`Mutation::regeneration`] so the caller can retry with
//! [`RequirementService::regenerate`].

use tracing::{debug, error};

use crate::{
    domain::{
        generate_paths, place, Project, ProjectId, Requirement, RequirementId, SectionPrefix,
    },
    error::{Error, Missing},
    storage::{decode, encode, Batch, Fields, Identity, ProjectSource, Query, Store, StoreError, REQUIREMENTS},
};

mod access;
mod comments;
mod tree;

#[cfg(test)]
mod fixture;

pub use comments::CommentSubscription;

/// Hierarchical requirement management over a [`Store`].
#[derive(Debug, Clone)]
pub struct RequirementService<S, P, I> {
    store: S,
    projects: P,
    identity: I,
    default_prefix: SectionPrefix,
}

/// Outcome of the best-effort regeneration phase.
#[derive(Debug)]
pub enum Regeneration {
    /// The mutation did not change the shape of the forest.
    Skipped,
    /// Derived fields were recomputed; `updated` nodes were rewritten.
    Completed {
        /// Number of nodes whose derived fields changed.
        updated: usize,
    },
    /// The primary write committed but derived fields are stale.
    Failed(Error),
}

impl Regeneration {
    /// Whether the regeneration phase failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Result of a two-phase mutation.
#[derive(Debug)]
#[must_use]
pub struct Mutation<T> {
    /// What the primary phase produced.
    pub value: T,
    /// What happened in the regeneration phase.
    pub regeneration: Regeneration,
}

impl<T> Mutation<T> {
    const fn skipped(value: T) -> Self {
        Self {
            value,
            regeneration: Regeneration::Skipped,
        }
    }

    /// Discards the regeneration outcome.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Where to move a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    /// The node to move.
    pub requirement_id: RequirementId,
    /// The new parent, or `None` to make the node a root.
    pub new_parent_id: Option<RequirementId>,
    /// The 1-based position the node should take among its new siblings.
    pub new_order: u32,
}

impl<S, P, I> RequirementService<S, P, I>
where
    S: Store,
    P: ProjectSource,
    I: Identity,
{
    /// Creates a service.
    ///
    /// `default_prefix` is used for root paths of projects that do not set
    /// their own section prefix.
    pub const fn new(store: S, projects: P, identity: I, default_prefix: SectionPrefix) -> Self {
        Self {
            store,
            projects,
            identity,
            default_prefix,
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    async fn find(&self, id: &RequirementId) -> Result<Option<Requirement>, StoreError> {
        self.store
            .get(REQUIREMENTS, id.as_str())
            .await?
            .map(decode)
            .transpose()
    }

    async fn require(&self, id: &RequirementId) -> Result<Requirement, Error> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(Missing::Requirement(id.clone())))
    }

    async fn project_nodes(&self, project: &ProjectId) -> Result<Vec<Requirement>, StoreError> {
        self.store
            .query(REQUIREMENTS, &Query::new().eq("projectId", project.as_str()))
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Recomputes and persists derived fields for every node of `project`.
    ///
    /// With a `placement`, that node first claims the given position among
    /// its siblings.
    async fn regenerate_project(
        &self,
        project: &Project,
        placement: Option<(&RequirementId, u32)>,
    ) -> Result<usize, StoreError> {
        let stored = self.project_nodes(&project.id).await?;

        let mut working = stored.clone();
        if let Some((id, position)) = placement {
            place(&mut working, id, position);
        }
        let regenerated = generate_paths(working, project.prefix_or(&self.default_prefix));

        let mut batch = Batch::new();
        for (before, after) in stored.iter().zip(&regenerated) {
            if before.order == after.order
                && before.level == after.level
                && before.hierarchical_path == after.hierarchical_path
            {
                continue;
            }
            batch.update(
                REQUIREMENTS,
                after.id.as_str(),
                Fields::new()
                    .value("order", after.order)
                    .value("level", after.level)
                    .value("hierarchicalPath", encode(&after.hierarchical_path)?),
            );
        }

        let updated = batch.len();
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        Ok(updated)
    }

    /// Runs the regeneration phase, absorbing its failure.
    async fn regeneration_phase(
        &self,
        project: &Project,
        placement: Option<(&RequirementId, u32)>,
    ) -> Regeneration {
        match self.regenerate_project(project, placement).await {
            Ok(updated) => {
                debug!(project = %project.id, updated, "regenerated hierarchical paths");
                Regeneration::Completed { updated }
            }
            Err(source) => {
                let failure = Error::RegenerationFailure {
                    project: project.id.clone(),
                    source,
                };
                error!(
                    error = %failure,
                    "primary write committed, hierarchical paths are stale until the next regeneration"
                );
                Regeneration::Failed(failure)
            }
        }
    }
}
