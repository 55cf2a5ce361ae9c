//! Project metadata and identity, the two collaborators the service consults
//! besides the store.

use std::future::Future;

use crate::{
    domain::{Project, ProjectId, UserId},
    storage::{decode, Store, StoreError, PROJECTS},
};

/// Read access to project metadata.
pub trait ProjectSource: Send + Sync {
    /// Fetches a project, or `None` if it does not exist.
    fn project(
        &self,
        id: &ProjectId,
    ) -> impl Future<Output = Result<Option<Project>, StoreError>> + Send;
}

/// Reads projects from the `projects` collection of a [`Store`].
#[derive(Debug, Clone)]
pub struct StoredProjects<S> {
    store: S,
}

impl<S: Store> StoredProjects<S> {
    /// Reads projects through `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: Store> ProjectSource for StoredProjects<S> {
    async fn project(&self, id: &ProjectId) -> Result<Option<Project>, StoreError> {
        self.store
            .get(PROJECTS, id.as_str())
            .await?
            .map(decode)
            .transpose()
    }
}

/// Resolves the user on whose behalf operations run.
pub trait Identity: Send + Sync {
    /// The acting user, or `None` if nobody is signed in.
    fn current_user_id(&self) -> Option<UserId>;
}

/// An [`Identity`] fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<UserId>);

impl StaticIdentity {
    /// Acts as `user`.
    #[must_use]
    pub const fn user(user: UserId) -> Self {
        Self(Some(user))
    }

    /// Acts as nobody.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self(None)
    }
}

impl Identity for StaticIdentity {
    fn current_user_id(&self) -> Option<UserId> {
        self.0.clone()
    }
}
