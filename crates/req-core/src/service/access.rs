use crate::{
    domain::{Project, ProjectId, Requirement, UserId},
    error::{Error, Missing},
    service::RequirementService,
    storage::{Identity, ProjectSource, Store},
};

/// A user cleared to mutate one project's requirements.
pub(super) struct Actor {
    pub(super) user: UserId,
    pub(super) project: Project,
}

impl Actor {
    /// Deleting a node is reserved to its author and the project's creator.
    pub(super) fn ensure_can_delete(&self, requirement: &Requirement) -> Result<(), Error> {
        if requirement.created_by == self.user || self.project.created_by == self.user {
            return Ok(());
        }
        Err(Error::Unauthorized(format!(
            "user {} may not delete requirement {}",
            self.user, requirement.id
        )))
    }
}

impl<S, P, I> RequirementService<S, P, I>
where
    S: Store,
    P: ProjectSource,
    I: Identity,
{
    /// Resolves the acting user and checks membership of `project_id`.
    pub(super) async fn authorize(&self, project_id: &ProjectId) -> Result<Actor, Error> {
        let user = self
            .identity
            .current_user_id()
            .ok_or_else(|| Error::Unauthorized("no user is signed in".to_string()))?;

        let project = self
            .projects
            .project(project_id)
            .await?
            .ok_or_else(|| Error::NotFound(Missing::Project(project_id.clone())))?;

        if !project.is_member(&user) {
            return Err(Error::Unauthorized(format!(
                "user {user} is not a member of project {project_id}"
            )));
        }

        Ok(Actor { user, project })
    }
}
