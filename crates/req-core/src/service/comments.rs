use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::{
    domain::{Comment, CommentDraft, CommentId, RequirementId},
    error::{Error, Missing},
    service::RequirementService,
    storage::{decode, encode, Batch, Fields, Identity, ProjectSource, Query, Store, COMMENTS},
};

/// A live comment feed started by
/// [`RequirementService::subscribe_to_comments`].
///
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct CommentSubscription {
    /// Held by the feed task for the whole of each delivery.
    cancelled: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

impl CommentSubscription {
    /// Stops delivery.
    ///
    /// Waits for a callback that is already running to return. No callback
    /// starts after this returns, including one whose result set was already
    /// in flight.
    ///
    /// Must not be called from inside the callback, which would deadlock.
    pub fn unsubscribe(&self) {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.task.abort();
    }

    /// Whether the feed has been stopped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CommentSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn by_requirement(requirement_id: &RequirementId) -> Query {
    Query::new()
        .eq("requirementId", requirement_id.as_str())
        .order_by("createdAt")
}

impl<S, P, I> RequirementService<S, P, I>
where
    S: Store,
    P: ProjectSource,
    I: Identity,
{
    /// Adds a comment to a requirement and returns its id.
    ///
    /// A `parent_comment_id` in the draft makes the comment a reply; it is
    /// stored as given and not checked.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the requirement or its project does not exist.
    /// - [`Error::Unauthorized`] if the actor is not a project member.
    /// - [`Error::Store`] if the write fails.
    #[instrument(skip(self, draft))]
    pub async fn add_comment(
        &self,
        requirement_id: &RequirementId,
        draft: CommentDraft,
    ) -> Result<CommentId, Error> {
        let requirement = self.require(requirement_id).await?;
        let actor = self.authorize(&requirement.project_id).await?;

        let id = CommentId::new(self.store.allocate_id(COMMENTS));
        let now = Utc::now();
        let comment = Comment {
            id: id.clone(),
            requirement_id: requirement_id.clone(),
            parent_comment_id: draft.parent_comment_id,
            body: draft.body,
            resolved: false,
            author_id: actor.user,
            created_at: now,
            updated_at: now,
        };

        let mut batch = Batch::new();
        batch.set(COMMENTS, id.as_str(), encode(&comment)?).update(
            COMMENTS,
            id.as_str(),
            Fields::new()
                .server_timestamp("createdAt")
                .server_timestamp("updatedAt"),
        );
        self.store.commit(batch).await?;
        debug!(%id, "added comment");

        Ok(id)
    }

    /// Replies to an existing comment.
    ///
    /// # Errors
    ///
    /// As for [`RequirementService::add_comment`].
    pub async fn reply_to_comment(
        &self,
        requirement_id: &RequirementId,
        parent_comment_id: &CommentId,
        mut draft: CommentDraft,
    ) -> Result<CommentId, Error> {
        draft.parent_comment_id = Some(parent_comment_id.clone());
        self.add_comment(requirement_id, draft).await
    }

    /// Marks a comment resolved or unresolved.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the comment does not exist or belongs to
    ///   another requirement, or if the requirement or its project does not
    ///   exist.
    /// - [`Error::Unauthorized`] if the actor is not a project member.
    /// - [`Error::Store`] if the write fails.
    #[instrument(skip(self))]
    pub async fn resolve_comment(
        &self,
        requirement_id: &RequirementId,
        comment_id: &CommentId,
        resolved: bool,
    ) -> Result<(), Error> {
        let comment: Option<Comment> = self
            .store
            .get(COMMENTS, comment_id.as_str())
            .await?
            .map(decode)
            .transpose()?;
        if comment.is_none_or(|comment| comment.requirement_id != *requirement_id) {
            return Err(Error::NotFound(Missing::Comment(comment_id.clone())));
        }

        let requirement = self.require(requirement_id).await?;
        self.authorize(&requirement.project_id).await?;

        let mut batch = Batch::new();
        batch.update(
            COMMENTS,
            comment_id.as_str(),
            Fields::new()
                .value("resolved", resolved)
                .server_timestamp("updatedAt"),
        );
        self.store.commit(batch).await?;
        debug!(resolved, "resolved comment");
        Ok(())
    }

    /// All comments on a requirement, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the read fails.
    pub async fn get_comments(&self, requirement_id: &RequirementId) -> Result<Vec<Comment>, Error> {
        Ok(self
            .store
            .query(COMMENTS, &by_requirement(requirement_id))
            .await?
            .into_iter()
            .map(decode)
            .collect::<Result<_, _>>()?)
    }

    /// Calls `on_change` with the full, oldest-first comment list now and
    /// after every change to it, until the returned handle is unsubscribed
    /// or dropped.
    ///
    /// Callbacks run on a spawned task, so this must be called within a
    /// tokio runtime. `on_change` must not unsubscribe its own feed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the feed cannot be opened.
    pub async fn subscribe_to_comments<F>(
        &self,
        requirement_id: &RequirementId,
        mut on_change: F,
    ) -> Result<CommentSubscription, Error>
    where
        F: FnMut(Vec<Comment>) + Send + 'static,
    {
        let mut feed = self
            .store
            .subscribe(COMMENTS, by_requirement(requirement_id))
            .await?;

        let cancelled = Arc::new(Mutex::new(false));
        let gate = Arc::clone(&cancelled);
        let requirement_id = requirement_id.clone();
        let task = tokio::spawn(async move {
            while let Some(documents) = feed.next().await {
                let comments = match documents
                    .into_iter()
                    .map(decode)
                    .collect::<Result<Vec<Comment>, _>>()
                {
                    Ok(comments) => comments,
                    Err(e) => {
                        warn!(requirement = %requirement_id, error = %e, "skipping malformed comment set");
                        continue;
                    }
                };
                {
                    let cancelled = gate.lock().unwrap_or_else(PoisonError::into_inner);
                    if *cancelled {
                        break;
                    }
                    on_change(comments);
                }
            }
            feed.cancel();
        });

        Ok(CommentSubscription { cancelled, task })
    }
}
