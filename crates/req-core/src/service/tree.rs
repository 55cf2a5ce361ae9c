use std::num::NonZeroUsize;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument};

use crate::{
    domain::{
        changelog::{self, Placement},
        forest, requirement::dedup_tags, ChangeLogEntry, Comment, HierarchicalPath, ProjectId,
        Requirement, RequirementDraft, RequirementId, RequirementUpdate, DEFAULT_STATUS,
    },
    error::{Error, Missing},
    service::{MoveRequest, Mutation, Regeneration, RequirementService},
    storage::{
        decode, encode, Batch, Fields, Identity, ProjectSource, Query, Store, StoreError,
        COMMENTS, REQUIREMENTS,
    },
};

fn id_value(id: Option<&RequirementId>) -> Value {
    id.map_or(Value::Null, |id| Value::from(id.as_str()))
}

fn position(order: u32) -> NonZeroUsize {
    NonZeroUsize::MIN.saturating_add(usize::try_from(order.saturating_sub(1)).unwrap_or(usize::MAX))
}

impl<S, P, I> RequirementService<S, P, I>
where
    S: Store,
    P: ProjectSource,
    I: Identity,
{
    /// Creates a requirement and returns its id.
    ///
    /// The node is appended after its existing siblings; its derived fields
    /// are provisional until the regeneration phase rewrites them.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`] if the actor is not a project member.
    /// - [`Error::NotFound`] if the project or the parent does not exist.
    /// - [`Error::InvalidOperation`] if the parent belongs to another project.
    /// - [`Error::Store`] if the primary write fails.
    #[instrument(skip(self, draft), fields(project = %draft.project_id))]
    pub async fn create(&self, draft: RequirementDraft) -> Result<Mutation<RequirementId>, Error> {
        let actor = self.authorize(&draft.project_id).await?;

        let parent = match &draft.parent_id {
            Some(parent_id) => {
                let parent = self
                    .find(parent_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(Missing::Parent(parent_id.clone())))?;
                if parent.project_id != draft.project_id {
                    return Err(Error::InvalidOperation(format!(
                        "parent {} belongs to project {}",
                        parent.id, parent.project_id
                    )));
                }
                Some(parent)
            }
            None => None,
        };

        let siblings = self
            .store
            .query(
                REQUIREMENTS,
                &Query::new()
                    .eq("projectId", draft.project_id.as_str())
                    .eq("parentId", id_value(draft.parent_id.as_ref())),
            )
            .await?;
        let order = u32::try_from(siblings.len() + 1).unwrap_or(u32::MAX);

        let (level, path) = match &parent {
            Some(parent) => (
                parent.level + 1,
                parent
                    .hierarchical_path
                    .as_ref()
                    .map(|path| path.child(position(order))),
            ),
            None => {
                let prefix = draft
                    .section_prefix
                    .clone()
                    .unwrap_or_else(|| actor.project.prefix_or(&self.default_prefix).clone());
                (0, Some(HierarchicalPath::root(prefix, position(order))))
            }
        };

        let id = RequirementId::new(self.store.allocate_id(REQUIREMENTS));
        let now = Utc::now();
        let mut requirement = Requirement {
            id: id.clone(),
            title: draft.title,
            description: draft.description,
            project_id: draft.project_id,
            parent_id: draft.parent_id,
            level,
            order,
            hierarchical_path: path,
            status: draft.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            tags: dedup_tags(draft.tags),
            section_prefix: draft.section_prefix,
            created_at: now,
            updated_at: now,
            created_by: actor.user.clone(),
            change_log: Vec::new(),
        };
        let entry = ChangeLogEntry::created(&requirement, actor.user.clone(), now)
            .map_err(StoreError::from)?;
        requirement.change_log.push(entry);

        let mut batch = Batch::new();
        batch
            .set(REQUIREMENTS, id.as_str(), encode(&requirement)?)
            .update(
                REQUIREMENTS,
                id.as_str(),
                Fields::new()
                    .server_timestamp("createdAt")
                    .server_timestamp("updatedAt"),
            );
        self.store.commit(batch).await?;
        info!(%id, path = %requirement.label(), "created requirement");

        let regeneration = self.regeneration_phase(&actor.project, None).await;
        Ok(Mutation {
            value: id,
            regeneration,
        })
    }

    /// Edits content fields of a requirement.
    ///
    /// Only fields whose value actually changes are written, together with
    /// one `updated` changelog entry. Returns `false`, writing nothing, when
    /// no field changes. Changing the section prefix regenerates paths.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the requirement or its project does not exist.
    /// - [`Error::Unauthorized`] if the actor is not a project member.
    /// - [`Error::Store`] if the write fails.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: &RequirementId,
        update: RequirementUpdate,
    ) -> Result<Mutation<bool>, Error> {
        let document = self
            .store
            .get(REQUIREMENTS, id.as_str())
            .await?
            .ok_or_else(|| Error::NotFound(Missing::Requirement(id.clone())))?;
        let requirement: Requirement = decode(document.clone())?;
        let actor = self.authorize(&requirement.project_id).await?;

        let current = document.as_object().cloned().unwrap_or_default();
        let changes = changelog::diff(&current, &update.to_fields());
        let reshapes = changes.contains_key("sectionPrefix");

        let mut fields: Fields = changes
            .iter()
            .map(|(field, change)| (field.clone(), change.new.clone()))
            .collect();
        let Some(entry) = ChangeLogEntry::updated(changes, actor.user, Utc::now()) else {
            return Ok(Mutation::skipped(false));
        };
        fields = fields
            .server_timestamp("updatedAt")
            .append("changeLog", encode(&entry)?);

        let mut batch = Batch::new();
        batch.update(REQUIREMENTS, id.as_str(), fields);
        self.store.commit(batch).await?;
        info!(%id, "updated requirement");

        let regeneration = if reshapes {
            self.regeneration_phase(&actor.project, None).await
        } else {
            Regeneration::Skipped
        };
        Ok(Mutation {
            value: true,
            regeneration,
        })
    }

    /// Re-parents and/or re-orders a requirement.
    ///
    /// Returns `false`, writing nothing, if neither the parent nor the order
    /// changes. Otherwise the node claims `new_order` among its new siblings,
    /// which shift to make room.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOperation`] if `new_order` is 0, the new parent is
    ///   in another project, or the new parent is the node itself or one of
    ///   its descendants.
    /// - [`Error::NotFound`] if the node, its project or the new parent does
    ///   not exist.
    /// - [`Error::Unauthorized`] if the actor is not a project member.
    /// - [`Error::Store`] if the primary write fails.
    #[instrument(skip(self), fields(id = %request.requirement_id))]
    pub async fn move_requirement(&self, request: MoveRequest) -> Result<Mutation<bool>, Error> {
        if request.new_order == 0 {
            return Err(Error::InvalidOperation(
                "order is 1-based and must be at least 1".to_string(),
            ));
        }

        let node = self.require(&request.requirement_id).await?;
        let actor = self.authorize(&node.project_id).await?;

        let new_parent = match &request.new_parent_id {
            Some(parent_id) => Some(
                self.find(parent_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(Missing::Parent(parent_id.clone())))?,
            ),
            None => None,
        };

        if let Some(parent) = &new_parent {
            if parent.project_id != node.project_id {
                return Err(Error::InvalidOperation(format!(
                    "cannot move {} into project {}",
                    node.id, parent.project_id
                )));
            }
            if self.is_descendant(&node.id, &parent.id).await? {
                return Err(Error::InvalidOperation(format!(
                    "cannot move {} under its own descendant {}",
                    node.label(),
                    parent.label()
                )));
            }
        }

        if node.parent_id == request.new_parent_id && node.order == request.new_order {
            return Ok(Mutation::skipped(false));
        }

        let from = Placement::from(&node);
        let to = Placement {
            parent_id: request.new_parent_id.clone(),
            level: new_parent.as_ref().map_or(0, |parent| parent.level + 1),
            order: request.new_order,
        };
        let entry = ChangeLogEntry::moved(&from, &to, actor.user.clone(), Utc::now());

        let mut batch = Batch::new();
        batch.update(
            REQUIREMENTS,
            node.id.as_str(),
            Fields::new()
                .value("parentId", id_value(to.parent_id.as_ref()))
                .value("level", to.level)
                .value("order", to.order)
                .server_timestamp("updatedAt")
                .append("changeLog", encode(&entry)?),
        );
        self.store.commit(batch).await?;
        info!(
            from = ?from.parent_id,
            to = ?to.parent_id,
            order = to.order,
            "moved requirement"
        );

        let regeneration = self
            .regeneration_phase(&actor.project, Some((&node.id, request.new_order)))
            .await;
        Ok(Mutation {
            value: true,
            regeneration,
        })
    }

    /// Deletes a leaf requirement together with its comments.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the requirement or its project does not exist.
    /// - [`Error::Unauthorized`] if the actor is neither the requirement's
    ///   author nor the project's creator.
    /// - [`Error::InvalidOperation`] if the requirement has children.
    /// - [`Error::Store`] if the primary write fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &RequirementId) -> Result<Mutation<()>, Error> {
        let node = self.require(id).await?;
        let actor = self.authorize(&node.project_id).await?;
        actor.ensure_can_delete(&node)?;

        let children = self
            .store
            .query(REQUIREMENTS, &Query::new().eq("parentId", id.as_str()))
            .await?;
        if !children.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "requirement {} has {} children; delete or move them first",
                node.label(),
                children.len()
            )));
        }

        let comments: Vec<Comment> = self
            .store
            .query(COMMENTS, &Query::new().eq("requirementId", id.as_str()))
            .await?
            .into_iter()
            .map(decode)
            .collect::<Result<_, _>>()?;

        let mut batch = Batch::new();
        for comment in &comments {
            batch.delete(COMMENTS, comment.id.as_str());
        }
        batch.delete(REQUIREMENTS, id.as_str());
        self.store.commit(batch).await?;
        info!(path = %node.label(), comments = comments.len(), "deleted requirement");

        let regeneration = self.regeneration_phase(&actor.project, None).await;
        Ok(Mutation {
            value: (),
            regeneration,
        })
    }

    /// Recomputes derived fields for every node of a project.
    ///
    /// This is the repair pass for a failed regeneration phase. Returns how
    /// many nodes were rewritten.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the project does not exist.
    /// - [`Error::Unauthorized`] if the actor is not a project member.
    /// - [`Error::RegenerationFailure`] if reading or writing the nodes fails.
    #[instrument(skip(self))]
    pub async fn regenerate(&self, project_id: &ProjectId) -> Result<usize, Error> {
        let actor = self.authorize(project_id).await?;
        let updated = self
            .regenerate_project(&actor.project, None)
            .await
            .map_err(|source| Error::RegenerationFailure {
                project: project_id.clone(),
                source,
            })?;
        info!(updated, "regenerated project");
        Ok(updated)
    }

    /// Fetches one requirement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if it does not exist.
    pub async fn get(&self, id: &RequirementId) -> Result<Requirement, Error> {
        self.require(id).await
    }

    /// Every requirement of a project, in hierarchical path order.
    ///
    /// Positions compare numerically, so `REQ_2` precedes `REQ_10`. Nodes
    /// without a path come first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the read fails.
    pub async fn list(&self, project_id: &ProjectId) -> Result<Vec<Requirement>, Error> {
        let mut nodes = self.project_nodes(project_id).await?;
        nodes.sort_by(|a, b| a.hierarchical_path.cmp(&b.hierarchical_path));
        Ok(nodes)
    }

    /// Whether `target` is `source` or lies underneath it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOperation`] if the parent chain above `target` loops.
    /// - [`Error::Store`] if the read fails.
    pub async fn is_descendant(
        &self,
        source: &RequirementId,
        target: &RequirementId,
    ) -> Result<bool, Error> {
        if source == target {
            return Ok(true);
        }
        let Some(node) = self.find(target).await? else {
            return Ok(false);
        };
        let nodes = self.project_nodes(&node.project_id).await?;
        forest::is_descendant(&nodes, source, target)
            .map_err(|corrupt| Error::InvalidOperation(corrupt.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::{ChangeKind, CommentDraft, SectionPrefix},
        error::{Error, Missing},
        service::fixture::{create, label, service, service_as, store, PROJECT},
        storage::{Query, Store, REQUIREMENTS},
    };

    use super::*;

    fn to(id: &RequirementId, parent: Option<&RequirementId>, order: u32) -> MoveRequest {
        MoveRequest {
            requirement_id: id.clone(),
            new_parent_id: parent.cloned(),
            new_order: order,
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_paths() {
        let (_, service) = service().await;
        let r1 = create(&service, "R1", None).await;
        let r2 = create(&service, "R2", None).await;
        let c1 = create(&service, "C1", Some(&r1)).await;
        let c2 = create(&service, "C2", Some(&r1)).await;

        assert_eq!(label(&service, &r1).await, "REQ_1");
        assert_eq!(label(&service, &r2).await, "REQ_2");
        assert_eq!(label(&service, &c1).await, "REQ_1.1");
        assert_eq!(label(&service, &c2).await, "REQ_1.2");

        let c2 = service.get(&c2).await.unwrap();
        assert_eq!(c2.level, 1);
        assert_eq!(c2.order, 2);
        assert_eq!(c2.created_by.as_str(), "alice");
        assert_eq!(c2.status, DEFAULT_STATUS);
    }

    #[tokio::test]
    async fn create_records_snapshot_and_resolves_timestamps() {
        let (store, service) = service().await;
        let id = create(&service, "R1", None).await;

        let requirement = service.get(&id).await.unwrap();
        assert_eq!(requirement.change_log.len(), 1);
        let entry = &requirement.change_log[0];
        assert_eq!(entry.kind, ChangeKind::Created);
        let crate::domain::Changes::Snapshot { new_value } = &entry.changes else {
            panic!("expected a snapshot");
        };
        assert_eq!(new_value["title"], "R1");
        assert!(new_value.get("changeLog").is_none());

        let raw = store.get(REQUIREMENTS, id.as_str()).await.unwrap().unwrap();
        assert!(raw["createdAt"].is_string());
        assert_eq!(raw["parentId"], Value::Null);
    }

    #[tokio::test]
    async fn create_uses_project_and_node_prefixes() {
        let store = store().await;
        let carol = service_as(&store, Some("carol"));

        let plain = carol
            .create(RequirementDraft::new("p2".into(), "A"))
            .await
            .unwrap()
            .into_value();
        let mut draft = RequirementDraft::new("p2".into(), "B");
        draft.section_prefix = Some("USR".parse::<SectionPrefix>().unwrap());
        let custom = carol.create(draft).await.unwrap().into_value();
        let child = carol
            .create(RequirementDraft::new("p2".into(), "C").with_parent(custom.clone()))
            .await
            .unwrap()
            .into_value();

        assert_eq!(label(&carol, &plain).await, "SYS_1");
        assert_eq!(label(&carol, &custom).await, "USR_2");
        assert_eq!(label(&carol, &child).await, "USR_2.1");
    }

    #[tokio::test]
    async fn create_rejects_missing_parent_and_outsiders() {
        let (store, service) = service().await;
        let draft = RequirementDraft::new(PROJECT.into(), "x").with_parent("nope".into());
        assert!(matches!(
            service.create(draft).await,
            Err(Error::NotFound(Missing::Parent(_)))
        ));

        let outsider = service_as(&store, Some("mallory"));
        assert!(matches!(
            outsider
                .create(RequirementDraft::new(PROJECT.into(), "x"))
                .await,
            Err(Error::Unauthorized(_))
        ));

        let anonymous = service_as(&store, None);
        assert!(matches!(
            anonymous
                .create(RequirementDraft::new(PROJECT.into(), "x"))
                .await,
            Err(Error::Unauthorized(_))
        ));

        assert!(matches!(
            service
                .create(RequirementDraft::new("p9".into(), "x"))
                .await,
            Err(Error::NotFound(Missing::Project(_)))
        ));
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn move_to_root_claims_requested_position() {
        let (_, service) = service().await;
        let r1 = create(&service, "R1", None).await;
        let r2 = create(&service, "R2", None).await;
        let c1 = create(&service, "C1", Some(&r1)).await;

        let outcome = service.move_requirement(to(&c1, None, 1)).await.unwrap();
        assert!(outcome.value);
        assert!(matches!(outcome.regeneration, Regeneration::Completed { .. }));

        assert_eq!(label(&service, &c1).await, "REQ_1");
        assert_eq!(label(&service, &r1).await, "REQ_2");
        assert_eq!(label(&service, &r2).await, "REQ_3");
        assert_eq!(service.get(&c1).await.unwrap().level, 0);
    }

    #[tokio::test]
    async fn move_records_structural_change() {
        let (_, service) = service().await;
        let r1 = create(&service, "R1", None).await;
        let r2 = create(&service, "R2", None).await;

        service
            .move_requirement(to(&r2, Some(&r1), 1))
            .await
            .unwrap();

        let moved = service.get(&r2).await.unwrap();
        assert_eq!(label(&service, &r2).await, "REQ_1.1");
        let entry = moved.change_log.last().unwrap();
        assert_eq!(entry.kind, ChangeKind::Moved);
        let fields = entry.changes.fields().unwrap();
        assert_eq!(fields["parentId"].old, Value::Null);
        assert_eq!(fields["parentId"].new, r1.as_str());
        assert_eq!(fields["level"].new, 1);
        assert_eq!(fields["order"].old, 2);
    }

    #[tokio::test]
    async fn moving_a_subtree_rewrites_descendants() {
        let (_, service) = service().await;
        let a = create(&service, "A", None).await;
        let b = create(&service, "B", None).await;
        let b1 = create(&service, "B1", Some(&b)).await;
        let b11 = create(&service, "B11", Some(&b1)).await;
        assert_eq!(label(&service, &b11).await, "REQ_2.1.1");

        service
            .move_requirement(to(&b, Some(&a), 1))
            .await
            .unwrap();

        for (id, path, level) in [
            (&b, "REQ_1.1", 1),
            (&b1, "REQ_1.1.1", 2),
            (&b11, "REQ_1.1.1.1", 3),
        ] {
            let node = service.get(id).await.unwrap();
            assert_eq!(node.label(), path);
            assert_eq!(node.level, level);
        }

        // only the moved node records the move
        let b11 = service.get(&b11).await.unwrap();
        assert_eq!(b11.parent_id, Some(b1));
        assert_eq!(b11.change_log.len(), 1);
        assert_eq!(b11.change_log[0].kind, ChangeKind::Created);
    }

    #[tokio::test]
    async fn move_under_descendant_is_rejected_without_writes() {
        let (store, service) = service().await;
        let a = create(&service, "A", None).await;
        let b = create(&service, "B", Some(&a)).await;
        let c = create(&service, "C", Some(&b)).await;
        let commits = store.commits();

        for target in [&a, &b, &c] {
            assert!(matches!(
                service.move_requirement(to(&a, Some(target), 1)).await,
                Err(Error::InvalidOperation(_))
            ));
        }
        assert_eq!(store.commits(), commits);
    }

    #[tokio::test]
    async fn noop_move_writes_nothing() {
        let (store, service) = service().await;
        let r1 = create(&service, "R1", None).await;
        let commits = store.commits();

        let outcome = service.move_requirement(to(&r1, None, 1)).await.unwrap();

        assert!(!outcome.value);
        assert!(matches!(outcome.regeneration, Regeneration::Skipped));
        assert_eq!(store.commits(), commits);
    }

    #[tokio::test]
    async fn move_validates_request() {
        let (_, service) = service().await;
        let r1 = create(&service, "R1", None).await;

        assert!(matches!(
            service.move_requirement(to(&r1, None, 0)).await,
            Err(Error::InvalidOperation(_))
        ));
        assert!(matches!(
            service.move_requirement(to(&"nope".into(), None, 1)).await,
            Err(Error::NotFound(Missing::Requirement(_)))
        ));
        assert!(matches!(
            service
                .move_requirement(to(&r1, Some(&"nope".into()), 1))
                .await,
            Err(Error::NotFound(Missing::Parent(_)))
        ));
    }

    #[tokio::test]
    async fn move_across_projects_is_rejected() {
        let store = store().await;
        let alice = service_as(&store, Some("alice"));
        let carol = service_as(&store, Some("carol"));
        let mine = create(&alice, "Mine", None).await;
        let theirs = carol
            .create(RequirementDraft::new("p2".into(), "Theirs"))
            .await
            .unwrap()
            .into_value();

        assert!(matches!(
            alice.move_requirement(to(&mine, Some(&theirs), 1)).await,
            Err(Error::InvalidOperation(_))
        ));
    }

    #[tokio::test]
    async fn failed_regeneration_keeps_primary_write() {
        let (store, service) = service().await;
        let r1 = create(&service, "R1", None).await;
        let r2 = create(&service, "R2", None).await;

        store.fail_after(1);
        let outcome = service.move_requirement(to(&r2, None, 1)).await.unwrap();

        assert!(outcome.value);
        assert!(matches!(
            outcome.regeneration,
            Regeneration::Failed(Error::RegenerationFailure { .. })
        ));
        let moved = service.get(&r2).await.unwrap();
        assert_eq!(moved.order, 1);
        assert_eq!(moved.label(), "REQ_2");

        // The repair pass restores contiguous orders; ties keep storage order.
        store.heal();
        assert_eq!(service.regenerate(&PROJECT.into()).await.unwrap(), 1);
        assert_eq!(label(&service, &r1).await, "REQ_1");
        assert_eq!(label(&service, &r2).await, "REQ_2");
        assert_eq!(service.get(&r2).await.unwrap().order, 2);
        assert_eq!(service.regenerate(&PROJECT.into()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_primary_write_surfaces_error() {
        let (store, service) = service().await;
        let r1 = create(&service, "R1", None).await;
        store.fail_after(0);

        assert!(matches!(
            service.delete(&r1).await,
            Err(Error::Store(_))
        ));
        store.heal();
        assert!(service.get(&r1).await.is_ok());
    }

    #[tokio::test]
    async fn delete_cascades_comments() {
        let (store, service) = service().await;
        let r1 = create(&service, "R1", None).await;
        let r2 = create(&service, "R2", None).await;
        service
            .add_comment(&r2, CommentDraft::new("first"))
            .await
            .unwrap();
        service
            .add_comment(&r2, CommentDraft::new("second"))
            .await
            .unwrap();

        service.delete(&r2).await.unwrap();

        assert!(matches!(
            service.get(&r2).await,
            Err(Error::NotFound(Missing::Requirement(_)))
        ));
        assert!(service.get_comments(&r2).await.unwrap().is_empty());
        assert_eq!(label(&service, &r1).await, "REQ_1");
        let remaining = store
            .query(REQUIREMENTS, &Query::new())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn delete_renumbers_later_siblings() {
        let (_, service) = service().await;
        let r1 = create(&service, "R1", None).await;
        let r2 = create(&service, "R2", None).await;
        let c = create(&service, "C", Some(&r2)).await;

        service.delete(&r1).await.unwrap();

        assert_eq!(label(&service, &r2).await, "REQ_1");
        assert_eq!(label(&service, &c).await, "REQ_1.1");
    }

    #[tokio::test]
    async fn delete_with_children_is_rejected() {
        let (store, service) = service().await;
        let a = create(&service, "A", None).await;
        let b = create(&service, "B", Some(&a)).await;
        let commits = store.commits();

        assert!(matches!(
            service.delete(&a).await,
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(store.commits(), commits);
        assert_eq!(label(&service, &a).await, "REQ_1");
        assert_eq!(label(&service, &b).await, "REQ_1.1");
    }

    #[tokio::test]
    async fn delete_is_reserved_to_author_and_project_creator() {
        let store = store().await;
        let alice = service_as(&store, Some("alice"));
        let bob = service_as(&store, Some("bob"));
        let by_alice = create(&alice, "A", None).await;
        let by_bob = create(&bob, "B", None).await;

        assert!(matches!(
            bob.delete(&by_alice).await,
            Err(Error::Unauthorized(_))
        ));
        bob.delete(&by_bob).await.unwrap();
        let again = create(&bob, "B2", None).await;
        alice.delete(&again).await.unwrap();
    }

    #[tokio::test]
    async fn update_writes_only_changed_fields() {
        let (_, service) = service().await;
        let id = create(&service, "Old", None).await;

        let outcome = service
            .update(
                &id,
                RequirementUpdate {
                    title: Some("New".into()),
                    status: Some("approved".into()),
                    description: Some(String::new()),
                    ..RequirementUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(outcome.value);
        assert!(matches!(outcome.regeneration, Regeneration::Skipped));

        let requirement = service.get(&id).await.unwrap();
        assert_eq!(requirement.title, "New");
        assert_eq!(requirement.status, "approved");
        assert_eq!(requirement.change_log.len(), 2);
        let entry = &requirement.change_log[1];
        assert_eq!(entry.kind, ChangeKind::Updated);
        let fields = entry.changes.fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["title"].old, "Old");
        assert_eq!(fields["title"].new, "New");
        assert_eq!(fields["status"].old, "draft");
        assert_eq!(fields["status"].new, "approved");
    }

    #[tokio::test]
    async fn update_without_real_changes_writes_nothing() {
        let (store, service) = service().await;
        let id = create(&service, "Same", None).await;
        let commits = store.commits();

        let outcome = service
            .update(
                &id,
                RequirementUpdate {
                    title: Some("Same".into()),
                    ..RequirementUpdate::default()
                },
            )
            .await
            .unwrap();

        assert!(!outcome.value);
        assert_eq!(store.commits(), commits);
        assert_eq!(service.get(&id).await.unwrap().change_log.len(), 1);
    }

    #[tokio::test]
    async fn prefix_update_regenerates() {
        let (_, service) = service().await;
        let root = create(&service, "Root", None).await;
        let child = create(&service, "Child", Some(&root)).await;

        let outcome = service
            .update(
                &root,
                RequirementUpdate {
                    section_prefix: Some(Some("SYS".parse().unwrap())),
                    ..RequirementUpdate::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            outcome.regeneration,
            Regeneration::Completed { updated: 2 }
        ));
        assert_eq!(label(&service, &root).await, "SYS_1");
        assert_eq!(label(&service, &child).await, "SYS_1.1");
    }

    #[tokio::test]
    async fn list_orders_paths_numerically() {
        let (_, service) = service().await;
        let mut ids = Vec::new();
        for n in 1..=11 {
            ids.push(create(&service, &format!("R{n}"), None).await);
        }

        let listed = service.list(&PROJECT.into()).await.unwrap();
        let labels: Vec<String> = listed.iter().map(Requirement::label).collect();

        assert_eq!(labels.len(), 11);
        assert_eq!(labels[1], "REQ_2");
        assert_eq!(labels[10], "REQ_11");
    }

    #[tokio::test]
    async fn descendant_queries() {
        let (_, service) = service().await;
        let a = create(&service, "A", None).await;
        let b = create(&service, "B", Some(&a)).await;
        let other = create(&service, "Other", None).await;

        assert!(service.is_descendant(&a, &b).await.unwrap());
        assert!(service.is_descendant(&a, &a).await.unwrap());
        assert!(!service.is_descendant(&b, &a).await.unwrap());
        assert!(!service.is_descendant(&a, &other).await.unwrap());
        assert!(!service.is_descendant(&a, &"nope".into()).await.unwrap());
    }
}
