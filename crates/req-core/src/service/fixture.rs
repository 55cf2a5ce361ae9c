//! Shared test scaffolding for the service modules.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde_json::{json, Value};

use crate::{
    domain::{ProjectId, RequirementDraft, RequirementId, SectionPrefix},
    service::RequirementService,
    storage::{
        Batch, MemoryStore, Query, StaticIdentity, Store, StoreError, StoredProjects,
        Subscription, PROJECTS,
    },
};

/// A [`MemoryStore`] that counts commits and can be told to start failing.
#[derive(Debug, Clone)]
pub struct FlakyStore {
    inner: MemoryStore,
    commits: Arc<AtomicUsize>,
    budget: Arc<AtomicUsize>,
}

impl FlakyStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            commits: Arc::new(AtomicUsize::new(0)),
            budget: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    /// Successful commits so far.
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Lets `n` more commits through, then fails every later one.
    pub fn fail_after(&self, n: usize) {
        self.budget.store(self.commits() + n, Ordering::SeqCst);
    }

    /// Stops failing commits.
    pub fn heal(&self) {
        self.budget.store(usize::MAX, Ordering::SeqCst);
    }
}

impl Store for FlakyStore {
    fn allocate_id(&self, collection: &str) -> String {
        self.inner.allocate_id(collection)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        self.inner.query(collection, query).await
    }

    async fn commit(&self, batch: Batch) -> Result<(), StoreError> {
        if self.commits() >= self.budget.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner.commit(batch).await?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self, collection: &str, query: Query) -> Result<Subscription, StoreError> {
        self.inner.subscribe(collection, query).await
    }
}

pub type TestService = RequirementService<FlakyStore, StoredProjects<MemoryStore>, StaticIdentity>;

pub const PROJECT: &str = "p1";

/// Project `p1` (created by alice, member bob) and project `p2` (carol).
pub async fn store() -> FlakyStore {
    let memory = MemoryStore::new();
    let mut batch = Batch::new();
    batch
        .set(
            PROJECTS,
            "p1",
            json!({"id": "p1", "name": "Demo", "createdBy": "alice", "members": ["bob"]}),
        )
        .set(
            PROJECTS,
            "p2",
            json!({"id": "p2", "name": "Other", "sectionPrefix": "SYS", "createdBy": "carol"}),
        );
    memory.commit(batch).await.unwrap();
    FlakyStore::new(memory)
}

/// A service acting as `user` (or anonymously) over `store`.
pub fn service_as(store: &FlakyStore, user: Option<&str>) -> TestService {
    let identity = user.map_or_else(StaticIdentity::anonymous, |user| {
        StaticIdentity::user(user.into())
    });
    RequirementService::new(
        store.clone(),
        StoredProjects::new(store.inner.clone()),
        identity,
        SectionPrefix::default(),
    )
}

/// A fresh store and a service acting as alice.
pub async fn service() -> (FlakyStore, TestService) {
    let store = store().await;
    let service = service_as(&store, Some("alice"));
    (store, service)
}

pub async fn create(
    service: &TestService,
    title: &str,
    parent: Option<&RequirementId>,
) -> RequirementId {
    let mut draft = RequirementDraft::new(ProjectId::new(PROJECT), title);
    draft.parent_id = parent.cloned();
    service.create(draft).await.unwrap().into_value()
}

pub async fn label(service: &TestService, id: &RequirementId) -> String {
    service.get(id).await.unwrap().label()
}
