use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::Arc,
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::{
    domain::generate_id,
    storage::{Batch, FieldValue, Query, Store, StoreError, Subscription, Write},
};

/// An in-process [`Store`].
///
/// Documents keep the sequence number of their first insertion, which breaks
/// ties when ordering query results. Cloning shares the underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, HashMap<String, Stored>>,
    next_seq: u64,
    subscribers: Vec<Subscriber>,
}

#[derive(Debug, Clone)]
struct Stored {
    seq: u64,
    document: Value,
}

#[derive(Debug)]
struct Subscriber {
    collection: String,
    query: Query,
    sender: mpsc::UnboundedSender<Vec<Value>>,
}

/// On-disk form of a [`MemoryStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    collections: BTreeMap<String, Vec<SnapshotEntry>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    id: String,
    document: Value,
}

impl State {
    fn document(&self, collection: &str, id: &str) -> Option<&Stored> {
        self.collections.get(collection)?.get(id)
    }

    fn results(&self, collection: &str, query: &Query) -> Vec<Value> {
        let Some(documents) = self.collections.get(collection) else {
            return Vec::new();
        };
        let mut matching: Vec<&Stored> = documents
            .values()
            .filter(|stored| query.matches(&stored.document))
            .collect();

        match query.ordering() {
            Some(field) => matching.sort_by(|a, b| {
                compare(
                    a.document.get(field).unwrap_or(&Value::Null),
                    b.document.get(field).unwrap_or(&Value::Null),
                )
                .then(a.seq.cmp(&b.seq))
            }),
            None => matching.sort_by_key(|stored| stored.seq),
        }

        matching
            .into_iter()
            .map(|stored| stored.document.clone())
            .collect()
    }

    fn insert(&mut self, collection: &str, id: String, document: Value) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, Stored { seq, document });
    }

    fn notify(&mut self, touched: &[(String, Option<Value>, Option<Value>)]) {
        for subscriber in &self.subscribers {
            let affected = touched.iter().any(|(collection, before, after)| {
                *collection == subscriber.collection
                    && [before, after]
                        .into_iter()
                        .flatten()
                        .any(|document| subscriber.query.matches(document))
            });
            if affected {
                // A closed receiver is pruned below.
                let _ = subscriber
                    .sender
                    .send(self.results(&subscriber.collection, &subscriber.query));
            }
        }
        self.subscribers
            .retain(|subscriber| !subscriber.sender.is_closed());
    }
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a store from a JSON snapshot written by [`MemoryStore::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a snapshot.
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;

        let mut state = State::default();
        for (collection, entries) in snapshot.collections {
            for entry in entries {
                state.insert(&collection, entry.id, entry.document);
            }
        }
        debug!(path = %path.display(), "loaded store snapshot");

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
        })
    }

    /// Writes every document to a JSON snapshot, preserving insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = {
            let state = self.state.read().await;
            let mut snapshot = Snapshot::default();
            for (collection, documents) in &state.collections {
                let mut entries: Vec<(&String, &Stored)> = documents.iter().collect();
                entries.sort_by_key(|(_, stored)| stored.seq);
                snapshot.collections.insert(
                    collection.clone(),
                    entries
                        .into_iter()
                        .map(|(id, stored)| SnapshotEntry {
                            id: id.clone(),
                            document: stored.document.clone(),
                        })
                        .collect(),
                );
            }
            snapshot
        };

        let content = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))
    }
}

impl Store for MemoryStore {
    fn allocate_id(&self, _collection: &str) -> String {
        generate_id()
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .document(collection, id)
            .map(|stored| stored.document.clone()))
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let state = self.state.read().await;
        Ok(state.results(collection, query))
    }

    async fn commit(&self, batch: Batch) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let now = timestamp(Utc::now());

        // Stage every write before touching the data so a failing write
        // leaves the store unchanged.
        let mut staged: Vec<((String, String), Option<Value>)> = Vec::new();
        for write in batch.into_writes() {
            let (collection, id) = write.target();
            let key = (collection.to_string(), id.to_string());
            let current = staged
                .iter()
                .rev()
                .find(|(staged_key, _)| *staged_key == key)
                .map_or_else(
                    || state.document(collection, id).map(|s| s.document.clone()),
                    |(_, document)| document.clone(),
                );

            let next = match write {
                Write::Set { document, .. } => Some(document),
                Write::Update { fields, .. } => {
                    let Some(mut document) = current else {
                        return Err(StoreError::NotFound {
                            collection: key.0,
                            id: key.1,
                        });
                    };
                    if let Value::Object(map) = &mut document {
                        for (field, value) in fields.iter() {
                            apply(map, field, value, &now);
                        }
                    }
                    Some(document)
                }
                Write::Delete { .. } => {
                    if current.is_none() {
                        return Err(StoreError::NotFound {
                            collection: key.0,
                            id: key.1,
                        });
                    }
                    None
                }
            };
            staged.push((key, next));
        }

        let mut touched = Vec::with_capacity(staged.len());
        for ((collection, id), next) in staged {
            let before = state
                .collections
                .get_mut(&collection)
                .and_then(|documents| documents.remove(&id));
            let after = next.clone();
            match (next, &before) {
                (Some(document), Some(previous)) => {
                    state
                        .collections
                        .entry(collection.clone())
                        .or_default()
                        .insert(
                            id,
                            Stored {
                                seq: previous.seq,
                                document,
                            },
                        );
                }
                (Some(document), None) => state.insert(&collection, id, document),
                (None, _) => {}
            }
            touched.push((collection, before.map(|stored| stored.document), after));
        }

        state.notify(&touched);
        Ok(())
    }

    async fn subscribe(&self, collection: &str, query: Query) -> Result<Subscription, StoreError> {
        let mut state = self.state.write().await;
        let (sender, receiver) = mpsc::unbounded_channel();
        sender
            .send(state.results(collection, &query))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        state.subscribers.push(Subscriber {
            collection: collection.to_string(),
            query,
            sender,
        });
        Ok(Subscription::new(receiver))
    }
}

fn timestamp(now: DateTime<Utc>) -> Value {
    Value::String(now.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn apply(document: &mut serde_json::Map<String, Value>, field: &str, value: &FieldValue, now: &Value) {
    match value {
        FieldValue::Value(value) => {
            document.insert(field.to_string(), value.clone());
        }
        FieldValue::ServerTimestamp => {
            document.insert(field.to_string(), now.clone());
        }
        FieldValue::ArrayAppend(elements) => match document.get_mut(field) {
            Some(Value::Array(existing)) => existing.extend(elements.iter().cloned()),
            _ => {
                document.insert(field.to_string(), Value::Array(elements.clone()));
            }
        },
    }
}

/// Orders two field values: `null` < booleans < numbers < strings.
///
/// Strings that both parse as RFC 3339 timestamps compare as instants.
fn compare(a: &Value, b: &Value) -> Ordering {
    const fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        _ => rank(a).cmp(&rank(b)),
    }
}
