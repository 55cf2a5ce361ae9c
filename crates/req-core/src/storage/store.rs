//! The document store contract.
//!
//! Documents are JSON objects grouped in named collections. The store knows
//! nothing about trees; it offers reads, equality queries, atomic batches and
//! live query subscriptions.

use std::{collections::BTreeMap, future::Future};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Collection holding requirement nodes.
pub const REQUIREMENTS: &str = "requirements";
/// Collection holding comments.
pub const COMMENTS: &str = "comments";
/// Collection holding project metadata.
pub const PROJECTS: &str = "projects";

/// Errors raised by a [`Store`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An update or delete targeted a document that does not exist.
    #[error("document {collection}/{id} not found")]
    NotFound {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
    },

    /// A document could not be converted to or from its typed form.
    #[error("malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous access to a document store.
///
/// All methods return `Send` futures so callers can run on a multi-threaded
/// tokio runtime.
pub trait Store: Send + Sync {
    /// Reserves a fresh document id in `collection`.
    ///
    /// The id is visible to the caller before anything is committed.
    fn allocate_id(&self, collection: &str) -> String;

    /// Reads one document.
    fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Returns every document in `collection` matching `query`.
    fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;

    /// Applies every write in `batch`, or none of them.
    fn commit(&self, batch: Batch) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Opens a live feed of the documents matching `query`.
    ///
    /// The current result set is delivered immediately, and again after
    /// every commit that touches a matching document.
    fn subscribe(
        &self,
        collection: &str,
        query: Query,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send;
}

/// A conjunction of equality filters with an optional ascending sort field.
///
/// A field missing from a document compares equal to `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<(String, Value)>,
    order_by: Option<String>,
}

impl Query {
    /// A query matching every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Sorts results ascending by `field`.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// The sort field, if any.
    #[must_use]
    pub fn ordering(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    /// Whether `document` satisfies every filter.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| document.get(field).unwrap_or(&Value::Null) == expected)
    }
}

/// The new value of one top-level field in an update.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Replace the field.
    Value(Value),
    /// Replace the field with the store's commit time.
    ServerTimestamp,
    /// Append elements to an array field, creating it if absent.
    ///
    /// Elements are stored as given; they never hold server timestamps.
    ArrayAppend(Vec<Value>),
}

/// A set of top-level field updates for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    /// An empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field` to `value`.
    #[must_use]
    pub fn value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), FieldValue::Value(value.into()));
        self
    }

    /// Sets `field` to the commit time.
    #[must_use]
    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), FieldValue::ServerTimestamp);
        self
    }

    /// Appends `element` to the array in `field`.
    #[must_use]
    pub fn append(mut self, field: impl Into<String>, element: Value) -> Self {
        match self
            .0
            .entry(field.into())
            .or_insert_with(|| FieldValue::ArrayAppend(Vec::new()))
        {
            FieldValue::ArrayAppend(elements) => elements.push(element),
            other => *other = FieldValue::ArrayAppend(vec![element]),
        }
        self
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the field updates in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }
}

impl FromIterator<(String, Value)> for Fields {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field, FieldValue::Value(value)))
                .collect(),
        )
    }
}

/// One write within a [`Batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or overwrite a whole document.
    Set {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
        /// The full document.
        document: Value,
    },
    /// Change fields of an existing document.
    Update {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
        /// The field updates.
        fields: Fields,
    },
    /// Remove an existing document.
    Delete {
        /// Collection name.
        collection: String,
        /// Document id.
        id: String,
    },
}

impl Write {
    /// The collection and id this write targets.
    #[must_use]
    pub fn target(&self) -> (&str, &str) {
        match self {
            Self::Set { collection, id, .. }
            | Self::Update { collection, id, .. }
            | Self::Delete { collection, id } => (collection, id),
        }
    }
}

/// An ordered group of writes committed atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    writes: Vec<Write>,
}

impl Batch {
    /// An empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or overwrites a document.
    pub fn set(&mut self, collection: &str, id: impl Into<String>, document: Value) -> &mut Self {
        self.writes.push(Write::Set {
            collection: collection.to_string(),
            id: id.into(),
            document,
        });
        self
    }

    /// Updates fields of an existing document.
    pub fn update(&mut self, collection: &str, id: impl Into<String>, fields: Fields) -> &mut Self {
        self.writes.push(Write::Update {
            collection: collection.to_string(),
            id: id.into(),
            fields,
        });
        self
    }

    /// Deletes an existing document.
    pub fn delete(&mut self, collection: &str, id: impl Into<String>) -> &mut Self {
        self.writes.push(Write::Delete {
            collection: collection.to_string(),
            id: id.into(),
        });
        self
    }

    /// Number of writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether the batch holds no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// The writes in the order they were added.
    #[must_use]
    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    /// Consumes the batch, yielding its writes.
    #[must_use]
    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

/// A live feed of query results.
///
/// Each message is the complete, ordered result set at that moment. The feed
/// ends when the store goes away or the subscription is cancelled.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Vec<Value>>,
}

impl Subscription {
    /// Wraps the receiving half of a store-side channel.
    #[must_use]
    pub const fn new(receiver: mpsc::UnboundedReceiver<Vec<Value>>) -> Self {
        Self { receiver }
    }

    /// Waits for the next result set.
    ///
    /// Returns `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Vec<Value>> {
        self.receiver.recv().await
    }

    /// Stops the feed. Result sets already queued are discarded.
    pub fn cancel(&mut self) {
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }
}

/// Converts a stored document into its typed form.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the document does not have the
/// expected shape.
pub fn decode<T: DeserializeOwned>(document: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(document)?)
}

/// Converts a typed document into its stored form.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if the value cannot be represented
/// as JSON.
pub fn encode<T: Serialize>(document: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(document)?)
}
