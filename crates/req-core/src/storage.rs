//! Document storage behind the requirement service.
//!
//! The [`Store`] trait is the only way the service reaches persisted data;
//! [`MemoryStore`] is the in-process implementation used by the CLI and the
//! tests.

mod store;
pub use store::{
    decode, encode, Batch, FieldValue, Fields, Query, Store, StoreError, Subscription, Write,
    COMMENTS, PROJECTS, REQUIREMENTS,
};

mod memory;
pub use memory::MemoryStore;

mod collaborators;
pub use collaborators::{Identity, ProjectSource, StaticIdentity, StoredProjects};
