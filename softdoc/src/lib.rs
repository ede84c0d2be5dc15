//! Soft deletion for document collections.
//!
//! This crate is the primary entry point of the softdoc project. It re-exports the
//! core types from the sub-crates and provides access to the host store backends.
//!
//! Removing a document through a soft-delete collection flags it as deleted and
//! stamps it instead of erasing it. Reads hide flagged documents unless the caller
//! asks for them, and `recover` brings them back.
//!
//! # Features
//!
//! - **Transparent interception** - Insert, remove and the read operations are rewritten per call
//! - **Runtime configuration** - Field names, switches and excluded collections can change at any time
//! - **Multiple backends** - In-memory and MongoDB host stores behind one trait
//! - **Typed collections** - Serde types stored without modelling the soft-delete fields
//!
//! # Quick Start
//!
//! ```ignore
//! use softdoc::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = SoftDeleteStore::new(InMemoryStore::builder().build().await?);
//!     store.configure(&ConfigPatch::new().exclude(["dogs"]))?;
//!
//!     let test = store.collection("test");
//!
//!     test.insert(doc! { "_id": "doc1", "name": "Test Doc" }).await?;
//!     test.remove("doc1", RemoveOptions::new()).await?;
//!
//!     // Hidden from normal reads
//!     assert!(test.find_one("doc1", FindOptions::new()).await?.is_none());
//!
//!     // Visible when the deletion field is named
//!     let gone = test.find_one(doc! { "_id": "doc1", "deleted": true }, FindOptions::new()).await?;
//!     assert!(gone.is_some());
//!
//!     test.recover("doc1").await?;
//!     assert!(test.find_one("doc1", FindOptions::new()).await?.is_some());
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Configuration
//!
//! Configuration can be given as a patch or as a JSON object using the same keys:
//!
//! ```ignore
//! store.configure_json(serde_json::json!({
//!     "deleted": "isDeleted",
//!     "autoFilter": false,
//!     "exclude": ["dogs"],
//! }))?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use softdoc_core::{backend, collection, config, document, error, mutation, query, selector, store};

// Re-export BSON and JSON for convenience
pub use bson;
pub use serde_json;

/// In-memory storage backend implementations.
pub mod memory {
    pub use softdoc_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use softdoc_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
