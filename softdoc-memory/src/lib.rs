//! In-memory host store for softdoc.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development
//! and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Mongo-style selectors** - Equality, comparison, membership, existence and logical operators
//! - **Read options** - Sorting, skipping and limiting
//!
//! # Quick Start
//!
//! ```ignore
//! use softdoc::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SoftDeleteStore::new(InMemoryStore::builder().build().await?);
//!     let test = store.collection("test");
//!
//!     test.insert(doc! { "_id": "doc1", "name": "Test Doc" }).await?;
//!     test.remove("doc1", RemoveOptions::new()).await?;
//!
//!     assert_eq!(test.count(Selector::all(), FindOptions::new()).await?, 0);
//!
//!     Ok(())
//! }
//! ```

pub mod store;
pub mod evaluator;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
