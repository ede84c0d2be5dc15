//! Soft deletion for document stores.
//!
//! This crate is the core of the softdoc project. It wraps any host document store
//! so that deleting a document flags it instead of erasing it, and so that reads
//! hide flagged documents unless asked otherwise. It provides:
//!
//! - **Configuration** ([`config`]) - Field names, switches and exclusions, swapped atomically
//! - **Selectors** ([`selector`]) - Selector shapes, normalization and the deletion constraint
//! - **Query and filtering API** ([`query`]) - Filter expressions and per-call options
//! - **Mutations** ([`mutation`]) - Update modifiers and the soft-delete rules
//! - **Store backend abstraction** ([`backend`]) - The native surface of a host store
//! - **Collections interface** ([`collection`]) - Soft-delete aware collection handles
//! - **Soft-delete store** ([`store`]) - Configuration holder and collection registrar
//! - **Document traits** ([`document`]) - Typed documents over serde
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use softdoc_core::{store::SoftDeleteStore, query::{FindOptions, RemoveOptions}};
//!
//! let store = SoftDeleteStore::new(backend);
//! let test = store.collection("test");
//!
//! test.insert(doc! { "_id": "doc1", "name": "Test Doc" }).await?;
//! test.remove("doc1", RemoveOptions::new()).await?;
//!
//! assert!(test.find_one("doc1", FindOptions::new()).await?.is_none());
//! assert!(test.find_one("doc1", FindOptions::unfiltered()).await?.is_some());
//! ```

pub mod backend;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod mutation;
pub mod query;
pub mod selector;
pub mod store;
