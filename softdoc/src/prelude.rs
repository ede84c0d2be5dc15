//! Convenient re-exports of commonly used types from softdoc.
//!
//! ```ignore
//! use softdoc::prelude::*;
//! ```
//!
//! This provides access to:
//! - The soft-delete store and its collection handles
//! - Configuration types
//! - Selectors, filters and per-call options
//! - Store backends and builders
//! - Error types

pub use softdoc_core::{
    store::SoftDeleteStore,
    collection::{SoftCollection, TypedSoftCollection},
    config::{ConfigPatch, EffectiveConfig, SoftDeleteConfig},
    selector::{Selector, add_deleted},
    query::{Expr, Filter, FieldOp, FindOptions, QueryVisitor, RemoveOptions, Sort, SortDirection},
    mutation::Modifier,
    document::{DocumentExt, TypedDocument},
    backend::{StoreBackend, StoreBackendBuilder},
    error::{ConfigError, DocumentStoreError, DocumentStoreResult},
};
