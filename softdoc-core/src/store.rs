//! The soft-delete store: configuration holder and collection registrar.
//!
//! [`SoftDeleteStore`] owns the host backend and the current configuration. Asking
//! it for a collection attaches the soft-delete interceptors to that collection
//! name (once per name) and hands back a [`SoftCollection`] that consults the
//! configuration on every call.
//!
//! # Example
//!
//! ```ignore
//! use softdoc::{prelude::*, memory::InMemoryStore};
//!
//! let store = SoftDeleteStore::new(InMemoryStore::new());
//! store.configure(&ConfigPatch::new().exclude(["dogs"]))?;
//!
//! let test = store.collection("test");
//! let dogs = store.collection("dogs");
//! ```

use bson::Document;
use parking_lot::Mutex;
use serde_json::Value;
use std::{collections::BTreeSet, sync::Arc};
use tracing::debug;

use crate::{
    backend::StoreBackend,
    collection::{SoftCollection, TypedSoftCollection},
    config::{ConfigPatch, ConfigStore, EffectiveConfig, SoftDeleteConfig},
    document::TypedDocument,
    error::{ConfigError, DocumentStoreResult},
    mutation,
    selector::{self, Selector},
};

/// A document store with soft-delete semantics on every registered collection.
///
/// # Type Parameters
///
/// * `B` - The host backend implementation type
#[derive(Debug)]
pub struct SoftDeleteStore<B: StoreBackend> {
    backend: B,
    config: ConfigStore,
    attached: Mutex<BTreeSet<String>>,
}

impl<B: StoreBackend> SoftDeleteStore<B> {
    /// Creates a store with the default configuration.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: ConfigStore::default(),
            attached: Mutex::new(BTreeSet::new()),
        }
    }

    /// Creates a store with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn with_config(backend: B, config: SoftDeleteConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            backend,
            config: ConfigStore::new(config)?,
            attached: Mutex::new(BTreeSet::new()),
        })
    }

    /// Returns the host backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Merges a partial configuration into the current one.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the merged configuration is invalid.
    pub fn configure(&self, patch: &ConfigPatch) -> Result<(), ConfigError> {
        self.config.configure(patch)
    }

    /// Merges a partial configuration given as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the value is not a valid configuration object or the
    /// merged configuration is invalid.
    pub fn configure_json(&self, value: Value) -> Result<(), ConfigError> {
        self.config.configure(&ConfigPatch::from_json(value)?)
    }

    /// Returns the current configuration.
    pub fn config(&self) -> Arc<SoftDeleteConfig> {
        self.config.snapshot()
    }

    /// Returns the configuration that applies to a collection right now.
    pub fn effective_config(&self, collection: &str) -> EffectiveConfig {
        self.config.effective(collection)
    }

    /// Adds the configured deletion constraint to a selector.
    ///
    /// For callers that build selectors by hand and pass them somewhere the read
    /// interceptor does not reach.
    pub fn add_deleted(&self, selector: impl Into<Selector>) -> Document {
        selector::add_deleted(selector, &self.config.snapshot().deleted_field)
    }

    /// Runs the insert-time hook of a collection on a document.
    ///
    /// This is the hook `insert` uses. Identity layers that create records without
    /// going through `insert` (account creation, for instance) call it so those
    /// records get the same deletion default. Returns `true` if the flag was added.
    pub fn apply_insert_defaults(&self, collection: &str, document: &mut Document) -> bool {
        match self.config.effective(collection) {
            EffectiveConfig::Active(config) => mutation::apply_insert_defaults(document, &config),
            EffectiveConfig::Bypassed => false,
        }
    }

    /// Gets a soft-delete aware handle to the named collection.
    pub fn collection<'a>(&'a self, name: &str) -> SoftCollection<'a, B> {
        self.attach(name);

        SoftCollection::new(name.to_string(), &self.backend, &self.config)
    }

    /// Gets a typed soft-delete aware handle for the document type's collection.
    pub fn typed_collection<'a, D: TypedDocument>(&'a self) -> TypedSoftCollection<'a, B, D> {
        TypedSoftCollection::new(self.collection(D::collection_name()))
    }

    /// Returns the names of the collections interceptors have been attached to.
    pub fn registered_collections(&self) -> Vec<String> {
        self.attached
            .lock()
            .iter()
            .cloned()
            .collect()
    }

    /// Lists all collections in the host store.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Drops a collection and every document in it, deleted or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection does not exist or deletion fails.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown operation fails.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await
    }

    fn attach(&self, name: &str) {
        let mut attached = self.attached.lock();

        if !attached.contains(name) {
            attached.insert(name.to_string());
            debug!(
                collection = name,
                excluded = self.config.snapshot().is_excluded(name),
                "attached soft-delete interceptors"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bson::{Bson, doc};
    use serde_json::json;

    use crate::{mutation::Modifier, query::FindOptions};

    #[derive(Debug, Default)]
    struct NullBackend;

    #[async_trait]
    impl StoreBackend for NullBackend {
        async fn insert_document(&self, _document: Document, _collection: &str) -> DocumentStoreResult<Bson> {
            Ok(Bson::Null)
        }

        async fn update_documents(&self, _selector: Document, _modifier: Modifier, _collection: &str) -> DocumentStoreResult<u64> {
            Ok(0)
        }

        async fn remove_documents(&self, _selector: Document, _collection: &str) -> DocumentStoreResult<u64> {
            Ok(0)
        }

        async fn find_documents(&self, _selector: Document, _options: FindOptions, _collection: &str) -> DocumentStoreResult<Vec<Document>> {
            Ok(vec![])
        }

        async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
            Ok(vec![])
        }

        async fn drop_collection(&self, _name: &str) -> DocumentStoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_collection_attaches_once() {
        let store = SoftDeleteStore::new(NullBackend);

        store.collection("test");
        store.collection("test");
        store.collection("dogs");

        assert_eq!(store.registered_collections(), vec!["dogs".to_string(), "test".to_string()]);
    }

    #[test]
    fn test_identity_collection_gets_insert_default() {
        let store = SoftDeleteStore::new(NullBackend);
        store.configure(&ConfigPatch::new().exclude(["dogs"])).unwrap();

        let mut user = doc! { "username": "bob", "something": "something" };
        assert!(store.apply_insert_defaults("users", &mut user));
        assert_eq!(user, doc! { "username": "bob", "something": "something", "deleted": false });

        let mut dog = doc! { "name": "fido" };
        assert!(!store.apply_insert_defaults("dogs", &mut dog));
        assert_eq!(dog, doc! { "name": "fido" });
    }

    #[test]
    fn test_configure_json_and_add_deleted() {
        let store = SoftDeleteStore::new(NullBackend);
        store
            .configure_json(json!({ "deleted": "isDeleted", "autoFilter": false }))
            .unwrap();

        assert_eq!(store.config().deleted_field, "isDeleted");
        assert!(!store.config().auto_filter);
        assert_eq!(store.add_deleted("x"), doc! { "_id": "x", "isDeleted": false });

        assert!(store.configure_json(json!({ "overrideRemove": 1 })).is_err());
        assert!(store.config().override_remove);
    }

    #[test]
    fn test_with_config_validates() {
        let config = SoftDeleteConfig {
            deleted_at_field: "deleted".to_string(),
            ..SoftDeleteConfig::default()
        };

        assert!(SoftDeleteStore::with_config(NullBackend, config).is_err());
    }
}
