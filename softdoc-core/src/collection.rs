//! Soft-delete aware collection handles.
//!
//! A [`SoftCollection`] wraps a host store and a collection name and exposes the
//! same operations as the host (insert, update, remove, find, find-one) plus
//! `soft_remove` and `recover`. Every call reads one configuration snapshot and
//! then rewrites the call before forwarding it:
//!
//! - `insert` adds the deletion flag (`false`) when the document has none.
//! - `remove` becomes a flagging update unless the collection is excluded, the caller
//!   passes `soft: false`, or `override_remove` is off.
//! - `find`, `find_one` and `count` add `deleted: false` to the selector unless the
//!   collection is excluded, auto-filtering is off, the caller opts out, or the
//!   selector already names the deletion field.
//!
//! [`TypedSoftCollection`] is the same handle for a [`TypedDocument`] type.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use softdoc::prelude::*;
//!
//! # async fn example(store: &SoftDeleteStore<impl StoreBackend>) -> DocumentStoreResult<()> {
//! let docs = store.collection("test");
//! docs.insert(doc! { "_id": "doc1", "name": "Test Doc" }).await?;
//! docs.soft_remove("doc1").await?;
//!
//! assert!(docs.find_one("doc1", FindOptions::new()).await?.is_none());
//! assert!(docs.find_one(doc! { "_id": "doc1", "deleted": true }, FindOptions::new()).await?.is_some());
//! # Ok(()) }
//! ```

use bson::{Bson, Document};
use chrono::Utc;
use std::marker::PhantomData;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    config::{ConfigStore, EffectiveConfig},
    document::{DocumentExt, TypedDocument},
    error::DocumentStoreResult,
    mutation::{
        Modifier, RemoveStrategy, apply_insert_defaults, recover_modifier, remove_strategy,
        soft_remove_modifier,
    },
    query::{FindOptions, RemoveOptions},
    selector::{Selector, add_deleted},
};

/// A collection handle with soft-delete interception.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend and configuration references
/// * `B` - The host store type
#[derive(Debug)]
pub struct SoftCollection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
    config: &'a ConfigStore,
}

impl<'a, B: StoreBackend> SoftCollection<'a, B> {
    /// Creates a new collection handle (internal use, see the registrar).
    pub(crate) fn new(name: String, backend: &'a B, config: &'a ConfigStore) -> Self {
        Self { name, backend, config }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration that applies to this collection right now.
    pub fn effective_config(&self) -> EffectiveConfig {
        self.config.effective(&self.name)
    }

    /// Inserts a document, adding the deletion flag (`false`) if it is missing.
    ///
    /// A deletion flag already present on the document is kept as given. Excluded
    /// collections receive the document unchanged.
    ///
    /// # Returns
    ///
    /// The primary key reported by the host store.
    ///
    /// # Errors
    ///
    /// Returns whatever error the host store reports.
    pub async fn insert(&self, mut document: Document) -> DocumentStoreResult<Bson> {
        if let EffectiveConfig::Active(config) = self.effective_config() {
            if apply_insert_defaults(&mut document, &config) {
                debug!(collection = %self.name, field = %config.deleted_field, "added deletion flag on insert");
            }
        }

        self.backend
            .insert_document(document, &self.name)
            .await
    }

    /// Applies a modifier to every matching document.
    ///
    /// The selector is not filtered by deletion status.
    ///
    /// # Errors
    ///
    /// Returns whatever error the host store reports.
    pub async fn update(&self, selector: impl Into<Selector>, modifier: Modifier) -> DocumentStoreResult<u64> {
        self.backend
            .update_documents(selector.into().normalize(), modifier, &self.name)
            .await
    }

    /// Removes the matching documents, softly by default.
    ///
    /// The delete is physical when the collection is excluded, `options.soft` is
    /// `Some(false)`, or `override_remove` is off and `options.soft` is not `Some(true)`.
    /// Otherwise the matches are flagged as in [`soft_remove`](Self::soft_remove).
    ///
    /// # Returns
    ///
    /// The number of affected documents; zero when nothing matches.
    ///
    /// # Errors
    ///
    /// Returns whatever error the host store reports.
    pub async fn remove(&self, selector: impl Into<Selector>, options: RemoveOptions) -> DocumentStoreResult<u64> {
        let selector = selector.into();
        let effective = self.effective_config();

        match (remove_strategy(&effective, &options), effective.active()) {
            (RemoveStrategy::Soft, Some(config)) => {
                let modifier = soft_remove_modifier(config, Utc::now());
                self.flag(selector, modifier, "soft remove").await
            }
            _ => {
                debug!(collection = %self.name, "physical remove");
                self.backend
                    .remove_documents(selector.normalize(), &self.name)
                    .await
            }
        }
    }

    /// Flags the matching documents as deleted, regardless of `override_remove`.
    ///
    /// Sets the deletion flag to `true` and both the deletion and modification
    /// timestamps to now. Matching ignores deletion status.
    ///
    /// # Errors
    ///
    /// Returns whatever error the host store reports.
    pub async fn soft_remove(&self, selector: impl Into<Selector>) -> DocumentStoreResult<u64> {
        let config = self.config.snapshot();
        let modifier = soft_remove_modifier(&config, Utc::now());

        self.flag(selector.into(), modifier, "soft remove").await
    }

    /// Clears the soft-delete state of the matching documents.
    ///
    /// Sets the deletion flag to `false`, refreshes the modification timestamp and
    /// removes the deletion timestamp. Matching ignores deletion status.
    ///
    /// # Errors
    ///
    /// Returns whatever error the host store reports.
    pub async fn recover(&self, selector: impl Into<Selector>) -> DocumentStoreResult<u64> {
        let config = self.config.snapshot();
        let modifier = recover_modifier(&config, Utc::now());

        self.flag(selector.into(), modifier, "recover").await
    }

    /// Returns the matching documents, hiding deleted ones unless filtering is off.
    ///
    /// # Errors
    ///
    /// Returns whatever error the host store reports.
    pub async fn find(&self, selector: impl Into<Selector>, options: FindOptions) -> DocumentStoreResult<Vec<Document>> {
        let selector = self.read_selector(selector.into(), &options);

        self.backend
            .find_documents(selector, options, &self.name)
            .await
    }

    /// Returns the first matching document, hiding deleted ones unless filtering is off.
    ///
    /// # Errors
    ///
    /// Returns whatever error the host store reports.
    pub async fn find_one(&self, selector: impl Into<Selector>, options: FindOptions) -> DocumentStoreResult<Option<Document>> {
        let selector = self.read_selector(selector.into(), &options);

        self.backend
            .find_one_document(selector, options, &self.name)
            .await
    }

    /// Counts the documents [`find`](Self::find) would return for the same arguments.
    ///
    /// # Errors
    ///
    /// Returns whatever error the host store reports.
    pub async fn count(&self, selector: impl Into<Selector>, options: FindOptions) -> DocumentStoreResult<u64> {
        let selector = self.read_selector(selector.into(), &options);

        self.backend
            .count_documents(selector, &self.name)
            .await
    }

    async fn flag(&self, selector: Selector, modifier: Modifier, operation: &'static str) -> DocumentStoreResult<u64> {
        let affected = self
            .backend
            .update_documents(selector.normalize(), modifier, &self.name)
            .await?;

        debug!(collection = %self.name, affected, "{operation}");

        Ok(affected)
    }

    fn read_selector(&self, selector: Selector, options: &FindOptions) -> Document {
        let config = self.config.snapshot();
        let filter = !config.is_excluded(&self.name) && options.filter.unwrap_or(config.auto_filter);

        if filter {
            add_deleted(selector, &config.deleted_field)
        } else {
            selector.normalize()
        }
    }
}

/// A type-safe collection handle with soft-delete interception.
///
/// Documents are converted with serde; the soft-delete fields the type does not
/// declare are added on insert and ignored on read.
#[derive(Debug)]
pub struct TypedSoftCollection<'a, B: StoreBackend, D: TypedDocument> {
    inner: SoftCollection<'a, B>,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: TypedDocument> TypedSoftCollection<'a, B, D> {
    pub(crate) fn new(inner: SoftCollection<'a, B>) -> Self {
        Self { inner, _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the untyped handle for this collection.
    pub fn untyped(&self) -> &SoftCollection<'a, B> {
        &self.inner
    }

    /// Inserts a document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the host store rejects the insert.
    pub async fn insert(&self, document: &D) -> DocumentStoreResult<Bson> {
        self.inner.insert(document.to_document()?).await
    }

    /// Applies a modifier to every matching document.
    pub async fn update(&self, selector: impl Into<Selector>, modifier: Modifier) -> DocumentStoreResult<u64> {
        self.inner.update(selector, modifier).await
    }

    /// Removes the matching documents, softly by default.
    pub async fn remove(&self, selector: impl Into<Selector>, options: RemoveOptions) -> DocumentStoreResult<u64> {
        self.inner.remove(selector, options).await
    }

    /// Flags the matching documents as deleted.
    pub async fn soft_remove(&self, selector: impl Into<Selector>) -> DocumentStoreResult<u64> {
        self.inner.soft_remove(selector).await
    }

    /// Clears the soft-delete state of the matching documents.
    pub async fn recover(&self, selector: impl Into<Selector>) -> DocumentStoreResult<u64> {
        self.inner.recover(selector).await
    }

    /// Returns the matching documents.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored document cannot be deserialized into `D`.
    pub async fn find(&self, selector: impl Into<Selector>, options: FindOptions) -> DocumentStoreResult<Vec<D>> {
        self.inner
            .find(selector, options)
            .await?
            .into_iter()
            .map(D::from_document)
            .collect()
    }

    /// Returns the first matching document.
    pub async fn find_one(&self, selector: impl Into<Selector>, options: FindOptions) -> DocumentStoreResult<Option<D>> {
        self.inner
            .find_one(selector, options)
            .await?
            .map(D::from_document)
            .transpose()
    }

    /// Counts the matching documents.
    pub async fn count(&self, selector: impl Into<Selector>, options: FindOptions) -> DocumentStoreResult<u64> {
        self.inner.count(selector, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bson::doc;
    use parking_lot::Mutex;

    use crate::config::ConfigPatch;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Insert(Document),
        Update(Document, Modifier),
        Remove(Document),
        Find(Document),
    }

    #[derive(Debug, Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingBackend {
        fn last(&self) -> Call {
            self.calls.lock().last().cloned().expect("no call recorded")
        }
    }

    #[async_trait]
    impl StoreBackend for RecordingBackend {
        async fn insert_document(&self, document: Document, _collection: &str) -> DocumentStoreResult<Bson> {
            let id = document.get("_id").cloned().unwrap_or(Bson::Null);
            self.calls.lock().push(Call::Insert(document));
            Ok(id)
        }

        async fn update_documents(&self, selector: Document, modifier: Modifier, _collection: &str) -> DocumentStoreResult<u64> {
            self.calls.lock().push(Call::Update(selector, modifier));
            Ok(1)
        }

        async fn remove_documents(&self, selector: Document, _collection: &str) -> DocumentStoreResult<u64> {
            self.calls.lock().push(Call::Remove(selector));
            Ok(1)
        }

        async fn find_documents(&self, selector: Document, _options: FindOptions, _collection: &str) -> DocumentStoreResult<Vec<Document>> {
            self.calls.lock().push(Call::Find(selector));
            Ok(vec![])
        }

        async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
            Ok(vec![])
        }

        async fn drop_collection(&self, _name: &str) -> DocumentStoreResult<()> {
            Ok(())
        }
    }

    fn excluding_dogs() -> ConfigStore {
        let config = ConfigStore::default();
        config.configure(&ConfigPatch::new().exclude(["dogs"])).unwrap();
        config
    }

    #[tokio::test]
    async fn test_find_adds_deleted_filter() {
        let backend = RecordingBackend::default();
        let config = excluding_dogs();
        let test = SoftCollection::new("test".into(), &backend, &config);

        test.find_one("doc1", FindOptions::new()).await.unwrap();
        assert_eq!(backend.last(), Call::Find(doc! { "_id": "doc1", "deleted": false }));

        test.find(Selector::all(), FindOptions::new()).await.unwrap();
        assert_eq!(backend.last(), Call::Find(doc! { "deleted": false }));

        test.find(doc! { "_id": "doc1", "deleted": true }, FindOptions::new()).await.unwrap();
        assert_eq!(backend.last(), Call::Find(doc! { "_id": "doc1", "deleted": true }));

        test.find("doc1", FindOptions::unfiltered()).await.unwrap();
        assert_eq!(backend.last(), Call::Find(doc! { "_id": "doc1" }));
    }

    #[tokio::test]
    async fn test_excluded_collection_is_passthrough() {
        let backend = RecordingBackend::default();
        let config = excluding_dogs();
        let dogs = SoftCollection::new("dogs".into(), &backend, &config);

        dogs.insert(doc! { "_id": "1", "name": "fido" }).await.unwrap();
        assert_eq!(backend.last(), Call::Insert(doc! { "_id": "1", "name": "fido" }));

        dogs.find_one("1", FindOptions::builder().filter(true).build()).await.unwrap();
        assert_eq!(backend.last(), Call::Find(doc! { "_id": "1" }));

        dogs.remove(doc! { "_id": "1" }, RemoveOptions::new()).await.unwrap();
        assert_eq!(backend.last(), Call::Remove(doc! { "_id": "1" }));
    }

    #[tokio::test]
    async fn test_filter_option_overrides_auto_filter() {
        let backend = RecordingBackend::default();
        let config = ConfigStore::default();
        config.configure(&ConfigPatch::new().auto_filter(false)).unwrap();
        let test = SoftCollection::new("test".into(), &backend, &config);

        test.count("doc1", FindOptions::new()).await.unwrap();
        assert_eq!(backend.last(), Call::Find(doc! { "_id": "doc1" }));

        test.count("doc1", FindOptions::builder().filter(true).build()).await.unwrap();
        assert_eq!(backend.last(), Call::Find(doc! { "_id": "doc1", "deleted": false }));
    }

    #[tokio::test]
    async fn test_remove_becomes_flagging_update() {
        let backend = RecordingBackend::default();
        let config = ConfigStore::default();
        let test = SoftCollection::new("test".into(), &backend, &config);

        test.remove("doc1", RemoveOptions::new()).await.unwrap();

        let Call::Update(selector, modifier) = backend.last() else {
            panic!("expected an update");
        };
        assert_eq!(selector, doc! { "_id": "doc1" });
        assert_eq!(modifier.set_fields().get("deleted"), Some(&Bson::Boolean(true)));
        assert!(matches!(modifier.set_fields().get("deletedAt"), Some(Bson::DateTime(_))));
        assert!(matches!(modifier.set_fields().get("updatedAt"), Some(Bson::DateTime(_))));

        test.remove(doc! { "_id": "doc1" }, RemoveOptions::physical()).await.unwrap();
        assert_eq!(backend.last(), Call::Remove(doc! { "_id": "doc1" }));
    }

    #[tokio::test]
    async fn test_recover_unsets_deleted_at() {
        let backend = RecordingBackend::default();
        let config = ConfigStore::default();
        let test = SoftCollection::new("test".into(), &backend, &config);

        test.recover(vec!["a", "b"]).await.unwrap();

        let Call::Update(selector, modifier) = backend.last() else {
            panic!("expected an update");
        };
        assert_eq!(selector, doc! { "_id": { "$in": ["a", "b"] } });
        assert_eq!(modifier.set_fields().get("deleted"), Some(&Bson::Boolean(false)));
        assert_eq!(modifier.unset_fields(), ["deletedAt".to_string()]);
    }
}
