//! Host store abstraction.
//!
//! The soft-delete layer never touches storage itself. It forwards every call to a
//! [`StoreBackend`], the native operation surface of the host document store: insert,
//! physical remove, update, find and find-one against a named collection.
//!
//! # Overview
//!
//! Selectors reach the backend already normalized into Mongo-style selector
//! documents (see [`crate::selector::Selector::normalize`]) and updates as a
//! [`Modifier`]. Backends report affected counts so that soft and physical removes
//! share the same contract.
//!
//! # Examples
//!
//! ```ignore
//! use softdoc::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let id = backend.insert_document(doc! { "_id": "doc1", "name": "Alice" }, "users").await?;
//! let count = backend.remove_documents(doc! { "_id": id }, "users").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{error::DocumentStoreResult, mutation::Modifier, query::FindOptions};

/// Native operations of a host document store.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and support concurrent access from multiple
/// async tasks.
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Errors are surfaced to callers unchanged by the soft-delete layer.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts a document into a collection and returns its primary key.
    ///
    /// If the document has no `_id`, the backend assigns one. Inserting a duplicate key
    /// fails with [`DocumentStoreError::DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists).
    async fn insert_document(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson>;

    /// Applies a modifier to every document matching the selector.
    ///
    /// Returns the number of matched documents; zero when nothing matches.
    async fn update_documents(
        &self,
        selector: Document,
        modifier: Modifier,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Physically deletes every document matching the selector.
    ///
    /// Returns the number of deleted documents; zero when nothing matches.
    async fn remove_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64>;

    /// Returns the documents matching the selector, honoring sort, skip and limit.
    ///
    /// `options.filter` is meaningless to a host store and is ignored.
    async fn find_documents(
        &self,
        selector: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Returns the first document matching the selector, if any.
    async fn find_one_document(
        &self,
        selector: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let options = FindOptions {
            limit: Some(1),
            ..options
        };

        Ok(self
            .find_documents(selector, options, collection)
            .await?
            .into_iter()
            .next())
    }

    /// Counts the documents matching the selector.
    async fn count_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        Ok(self
            .find_documents(selector, FindOptions::default(), collection)
            .await?
            .len() as u64)
    }

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Drops a collection and all its documents.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_document(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        (*self).insert_document(document, collection).await
    }

    async fn update_documents(
        &self,
        selector: Document,
        modifier: Modifier,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        (*self)
            .update_documents(selector, modifier, collection)
            .await
    }

    async fn remove_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        (*self).remove_documents(selector, collection).await
    }

    async fn find_documents(
        &self,
        selector: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        (*self)
            .find_documents(selector, options, collection)
            .await
    }

    async fn find_one_document(
        &self,
        selector: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        (*self)
            .find_one_document(selector, options, collection)
            .await
    }

    async fn count_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        (*self).count_documents(selector, collection).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (*self).list_collections().await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        (*self).drop_collection(name).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
