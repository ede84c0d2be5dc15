//! In-memory storage implementation for soft-delete stores.
//!
//! This module provides a simple in-memory host store that keeps documents in
//! insertion order behind an async-safe read-write lock.

use std::{collections::HashMap, sync::Arc, cmp::Ordering};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document};
use uuid::Uuid;
use tracing::trace;

use softdoc_core::{
    query::{FindOptions, SortDirection},
    error::{DocumentStoreError, DocumentStoreResult},
    backend::{StoreBackend, StoreBackendBuilder},
    mutation::Modifier,
    selector::ID_FIELD,
};

use crate::evaluator::{DocumentEvaluator, Comparable, lookup};

type StoreMap = HashMap<String, Vec<Document>>;


/// Thread-safe in-memory host store.
///
/// Documents are kept per collection in insertion order and every selector is
/// evaluated by scanning the collection.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Example
///
/// ```ignore
/// use softdoc_memory::InMemoryStore;
/// use softdoc::backend::StoreBackend;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = store.insert_document(doc! { "name": "Alice" }, "users").await?;
///     let docs = store.find_documents(doc! { "_id": id }, Default::default(), "users").await?;
///     assert_eq!(docs.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection_name -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use softdoc_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

fn generate_id() -> Bson {
    Bson::String(Uuid::new_v4().simple().to_string())
}

fn compare_field(a: &Document, b: &Document, field: &str) -> Ordering {
    let left = lookup(a, field)
        .map(Comparable::from)
        .unwrap_or(Comparable::Null);
    let right = lookup(b, field)
        .map(Comparable::from)
        .unwrap_or(Comparable::Null);

    left.sort_cmp(&right)
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_document(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        let (id, document) = match document.get(ID_FIELD) {
            Some(id) => (id.clone(), document),
            None => {
                let id = generate_id();
                let mut stored = Document::new();
                stored.insert(ID_FIELD, id.clone());
                for (key, value) in document {
                    stored.insert(key, value);
                }
                (id, stored)
            }
        };

        let mut store = self.store.write().await;
        let documents = store
            .entry(collection.to_string())
            .or_default();

        if documents.iter().any(|doc| doc.get(ID_FIELD) == Some(&id)) {
            return Err(DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
        }

        documents.push(document);
        trace!(collection, id = %id, "inserted document");

        Ok(id)
    }

    async fn update_documents(&self, selector: Document, modifier: Modifier, collection: &str) -> DocumentStoreResult<u64> {
        if modifier.set_fields().contains_key(ID_FIELD) || modifier.unset_fields().iter().any(|f| f == ID_FIELD) {
            return Err(DocumentStoreError::InvalidDocument(format!("{ID_FIELD} cannot be modified")));
        }

        let mut store = self.store.write().await;
        let documents = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(0),
        };

        let matched = DocumentEvaluator::matching(documents.iter(), &selector)?;

        // Build every update first so a failing document leaves the collection untouched.
        let mut updated = Vec::with_capacity(matched.len());
        for &index in &matched {
            let mut document = documents[index].clone();
            modifier.apply(&mut document)?;
            updated.push((index, document));
        }

        for (index, document) in updated {
            documents[index] = document;
        }

        Ok(matched.len() as u64)
    }

    async fn remove_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let documents = match store.get_mut(collection) {
            Some(col) => col,
            None => return Ok(0),
        };

        let matched = DocumentEvaluator::matching(documents.iter(), &selector)?;

        for &index in matched.iter().rev() {
            documents.remove(index);
        }

        Ok(matched.len() as u64)
    }

    async fn find_documents(&self, selector: Document, options: FindOptions, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let documents = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        let mut found = DocumentEvaluator::matching(documents.iter(), &selector)?
            .into_iter()
            .map(|index| &documents[index])
            .collect::<Vec<_>>();

        if let Some(sort) = &options.sort {
            found.sort_by(|a, b| match sort.direction {
                SortDirection::Asc => compare_field(a, b, &sort.field),
                SortDirection::Desc => compare_field(b, a, &sort.field),
            });
        }

        Ok(
            found
                .into_iter()
                .skip(options.skip.unwrap_or(0))
                .take(options.limit.filter(|&limit| limit > 0).unwrap_or(usize::MAX))
                .cloned()
                .collect()
        )
    }

    async fn count_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(documents) => Ok(DocumentEvaluator::matching(documents.iter(), &selector)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self.store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();

        Ok(names)
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use softdoc_memory::InMemoryStore;
/// use softdoc::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn test_insert_assigns_id_and_rejects_duplicates() {
        let store = InMemoryStore::new();

        let id = store.insert_document(doc! { "name": "Alice" }, "users").await.unwrap();
        assert!(matches!(&id, Bson::String(s) if s.len() == 32));

        let found = store.find_documents(doc! {}, FindOptions::new(), "users").await.unwrap();
        assert_eq!(found, vec![doc! { "_id": id, "name": "Alice" }]);

        store.insert_document(doc! { "_id": "doc1" }, "test").await.unwrap();
        assert!(matches!(
            store.insert_document(doc! { "_id": "doc1" }, "test").await,
            Err(DocumentStoreError::DocumentAlreadyExists(_, _))
        ));
    }

    #[tokio::test]
    async fn test_update_and_remove_report_counts() {
        let store = InMemoryStore::new();
        for (id, age) in [("a", 1), ("b", 2), ("c", 3)] {
            store.insert_document(doc! { "_id": id, "age": age }, "dogs").await.unwrap();
        }

        let updated = store
            .update_documents(doc! { "age": { "$gte": 2 } }, Modifier::new().set("old", true), "dogs")
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(store.count_documents(doc! { "old": true }, "dogs").await.unwrap(), 2);

        assert_eq!(store.remove_documents(doc! { "_id": { "$in": ["a", "c"] } }, "dogs").await.unwrap(), 2);
        assert_eq!(store.remove_documents(doc! { "_id": "zzz" }, "dogs").await.unwrap(), 0);
        assert_eq!(store.remove_documents(doc! {}, "nothing").await.unwrap(), 0);
        assert_eq!(
            store.find_documents(doc! {}, FindOptions::new(), "dogs").await.unwrap(),
            vec![doc! { "_id": "b", "age": 2, "old": true }]
        );
    }

    #[tokio::test]
    async fn test_update_rejects_id_change() {
        let store = InMemoryStore::new();
        store.insert_document(doc! { "_id": "a" }, "dogs").await.unwrap();

        assert!(matches!(
            store.update_documents(doc! {}, Modifier::new().set("_id", "b"), "dogs").await,
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }

    #[tokio::test]
    async fn test_find_sorts_skips_and_limits() {
        let store = InMemoryStore::new();
        for (id, age) in [("a", 3), ("b", 1), ("c", 2)] {
            store.insert_document(doc! { "_id": id, "age": age }, "dogs").await.unwrap();
        }

        let options = FindOptions::builder()
            .sort("age", SortDirection::Desc)
            .skip(1)
            .limit(1)
            .build();
        let found = store.find_documents(doc! {}, options, "dogs").await.unwrap();

        assert_eq!(found, vec![doc! { "_id": "c", "age": 2 }]);
        assert_eq!(
            store.find_one_document(doc! { "age": { "$lt": 3 } }, FindOptions::new(), "dogs").await.unwrap(),
            Some(doc! { "_id": "b", "age": 1 })
        );
    }

    #[tokio::test]
    async fn test_sort_across_mixed_types_is_stable() {
        let store = InMemoryStore::new();
        for (id, rank) in [("a", Bson::from("10")), ("b", Bson::from(3)), ("c", Bson::Null), ("d", Bson::from(1))] {
            store.insert_document(doc! { "_id": id, "rank": rank }, "dogs").await.unwrap();
        }
        store.insert_document(doc! { "_id": "e" }, "dogs").await.unwrap();

        let ids = |found: Vec<Document>| {
            found
                .iter()
                .map(|doc| doc.get_str("_id").unwrap().to_string())
                .collect::<Vec<_>>()
        };

        let options = FindOptions::builder().sort("rank", SortDirection::Asc).build();
        let ascending = store.find_documents(doc! {}, options, "dogs").await.unwrap();
        assert_eq!(ids(ascending), vec!["c", "e", "d", "b", "a"]);

        let options = FindOptions::builder().sort("rank", SortDirection::Desc).build();
        let descending = store.find_documents(doc! {}, options, "dogs").await.unwrap();
        assert_eq!(ids(descending), vec!["a", "b", "d", "c", "e"]);
    }

    #[tokio::test]
    async fn test_zero_limit_returns_everything() {
        let store = InMemoryStore::new();
        for id in ["a", "b", "c"] {
            store.insert_document(doc! { "_id": id }, "dogs").await.unwrap();
        }

        let options = FindOptions::builder().limit(0).build();
        assert_eq!(store.find_documents(doc! {}, options, "dogs").await.unwrap().len(), 3);

        let options = FindOptions::builder().skip(1).limit(0).build();
        assert_eq!(store.find_documents(doc! {}, options, "dogs").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_follows_dotted_paths() {
        let store = InMemoryStore::new();
        store.insert_document(doc! { "_id": "a", "meta": { "kind": "x", "size": 2 } }, "dogs").await.unwrap();
        store.insert_document(doc! { "_id": "b", "meta": "flat" }, "dogs").await.unwrap();

        let updated = store
            .update_documents(doc! { "_id": "a" }, Modifier::new().set("meta.kind", "y"), "dogs")
            .await
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(store.count_documents(doc! { "meta.kind": "y" }, "dogs").await.unwrap(), 1);
        assert_eq!(
            store.find_one_document(doc! { "_id": "a" }, FindOptions::new(), "dogs").await.unwrap(),
            Some(doc! { "_id": "a", "meta": { "kind": "y", "size": 2 } })
        );

        // A path through a scalar fails without touching any document
        assert!(matches!(
            store.update_documents(doc! {}, Modifier::new().set("meta.kind", "z"), "dogs").await,
            Err(DocumentStoreError::InvalidDocument(_))
        ));
        assert_eq!(store.count_documents(doc! { "meta.kind": "z" }, "dogs").await.unwrap(), 0);
        assert_eq!(store.count_documents(doc! { "meta": "flat" }, "dogs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_selector_is_reported() {
        let store = InMemoryStore::new();
        store.insert_document(doc! { "_id": "a" }, "dogs").await.unwrap();

        assert!(matches!(
            store.find_documents(doc! { "$where": "true" }, FindOptions::new(), "dogs").await,
            Err(DocumentStoreError::InvalidSelector(_))
        ));
    }

    #[tokio::test]
    async fn test_collections() {
        let store = InMemoryStore::builder().build().await.unwrap();
        store.insert_document(doc! {}, "users").await.unwrap();
        store.insert_document(doc! {}, "dogs").await.unwrap();

        assert_eq!(store.list_collections().await.unwrap(), vec!["dogs".to_string(), "users".to_string()]);

        store.drop_collection("dogs").await.unwrap();
        assert!(matches!(
            store.drop_collection("dogs").await,
            Err(DocumentStoreError::CollectionNotFound(_))
        ));
    }
}
