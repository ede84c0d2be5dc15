use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, Bson, doc};
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions as MongoFindOptions},
};
use softdoc_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    mutation::Modifier,
    query::{FindOptions, SortDirection},
    selector::ID_FIELD,
};
use tracing::{debug, info};

const DUPLICATE_KEY: i32 = 11000;


#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

/// Translates read options into driver options. The deletion filter flag never
/// reaches the server.
fn find_options(options: &FindOptions) -> MongoFindOptions {
    let mut find_options = MongoFindOptions::default();

    if let Some(limit) = options.limit.filter(|&limit| limit > 0) {
        find_options.limit = Some(limit as i64);
    }
    if let Some(skip) = options.skip {
        find_options.skip = Some(skip as u64);
    }
    if let Some(sort) = &options.sort {
        find_options.sort = Some(doc! {
            sort.field.clone(): match sort.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            }
        })
    }

    find_options
}

fn is_duplicate_key(error: &MongoError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}

fn backend_error(error: MongoError) -> DocumentStoreError {
    DocumentStoreError::Backend(error.to_string())
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_document(&self, document: Document, collection: &str) -> DocumentStoreResult<Bson> {
        let id = document.get(ID_FIELD).cloned();

        match self.get_collection(collection).insert_one(document).await {
            Ok(result) => Ok(result.inserted_id),
            Err(e) if is_duplicate_key(&e) => Err(DocumentStoreError::DocumentAlreadyExists(
                id.map(|id| id.to_string()).unwrap_or_default(),
                collection.to_string(),
            )),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn update_documents(&self, selector: Document, modifier: Modifier, collection: &str) -> DocumentStoreResult<u64> {
        // The server rejects an empty update document.
        if modifier.is_empty() {
            return self.count_documents(selector, collection).await;
        }

        Ok(
            self.get_collection(collection)
                .update_many(selector, modifier.to_document())
                .await
                .map_err(backend_error)?
                .matched_count
        )
    }

    async fn remove_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(selector)
                .await
                .map_err(backend_error)?
                .deleted_count
        )
    }

    async fn find_documents(&self, selector: Document, options: FindOptions, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(collection)
            .find(selector)
            .with_options(find_options(&options))
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn find_one_document(&self, selector: Document, options: FindOptions, collection: &str) -> DocumentStoreResult<Option<Document>> {
        let mut find_options = find_options(&options);
        find_options.limit = Some(1);

        Ok(
            self.get_collection(collection)
                .find(selector)
                .with_options(find_options)
                .await
                .map_err(backend_error)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(backend_error)?
                .into_iter()
                .next()
        )
    }

    async fn count_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(selector)
            .await
            .map_err(backend_error)
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(backend_error)?;

        names.sort();

        Ok(names)
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(backend_error)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        debug!(database = %self.database, "shutting down mongodb client");
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        info!(database = %self.database, "mongodb client created");

        Ok(MongoDbStore::new(client, self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_options_translation() {
        let options = FindOptions::builder()
            .filter(false)
            .limit(10)
            .skip(5)
            .sort("name", SortDirection::Desc)
            .build();

        let translated = find_options(&options);

        assert_eq!(translated.limit, Some(10));
        assert_eq!(translated.skip, Some(5));
        assert_eq!(translated.sort, Some(doc! { "name": -1 }));

        let translated = find_options(&FindOptions::new());
        assert_eq!(translated.limit, None);
        assert_eq!(translated.sort, None);

        let translated = find_options(&FindOptions::builder().limit(0).build());
        assert_eq!(translated.limit, None);
    }
}
