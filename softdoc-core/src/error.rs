//! Error types and result types for soft-delete store operations.
//!
//! Configuration problems are reported through [`ConfigError`]; everything the host
//! store reports is carried by [`DocumentStoreError`] and surfaces unchanged.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Errors raised while merging or validating a soft-delete configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration input could not be read (wrong value type, unknown key, not an object).
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    /// A field name is unusable as a document key.
    /// The first argument is the setting, the second the rejected name.
    #[error("Invalid field name for {0}: {1:?}")]
    FieldName(&'static str, String),
    /// Two soft-delete settings resolve to the same document field.
    #[error("Settings {0} and {1} both use the field {2:?}")]
    FieldCollision(&'static str, &'static str, String),
}

/// Represents all possible errors that can occur when interacting with a document store.
///
/// Host store failures are never retried or rewritten by the soft-delete layer.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The selector uses an operator or shape the store cannot evaluate.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// The soft-delete configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
