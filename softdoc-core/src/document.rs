//! Typed documents.
//!
//! Any serde type can be stored through a typed collection once it names its
//! collection. Soft-delete fields that the type does not declare are ignored on
//! the way out, so a type does not have to model `deleted` or its timestamps.

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// A serde type stored in a named collection.
///
/// The primary key is whatever the type serializes as `_id`; when it serializes no
/// `_id`, the host store assigns one on insert.
///
/// # Example
///
/// ```ignore
/// use softdoc::document::TypedDocument;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Dog {
///     #[serde(rename = "_id")]
///     pub id: String,
///     pub name: String,
/// }
///
/// impl TypedDocument for Dog {
///     fn collection_name() -> &'static str {
///         "dogs"
///     }
/// }
/// ```
pub trait TypedDocument: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Conversion helpers, implemented for every [`TypedDocument`].
pub trait DocumentExt: TypedDocument {
    /// Converts this document to a BSON document for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the type does not serialize to a map.
    fn to_document(&self) -> DocumentStoreResult<Document>;

    /// Creates a value from a stored BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    fn from_document(document: Document) -> DocumentStoreResult<Self>;

    /// Converts this document to a JSON value.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Creates a value from a JSON value.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl<D: TypedDocument> DocumentExt for D {
    fn to_document(&self) -> DocumentStoreResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(document) => Ok(document),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "{} serialized to {other}, expected a document",
                D::collection_name()
            ))),
        }
    }

    fn from_document(document: Document) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Dog {
        #[serde(rename = "_id")]
        id: String,
        name: String,
    }

    impl TypedDocument for Dog {
        fn collection_name() -> &'static str {
            "dogs"
        }
    }

    #[test]
    fn test_extra_soft_delete_fields_are_ignored() {
        let dog = Dog::from_document(doc! {
            "_id": "1",
            "name": "fido",
            "deleted": true,
            "deletedAt": bson::DateTime::now(),
        })
        .unwrap();

        assert_eq!(dog, Dog { id: "1".into(), name: "fido".into() });
        assert_eq!(dog.to_document().unwrap(), doc! { "_id": "1", "name": "fido" });
    }
}
