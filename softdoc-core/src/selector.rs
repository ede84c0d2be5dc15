//! Selector shapes and the deletion-status normalizer.
//!
//! Callers may address documents by a bare identifier, a list of identifiers, or a
//! structured Mongo-style selector document. [`Selector::normalize`] folds all three
//! shapes into a single selector document, which is what every host store receives.
//! [`add_deleted`] layers the deletion conjunct on top of that document.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use softdoc::selector::add_deleted;
//!
//! assert_eq!(add_deleted(doc! {}, "deleted"), doc! { "deleted": false });
//! assert_eq!(add_deleted("doc1", "deleted"), doc! { "_id": "doc1", "deleted": false });
//! assert_eq!(
//!     add_deleted(doc! { "deleted": true }, "deleted"),
//!     doc! { "deleted": true },
//! );
//! ```

use bson::{Bson, Document, Uuid, doc, oid::ObjectId};

use crate::query::{Expr, SelectorTranslator, QueryVisitor};
use crate::error::DocumentStoreResult;

/// Name of the primary key field.
pub const ID_FIELD: &str = "_id";

/// A query descriptor identifying zero or more documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// A single primary key.
    Id(Bson),
    /// Any of the listed primary keys.
    Ids(Vec<Bson>),
    /// A structured selector document. Empty matches every document.
    Filter(Document),
}

impl Selector {
    /// A selector matching every document.
    pub fn all() -> Self {
        Selector::Filter(Document::new())
    }

    /// A selector matching the document with this primary key.
    pub fn id(id: impl Into<Bson>) -> Self {
        Selector::Id(id.into())
    }

    /// A selector matching the documents with any of these primary keys.
    pub fn ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        Selector::Ids(ids.into_iter().map(Into::into).collect())
    }

    /// Builds a structured selector from a filter expression.
    ///
    /// # Errors
    ///
    /// Returns an error if the expression cannot be expressed as a selector document.
    pub fn from_expr(expr: &Expr) -> DocumentStoreResult<Self> {
        Ok(Selector::Filter(SelectorTranslator.visit_expr(expr)?))
    }

    /// Returns `true` if the selector constrains `field` at the top level.
    pub fn mentions(&self, field: &str) -> bool {
        match self {
            Selector::Id(_) | Selector::Ids(_) => field == ID_FIELD,
            Selector::Filter(doc) => doc.contains_key(field),
        }
    }

    /// Projects the selector into the structured form the host store expects.
    ///
    /// Identifiers become `{ _id: id }`, identifier lists `{ _id: { $in: ids } }`;
    /// structured selectors are returned as they are.
    pub fn normalize(self) -> Document {
        match self {
            Selector::Id(id) => doc! { ID_FIELD: id },
            Selector::Ids(ids) => doc! { ID_FIELD: { "$in": ids } },
            Selector::Filter(doc) => doc,
        }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Selector::all()
    }
}

impl From<Document> for Selector {
    fn from(doc: Document) -> Self {
        Selector::Filter(doc)
    }
}

impl From<&str> for Selector {
    fn from(id: &str) -> Self {
        Selector::Id(Bson::String(id.to_string()))
    }
}

impl From<String> for Selector {
    fn from(id: String) -> Self {
        Selector::Id(Bson::String(id))
    }
}

impl From<&String> for Selector {
    fn from(id: &String) -> Self {
        Selector::Id(Bson::String(id.clone()))
    }
}

impl From<Uuid> for Selector {
    fn from(id: Uuid) -> Self {
        Selector::Id(id.into())
    }
}

impl From<ObjectId> for Selector {
    fn from(id: ObjectId) -> Self {
        Selector::Id(id.into())
    }
}

impl<T: Into<Bson>> From<Vec<T>> for Selector {
    fn from(ids: Vec<T>) -> Self {
        Selector::ids(ids)
    }
}

impl From<Bson> for Selector {
    fn from(value: Bson) -> Self {
        match value {
            Bson::Document(doc) => Selector::Filter(doc),
            Bson::Array(ids) => Selector::Ids(ids),
            id => Selector::Id(id),
        }
    }
}

/// Adds `deleted_field: false` to a selector unless it already names the field.
///
/// Identifier selectors are normalized first, so the deletion constraint sits next to
/// the identifier match rather than replacing it. An explicit deletion key, `true` or
/// `false`, is never overwritten.
pub fn add_deleted(selector: impl Into<Selector>, deleted_field: &str) -> Document {
    let selector = selector.into();

    if selector.mentions(deleted_field) {
        return selector.normalize();
    }

    let mut doc = selector.normalize();
    doc.insert(deleted_field, false);

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;

    #[test]
    fn test_empty_selector_gets_deleted_false() {
        assert_eq!(add_deleted(Selector::all(), "deleted"), doc! { "deleted": false });
    }

    #[test]
    fn test_explicit_deleted_is_untouched() {
        assert_eq!(
            add_deleted(doc! { "deleted": true }, "deleted"),
            doc! { "deleted": true }
        );
        assert_eq!(
            add_deleted(doc! { "_id": "someId", "deleted": false }, "deleted"),
            doc! { "_id": "someId", "deleted": false }
        );
        assert_eq!(
            add_deleted(doc! { "deleted": { "$exists": true } }, "deleted"),
            doc! { "deleted": { "$exists": true } }
        );
    }

    #[test]
    fn test_id_key_selector_gets_deleted_false() {
        assert_eq!(
            add_deleted(doc! { "_id": "someId" }, "deleted"),
            doc! { "_id": "someId", "deleted": false }
        );
    }

    #[test]
    fn test_bare_ids_are_layered_not_replaced() {
        assert_eq!(
            add_deleted("doc1", "deleted"),
            doc! { "_id": "doc1", "deleted": false }
        );
        assert_eq!(
            add_deleted(vec!["a", "b"], "isDeleted"),
            doc! { "_id": { "$in": ["a", "b"] }, "isDeleted": false }
        );
    }

    #[test]
    fn test_custom_field_name() {
        assert_eq!(
            add_deleted(doc! { "name": "fido", "deleted": true }, "isDeleted"),
            doc! { "name": "fido", "deleted": true, "isDeleted": false }
        );
    }

    #[test]
    fn test_selector_from_bson() {
        assert_eq!(Selector::from(Bson::String("x".into())), Selector::id("x"));
        assert_eq!(
            Selector::from(Bson::Array(vec![Bson::Int32(1)])),
            Selector::Ids(vec![Bson::Int32(1)])
        );
        assert_eq!(Selector::from(Bson::Document(doc! {})), Selector::all());
    }

    #[test]
    fn test_mentions() {
        assert!(Selector::id("x").mentions("_id"));
        assert!(!Selector::id("x").mentions("deleted"));
        assert!(Selector::from(doc! { "deleted": true }).mentions("deleted"));
        assert!(!Selector::ids(["x"]).mentions("deleted"));
    }

    #[test]
    fn test_selector_from_expr() {
        let selector = Selector::from_expr(&Filter::eq("name", "fido").and(Filter::gt("age", 2))).unwrap();

        assert_eq!(
            add_deleted(selector, "deleted"),
            doc! {
                "$and": [{ "name": { "$eq": "fido" } }, { "age": { "$gt": 2 } }],
                "deleted": false,
            }
        );
    }
}
