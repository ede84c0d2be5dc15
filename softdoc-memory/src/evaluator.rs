//! Selector evaluation for in-memory document filtering.
//!
//! Selector documents are parsed into an [`Expr`] once per call and then visited
//! against each stored document. Field paths may be dotted to reach into nested
//! documents.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use softdoc_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::{DocumentStoreError, DocumentStoreResult},
};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `1_i32` and `1_i64` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// String value
    String(&'a str),
    /// ObjectId value
    ObjectId(ObjectId),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other BSON value, compared structurally
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the cross-type sort order: null, numbers,
    /// strings, documents, arrays, binary, object ids, booleans, dates,
    /// timestamps, then regular expressions.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
            Comparable::Other(bson) => match bson {
                Bson::MinKey => 0,
                Bson::Undefined => 1,
                Bson::Symbol(_) => 3,
                Bson::Binary(_) => 6,
                Bson::Timestamp(_) => 10,
                Bson::RegularExpression(_) => 11,
                Bson::MaxKey => 13,
                _ => 12,
            },
        }
    }

    /// Total order used for sorting. Values of different types order by type
    /// rank; values of the same type order by value, arrays element by element.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.type_rank()
            .cmp(&other.type_rank())
            .then_with(|| match (self, other) {
                (Comparable::Array(a), Comparable::Array(b)) => a
                    .iter()
                    .zip(b)
                    .map(|(left, right)| left.sort_cmp(right))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or_else(|| a.len().cmp(&b.len())),
                (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
                (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
                _ => self.partial_cmp(other).unwrap_or(Ordering::Equal),
            })
    }

    /// Equality with array fields matching when any element is equal.
    fn matches(&self, value: &Comparable<'_>) -> bool {
        match self {
            Comparable::Array(items) if !matches!(value, Comparable::Array(_)) => {
                items.iter().any(|item| item == value)
            }
            _ => self == value,
        }
    }
}

/// Resolves a possibly dotted field path inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Parses a selector document and returns the indices of the matching documents.
    pub fn matching<'d>(
        documents: impl IntoIterator<Item = &'d Document>,
        selector: &Document,
    ) -> DocumentStoreResult<Vec<usize>> {
        let expr = Expr::from_selector(selector)?;
        let mut matched = Vec::new();

        for (index, document) in documents.into_iter().enumerate() {
            if DocumentEvaluator::new(document).evaluate(&expr)? {
                matched.push(index);
            }
        }

        Ok(matched)
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let expected = Comparable::from(value);

        let Some(field_value) = lookup(self.document, field) else {
            // A missing field behaves like null.
            return Ok(match op {
                FieldOp::Eq => expected == Comparable::Null,
                FieldOp::Ne => expected != Comparable::Null,
                FieldOp::AnyOf => match &expected {
                    Comparable::Array(values) => values.contains(&Comparable::Null),
                    _ => false,
                },
                FieldOp::NoneOf => match &expected {
                    Comparable::Array(values) => !values.contains(&Comparable::Null),
                    _ => true,
                },
                _ => false,
            });
        };

        let actual = Comparable::from(field_value);

        Ok(match op {
            FieldOp::Eq => actual.matches(&expected),
            FieldOp::Ne => !actual.matches(&expected),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match actual.partial_cmp(&expected) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
            FieldOp::AnyOf => match &expected {
                Comparable::Array(values) => values.iter().any(|val| actual.matches(val)),
                single_value => actual.matches(single_value),
            },
            FieldOp::NoneOf => match &expected {
                Comparable::Array(values) => !values.iter().any(|val| actual.matches(val)),
                single_value => !actual.matches(single_value),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn eval(document: &Document, selector: Document) -> bool {
        let expr = Expr::from_selector(&selector).unwrap();
        DocumentEvaluator::new(document).evaluate(&expr).unwrap()
    }

    #[test]
    fn test_deletion_filter() {
        let live = doc! { "_id": "doc1", "deleted": false };
        let gone = doc! { "_id": "doc2", "deleted": true };
        let legacy = doc! { "_id": "doc3" };

        assert!(eval(&live, doc! { "deleted": false }));
        assert!(!eval(&gone, doc! { "deleted": false }));
        assert!(!eval(&legacy, doc! { "deleted": false }));
        assert!(eval(&legacy, doc! { "deleted": { "$ne": true } }));
        assert!(eval(&gone, doc! { "_id": "doc2", "deleted": true }));
    }

    #[test]
    fn test_numbers_compare_across_widths() {
        let dog = doc! { "age": 3_i64 };

        assert!(eval(&dog, doc! { "age": 3_i32 }));
        assert!(eval(&dog, doc! { "age": { "$gte": 2.5, "$lt": 4 } }));
        assert!(!eval(&dog, doc! { "age": { "$gt": "2" } }));
    }

    #[test]
    fn test_membership_and_arrays() {
        let dog = doc! { "_id": "b", "tags": ["good", "small"] };

        assert!(eval(&dog, doc! { "_id": { "$in": ["a", "b"] } }));
        assert!(!eval(&dog, doc! { "_id": { "$nin": ["a", "b"] } }));
        assert!(eval(&dog, doc! { "tags": "good" }));
        assert!(eval(&dog, doc! { "tags": { "$in": ["large", "small"] } }));
        assert!(eval(&doc! {}, doc! { "tags": { "$nin": ["good"] } }));
    }

    #[test]
    fn test_dotted_paths_and_exists() {
        let dog = doc! { "owner": { "name": "bob" }, "deletedAt": Bson::Null };

        assert!(eval(&dog, doc! { "owner.name": "bob" }));
        assert!(!eval(&dog, doc! { "owner.age": { "$exists": true } }));
        assert!(eval(&dog, doc! { "deletedAt": { "$exists": 1 } }));
        assert!(eval(&dog, doc! { "missing": Bson::Null }));
    }

    #[test]
    fn test_sort_order_ranks_types_first() {
        let values = [
            Bson::from("b"),
            Bson::from(2),
            Bson::Null,
            Bson::from(true),
            Bson::from("a"),
            Bson::from(1.5),
            Bson::from(vec![Bson::from(1)]),
        ];
        let mut sorted = values.iter().map(Comparable::from).collect::<Vec<_>>();
        sorted.sort_by(|a, b| a.sort_cmp(b));

        assert_eq!(
            sorted,
            vec![
                Comparable::Null,
                Comparable::Number(1.5),
                Comparable::Number(2.0),
                Comparable::String("a"),
                Comparable::String("b"),
                Comparable::Array(vec![Comparable::Number(1.0)]),
                Comparable::Bool(true),
            ]
        );

        let one = Bson::from(1);
        let word = Bson::from("1");
        assert_eq!(Comparable::from(&one).sort_cmp(&Comparable::from(&word)), Ordering::Less);
        assert_eq!(Comparable::from(&word).sort_cmp(&Comparable::from(&one)), Ordering::Greater);
    }

    #[test]
    fn test_logical_operators() {
        let dog = doc! { "name": "fido", "age": 3 };

        assert!(eval(&dog, doc! { "$or": [{ "name": "rex" }, { "age": 3 }] }));
        assert!(!eval(&dog, doc! { "$nor": [{ "name": "fido" }] }));
        assert!(eval(&dog, doc! { "age": { "$not": { "$gt": 5 } } }));
    }
}
