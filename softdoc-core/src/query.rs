//! Filter expressions, read options and remove options.
//!
//! Selectors travel to host stores as Mongo-style documents. This module provides a
//! typed expression tree ([`Expr`]) that can be parsed from such a document
//! ([`Expr::from_selector`]) or rendered into one ([`SelectorTranslator`]), along with
//! a small builder API for writing selectors in code.
//!
//! # Filter Expression API
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Existence: `exists`, `not_exists`
//! - Membership: `any_of` (`$in`), `none_of` (`$nin`)
//! - Logical: `and`, `or`
//!
//! # Read Options
//!
//! ```ignore
//! use softdoc::query::{FindOptions, SortDirection};
//!
//! let options = FindOptions::builder()
//!     .filter(false)
//!     .sort("name", SortDirection::Asc)
//!     .limit(10)
//!     .build();
//! ```

use bson::{Bson, Document, doc};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (`$eq`).
    Eq,
    /// Not equal to (`$ne`).
    Ne,
    /// Greater than (`$gt`).
    Gt,
    /// Greater than or equal to (`$gte`).
    Gte,
    /// Less than (`$lt`).
    Lt,
    /// Less than or equal to (`$lte`).
    Lte,
    /// Value (or any array element) is one of the values (`$in`).
    AnyOf,
    /// Value (and every array element) is none of the values (`$nin`).
    NoneOf,
}

impl FieldOp {
    /// Returns the selector operator for this comparison.
    pub fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::AnyOf => "$in",
            FieldOp::NoneOf => "$nin",
        }
    }

    fn from_operator(operator: &str) -> Option<Self> {
        Some(match operator {
            "$eq" => FieldOp::Eq,
            "$ne" => FieldOp::Ne,
            "$gt" => FieldOp::Gt,
            "$gte" => FieldOp::Gte,
            "$lt" => FieldOp::Lt,
            "$lte" => FieldOp::Lte,
            "$in" => FieldOp::AnyOf,
            "$nin" => FieldOp::NoneOf,
            _ => return None,
        })
    }
}

/// A filter expression for querying documents.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex filter predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match). Empty matches everything.
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field path to compare (dotted paths address nested documents).
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Parses a Mongo-style selector document.
    ///
    /// Supports implicit equality, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`,
    /// `$nin`, `$exists` and `$not` on fields, and `$and`, `$or`, `$nor` at the top level.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidSelector`] for any other operator or a
    /// malformed operand.
    pub fn from_selector(selector: &Document) -> DocumentStoreResult<Expr> {
        let mut exprs = Vec::with_capacity(selector.len());

        for (key, value) in selector {
            exprs.push(match key.as_str() {
                "$and" => Expr::And(parse_clauses(key, value)?),
                "$or" => Expr::Or(parse_clauses(key, value)?),
                "$nor" => Expr::Or(parse_clauses(key, value)?).not(),
                operator if operator.starts_with('$') => {
                    return Err(DocumentStoreError::InvalidSelector(format!(
                        "unsupported top-level operator {operator}"
                    )));
                }
                field => parse_condition(field, value)?,
            });
        }

        Ok(if exprs.len() == 1 {
            exprs.swap_remove(0)
        } else {
            Expr::And(exprs)
        })
    }
}

fn parse_clauses(operator: &str, value: &Bson) -> DocumentStoreResult<Vec<Expr>> {
    match value {
        Bson::Array(clauses) if !clauses.is_empty() => clauses
            .iter()
            .map(|clause| match clause {
                Bson::Document(doc) => Expr::from_selector(doc),
                other => Err(DocumentStoreError::InvalidSelector(format!(
                    "{operator} expects selector documents, got {other}"
                ))),
            })
            .collect(),
        other => Err(DocumentStoreError::InvalidSelector(format!(
            "{operator} expects a non-empty array, got {other}"
        ))),
    }
}

fn parse_condition(field: &str, value: &Bson) -> DocumentStoreResult<Expr> {
    let operators = match value {
        Bson::Document(doc) if !doc.is_empty() && doc.keys().all(|k| k.starts_with('$')) => doc,
        _ => return Ok(Filter::eq(field, value.clone())),
    };

    let mut exprs = Vec::with_capacity(operators.len());

    for (operator, operand) in operators {
        exprs.push(match operator.as_str() {
            "$exists" => Expr::Exists(field.to_string(), is_truthy(operand)),
            "$not" => parse_condition(field, operand)?.not(),
            "$in" | "$nin" if !matches!(operand, Bson::Array(_)) => {
                return Err(DocumentStoreError::InvalidSelector(format!(
                    "{operator} on {field} expects an array, got {operand}"
                )));
            }
            other => match FieldOp::from_operator(other) {
                Some(op) => Expr::field(field.to_string(), op, operand.clone()),
                None => {
                    return Err(DocumentStoreError::InvalidSelector(format!(
                        "unsupported operator {other} on {field}"
                    )));
                }
            },
        });
    }

    Ok(if exprs.len() == 1 {
        exprs.swap_remove(0)
    } else {
        Expr::And(exprs)
    })
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// Helper struct for constructing filter expressions.
///
/// # Example
///
/// ```ignore
/// use softdoc::query::Filter;
///
/// let expr = Filter::eq("name", "Alice")
///     .and(Filter::gt("age", 18));
/// ```
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the specified value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the specified value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the field is present.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field is missing.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// Combines multiple expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines multiple expressions such that any can match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents where the field (or any of its elements) is one of the values.
    pub fn any_of<I, T>(field: impl Into<String>, values: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        Expr::field(
            field.into(),
            FieldOp::AnyOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Matches documents where the field (and each of its elements) is none of the values.
    pub fn none_of<I, T>(field: impl Into<String>, values: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        Expr::field(
            field.into(),
            FieldOp::NoneOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

/// Renders filter expressions as Mongo-style selector documents.
pub struct SelectorTranslator;

impl QueryVisitor for SelectorTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(Document::new());
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Err(DocumentStoreError::InvalidSelector(
                "an OR expression needs at least one clause".to_string(),
            ));
        }

        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { op.operator(): value.clone() },
        })
    }
}

/// Options accepted by `find` and `find_one`.
///
/// `filter` controls deletion filtering: `None` follows the configured auto-filter,
/// `Some(false)` disables it for this call and `Some(true)` forces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub filter: Option<bool>,
    /// Maximum number of documents to return. `Some(0)` means no limit.
    pub limit: Option<usize>,
    /// Number of documents to skip.
    pub skip: Option<usize>,
    /// Sort specification for results.
    pub sort: Option<Sort>,
}

impl FindOptions {
    /// Options that follow the configured defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that disable deletion filtering for a single call.
    pub fn unfiltered() -> Self {
        Self {
            filter: Some(false),
            ..Self::default()
        }
    }

    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables deletion filtering for this call.
    pub fn filter(mut self, filter: bool) -> Self {
        self.options.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.options.skip = Some(skip);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort = Some(Sort { field: field.into(), direction });
        self
    }

    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// Options accepted by `remove`.
///
/// `soft: Some(false)` requests a physical delete; anything else follows the
/// configured `override_remove`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    pub soft: Option<bool>,
}

impl RemoveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that physically delete the matching documents.
    pub fn physical() -> Self {
        Self { soft: Some(false) }
    }

    /// Options that soft delete the matching documents.
    pub fn soft() -> Self {
        Self { soft: Some(true) }
    }
}
