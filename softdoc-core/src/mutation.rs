//! Update modifiers and the soft-delete mutation rules.
//!
//! Removing a document softly is an update: the deletion flag is set and both
//! timestamps are stamped. Recovering clears the flag, refreshes the modification
//! timestamp and drops the deletion timestamp. The functions here build those
//! updates; `SoftCollection` decides when to use them.

use bson::{Bson, DateTime as BsonDateTime, Document};
use chrono::{DateTime, Utc};

use crate::{
    config::{EffectiveConfig, SoftDeleteConfig},
    error::{DocumentStoreError, DocumentStoreResult},
    query::RemoveOptions,
};

/// An update descriptor: fields to set and fields to unset.
///
/// Renders to `{ "$set": {..}, "$unset": {..} }` for stores that speak Mongo update
/// syntax; other stores can apply it directly with [`Modifier::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifier {
    set: Document,
    unset: Vec<String>,
}

impl Modifier {
    /// Creates an empty modifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field` to `value`, cancelling any earlier unset of the same field.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        let field = field.into();
        self.unset.retain(|f| f != &field);
        self.set.insert(field, value.into());
        self
    }

    /// Removes `field`, cancelling any earlier set of the same field.
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.set.remove(&field);
        if !self.unset.contains(&field) {
            self.unset.push(field);
        }
        self
    }

    pub fn set_fields(&self) -> &Document {
        &self.set
    }

    pub fn unset_fields(&self) -> &[String] {
        &self.unset
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Applies the modifier to a stored document in place.
    ///
    /// Dotted fields address nested documents; `$set` creates missing intermediate
    /// documents and `$unset` ignores paths that do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if a `$set` path runs through a
    /// value that is not a document. The target is left unchanged in that case.
    pub fn apply(&self, target: &mut Document) -> DocumentStoreResult<()> {
        let mut updated = target.clone();

        for (field, value) in &self.set {
            set_path(&mut updated, field, field, value.clone())?;
        }

        for field in &self.unset {
            unset_path(&mut updated, field);
        }

        *target = updated;

        Ok(())
    }

    /// Renders the modifier in Mongo update syntax, omitting empty sections.
    pub fn to_document(&self) -> Document {
        let mut update = Document::new();

        if !self.set.is_empty() {
            update.insert("$set", self.set.clone());
        }

        if !self.unset.is_empty() {
            update.insert(
                "$unset",
                self.unset
                    .iter()
                    .map(|field| (field.clone(), Bson::String(String::new())))
                    .collect::<Document>(),
            );
        }

        update
    }

    /// Parses a Mongo update document holding `$set` and/or `$unset`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] for any other update operator or
    /// a replacement-style document.
    pub fn from_document(update: &Document) -> DocumentStoreResult<Self> {
        let mut modifier = Modifier::new();

        for (operator, fields) in update {
            let fields = fields.as_document().ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!("{operator} expects a document"))
            })?;

            match operator.as_str() {
                "$set" => {
                    for (field, value) in fields {
                        modifier = modifier.set(field.clone(), value.clone());
                    }
                }
                "$unset" => {
                    for field in fields.keys() {
                        modifier = modifier.unset(field.clone());
                    }
                }
                other => {
                    return Err(DocumentStoreError::InvalidDocument(format!(
                        "unsupported update operator {other}"
                    )));
                }
            }
        }

        Ok(modifier)
    }
}

fn set_path(target: &mut Document, full: &str, path: &str, value: Bson) -> DocumentStoreResult<()> {
    let Some((head, rest)) = path.split_once('.') else {
        target.insert(path, value);
        return Ok(());
    };

    if !target.contains_key(head) {
        target.insert(head, Document::new());
    }

    match target.get_mut(head) {
        Some(Bson::Document(inner)) => set_path(inner, full, rest, value),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "cannot set {full}: {head} is {}",
            other.map(|v| v.to_string()).unwrap_or_default()
        ))),
    }
}

fn unset_path(target: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            target.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = target.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

/// How a `remove` call is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveStrategy {
    /// Delete the documents from the host store.
    Physical,
    /// Flag the documents as deleted.
    Soft,
}

/// Decides between a physical and a soft remove.
///
/// Excluded collections, `soft: false`, and a disabled `override_remove` all lead to a
/// physical delete; `soft: true` asks for a flagging update even when `override_remove`
/// is off.
pub fn remove_strategy(effective: &EffectiveConfig, options: &RemoveOptions) -> RemoveStrategy {
    match (effective.active(), options.soft) {
        (None, _) | (Some(_), Some(false)) => RemoveStrategy::Physical,
        (Some(_), Some(true)) => RemoveStrategy::Soft,
        (Some(config), None) if config.override_remove => RemoveStrategy::Soft,
        (Some(_), None) => RemoveStrategy::Physical,
    }
}

/// Sets the deletion flag to `false` unless the document already defines it.
///
/// Returns `true` if the flag was added.
pub fn apply_insert_defaults(doc: &mut Document, config: &SoftDeleteConfig) -> bool {
    if doc.contains_key(&config.deleted_field) {
        return false;
    }

    doc.insert(config.deleted_field.clone(), false);

    true
}

/// The update that soft deletes a document at `now`.
pub fn soft_remove_modifier(config: &SoftDeleteConfig, now: DateTime<Utc>) -> Modifier {
    let now = BsonDateTime::from_chrono(now);

    Modifier::new()
        .set(config.deleted_field.clone(), true)
        .set(config.deleted_at_field.clone(), now)
        .set(config.updated_at_field.clone(), now)
}

/// The update that recovers a soft-deleted document at `now`.
pub fn recover_modifier(config: &SoftDeleteConfig, now: DateTime<Utc>) -> Modifier {
    Modifier::new()
        .set(config.deleted_field.clone(), false)
        .set(config.updated_at_field.clone(), BsonDateTime::from_chrono(now))
        .unset(config.deleted_at_field.clone())
}
