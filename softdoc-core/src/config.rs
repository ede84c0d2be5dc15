//! Soft-delete configuration and the store that publishes it.
//!
//! A [`SoftDeleteConfig`] is an immutable value. [`ConfigStore::configure`] merges a
//! [`ConfigPatch`] into the current value and swaps the result in atomically, so an
//! operation that already took a snapshot keeps using it until it completes.
//!
//! # Example
//!
//! ```ignore
//! use softdoc::config::{ConfigPatch, ConfigStore};
//!
//! let store = ConfigStore::default();
//! store.configure(&ConfigPatch::new().deleted_field("isDeleted").exclude(["dogs"]))?;
//!
//! assert_eq!(store.snapshot().deleted_field, "isDeleted");
//! assert!(store.snapshot().is_excluded("dogs"));
//! ```

use std::{collections::BTreeSet, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ConfigError;

/// Default name of the deletion flag field.
pub const DEFAULT_DELETED_FIELD: &str = "deleted";
/// Default name of the deletion timestamp field.
pub const DEFAULT_DELETED_AT_FIELD: &str = "deletedAt";
/// Default name of the modification timestamp field.
pub const DEFAULT_UPDATED_AT_FIELD: &str = "updatedAt";

const ID_FIELD: &str = "_id";

/// Process-wide soft-delete settings.
///
/// Serialized with the historical key names (`deleted`, `deletedAt`, `updatedAt`,
/// `autoFilter`, `overrideRemove`, `exclude`); the `*Field` spellings are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoftDeleteConfig {
    /// Name of the boolean deletion flag.
    #[serde(rename = "deleted", alias = "deletedField")]
    pub deleted_field: String,
    /// Name of the timestamp set while a document is deleted.
    #[serde(rename = "deletedAt", alias = "deletedAtField")]
    pub deleted_at_field: String,
    /// Name of the timestamp refreshed on every deletion-state transition.
    #[serde(rename = "updatedAt", alias = "updatedAtField")]
    pub updated_at_field: String,
    /// Whether reads are constrained to non-deleted documents by default.
    pub auto_filter: bool,
    /// Whether `remove` is redirected to a soft flagging update by default.
    pub override_remove: bool,
    /// Collections exempt from every implicit soft-delete behavior.
    pub exclude: BTreeSet<String>,
}

impl Default for SoftDeleteConfig {
    fn default() -> Self {
        Self {
            deleted_field: DEFAULT_DELETED_FIELD.to_string(),
            deleted_at_field: DEFAULT_DELETED_AT_FIELD.to_string(),
            updated_at_field: DEFAULT_UPDATED_AT_FIELD.to_string(),
            auto_filter: true,
            override_remove: true,
            exclude: BTreeSet::new(),
        }
    }
}

impl SoftDeleteConfig {
    /// Returns `true` if the collection is on the exclusion list.
    pub fn is_excluded(&self, collection: &str) -> bool {
        self.exclude.contains(collection)
    }

    /// Returns a copy of this configuration with the patch applied.
    ///
    /// Fields the patch leaves unset keep their current value. `exclude` is replaced as a
    /// whole, never unioned.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the merged configuration fails [`validate`](Self::validate).
    pub fn merge(&self, patch: &ConfigPatch) -> Result<Self, ConfigError> {
        let merged = Self {
            deleted_field: patch
                .deleted_field
                .clone()
                .unwrap_or_else(|| self.deleted_field.clone()),
            deleted_at_field: patch
                .deleted_at_field
                .clone()
                .unwrap_or_else(|| self.deleted_at_field.clone()),
            updated_at_field: patch
                .updated_at_field
                .clone()
                .unwrap_or_else(|| self.updated_at_field.clone()),
            auto_filter: patch.auto_filter.unwrap_or(self.auto_filter),
            override_remove: patch.override_remove.unwrap_or(self.override_remove),
            exclude: patch
                .exclude
                .clone()
                .unwrap_or_else(|| self.exclude.clone()),
        };

        merged.validate()?;

        Ok(merged)
    }

    /// Checks that the three field names are usable and do not collide.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FieldName`] for an empty name, the primary key, a name
    /// starting with `$` or containing `.`, and [`ConfigError::FieldCollision`] when two
    /// settings name the same field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("deleted", &self.deleted_field),
            ("deletedAt", &self.deleted_at_field),
            ("updatedAt", &self.updated_at_field),
        ];

        for (setting, name) in fields {
            if name.is_empty() || name == ID_FIELD || name.starts_with('$') || name.contains('.') {
                return Err(ConfigError::FieldName(setting, name.clone()));
            }
        }

        for (i, (left, left_name)) in fields.iter().enumerate() {
            for (right, right_name) in &fields[i + 1..] {
                if left_name == right_name {
                    return Err(ConfigError::FieldCollision(*left, *right, left_name.to_string()));
                }
            }
        }

        Ok(())
    }
}

/// A partial configuration; unset fields keep their current value when merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigPatch {
    #[serde(rename = "deleted", alias = "deletedField", default, skip_serializing_if = "Option::is_none")]
    pub deleted_field: Option<String>,
    #[serde(rename = "deletedAt", alias = "deletedAtField", default, skip_serializing_if = "Option::is_none")]
    pub deleted_at_field: Option<String>,
    #[serde(rename = "updatedAt", alias = "updatedAtField", default, skip_serializing_if = "Option::is_none")]
    pub updated_at_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_filter: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_remove: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<BTreeSet<String>>,
}

impl ConfigPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a patch from a JSON object using the historical key names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the value is not an object, holds an unknown key,
    /// or a value of the wrong type (e.g. a string where a boolean is expected).
    pub fn from_json(value: Value) -> Result<Self, ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::Invalid(format!(
                "expected a configuration object, got {value}"
            )));
        }

        serde_json::from_value(value).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn deleted_field(mut self, name: impl Into<String>) -> Self {
        self.deleted_field = Some(name.into());
        self
    }

    pub fn deleted_at_field(mut self, name: impl Into<String>) -> Self {
        self.deleted_at_field = Some(name.into());
        self
    }

    pub fn updated_at_field(mut self, name: impl Into<String>) -> Self {
        self.updated_at_field = Some(name.into());
        self
    }

    pub fn auto_filter(mut self, enabled: bool) -> Self {
        self.auto_filter = Some(enabled);
        self
    }

    pub fn override_remove(mut self, enabled: bool) -> Self {
        self.override_remove = Some(enabled);
        self
    }

    pub fn exclude<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(collections.into_iter().map(Into::into).collect());
        self
    }
}

/// The configuration that applies to one collection at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectiveConfig {
    /// The collection is excluded; every interceptor passes calls straight through.
    Bypassed,
    /// Soft-delete behavior applies with this snapshot.
    Active(Arc<SoftDeleteConfig>),
}

impl EffectiveConfig {
    /// Returns the snapshot if soft-delete behavior applies.
    pub fn active(&self) -> Option<&SoftDeleteConfig> {
        match self {
            EffectiveConfig::Bypassed => None,
            EffectiveConfig::Active(config) => Some(config),
        }
    }
}

/// Holder of the current configuration.
///
/// Readers clone an `Arc` snapshot; writers replace it wholesale. No lock is held
/// beyond the clone, so snapshots can be carried across `.await` points.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: RwLock<Arc<SoftDeleteConfig>>,
}

impl ConfigStore {
    /// Creates a store holding the given configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn new(config: SoftDeleteConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// Returns the current configuration snapshot.
    pub fn snapshot(&self) -> Arc<SoftDeleteConfig> {
        self.current.read().clone()
    }

    /// Merges a patch into the current configuration.
    ///
    /// Calls issued after this returns observe the new configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the merged configuration is invalid; the current
    /// configuration is left untouched in that case.
    pub fn configure(&self, patch: &ConfigPatch) -> Result<(), ConfigError> {
        let mut current = self.current.write();

        let merged = current
            .merge(patch)
            .inspect_err(|err| warn!(error = %err, "rejected soft-delete configuration"))?;

        if merged != **current {
            info!(
                deleted = %merged.deleted_field,
                deleted_at = %merged.deleted_at_field,
                updated_at = %merged.updated_at_field,
                auto_filter = merged.auto_filter,
                override_remove = merged.override_remove,
                exclude = ?merged.exclude,
                "soft-delete configuration updated"
            );
            *current = Arc::new(merged);
        }

        Ok(())
    }

    /// Resolves the configuration for a collection.
    pub fn effective(&self, collection: &str) -> EffectiveConfig {
        let snapshot = self.snapshot();

        if snapshot.is_excluded(collection) {
            EffectiveConfig::Bypassed
        } else {
            EffectiveConfig::Active(snapshot)
        }
    }
}
