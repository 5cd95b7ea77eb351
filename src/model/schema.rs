//! Schema (managed object model) definitions and loading.
//!
//! A schema is a named, versioned JSON document describing entities, their
//! typed attributes and their relationships. It is loaded once from the
//! resources directory as `<name>.model.json`.

use crate::error::{Error, Result};
use crate::model::record::{ObjectId, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of model resources.
pub const SCHEMA_EXTENSION: &str = "model.json";

/// Type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    String,
    Integer,
    Double,
    Boolean,
    /// RFC 3339 timestamp stored as a string.
    Date,
}

impl AttributeType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Date => "date",
        }
    }

    /// Check whether a non-null JSON value fits this type.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Double => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Date => value
                .as_str()
                .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok()),
        }
    }
}

/// A typed attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: AttributeType,

    #[serde(default)]
    pub optional: bool,

    /// Value filled in on insert when the attribute is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// A relationship from one entity to another.
///
/// To-one relationships hold the destination object id as a string,
/// to-many relationships an array of ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    pub destination: String,

    #[serde(default)]
    pub to_many: bool,

    #[serde(default = "default_true")]
    pub optional: bool,
}

fn default_true() -> bool {
    true
}

/// An entity description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,

    #[serde(default)]
    pub attributes: Vec<Attribute>,

    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Entity {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

/// An immutable, versioned object model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: u32,

    pub entities: Vec<Entity>,
}

fn default_version() -> u32 {
    1
}

/// Path of the model resource for `name` inside `resources_dir`.
#[must_use]
pub fn schema_path(resources_dir: &Path, name: &str) -> PathBuf {
    resources_dir.join(format!("{name}.{SCHEMA_EXTENSION}"))
}

impl Schema {
    /// Load the model named `name` from `resources_dir`.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` if the resource is missing and `InvalidModel`
    /// if it cannot be parsed or fails structural checks.
    pub fn load(resources_dir: &Path, name: &str) -> Result<Self> {
        let path = schema_path(resources_dir, name);
        if !path.is_file() {
            return Err(Error::ModelNotFound { path });
        }

        let contents = std::fs::read_to_string(&path)?;
        let schema = Self::from_json(name, &contents)?;
        debug!(
            model = %schema.name,
            version = schema.version,
            entities = schema.entities.len(),
            path = %path.display(),
            "Loaded model"
        );
        Ok(schema)
    }

    /// Parse and check a model document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidModel` on malformed JSON, a name mismatch, or
    /// structural problems.
    pub fn from_json(expected_name: &str, contents: &str) -> Result<Self> {
        let schema: Self = serde_json::from_str(contents).map_err(|e| Error::InvalidModel {
            name: expected_name.to_string(),
            reason: e.to_string(),
        })?;

        if schema.name != expected_name {
            return Err(Error::InvalidModel {
                name: expected_name.to_string(),
                reason: format!("resource declares model '{}'", schema.name),
            });
        }

        schema.check()?;
        Ok(schema)
    }

    fn check(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidModel {
            name: self.name.clone(),
            reason,
        };

        if self.entities.is_empty() {
            return Err(invalid("model has no entities".to_string()));
        }

        let mut entity_names = HashSet::new();
        for entity in &self.entities {
            if entity.name.trim().is_empty() {
                return Err(invalid("entity with empty name".to_string()));
            }
            if !entity_names.insert(entity.name.as_str()) {
                return Err(invalid(format!("duplicate entity '{}'", entity.name)));
            }
        }

        for entity in &self.entities {
            let mut property_names = HashSet::new();
            for attr in &entity.attributes {
                if !property_names.insert(attr.name.as_str()) {
                    return Err(invalid(format!(
                        "duplicate property '{}.{}'",
                        entity.name, attr.name
                    )));
                }
                if let Some(default) = &attr.default {
                    if !attr.kind.accepts(default) {
                        return Err(invalid(format!(
                            "default of '{}.{}' is not a {}",
                            entity.name,
                            attr.name,
                            attr.kind.as_str()
                        )));
                    }
                }
            }
            for rel in &entity.relationships {
                if !property_names.insert(rel.name.as_str()) {
                    return Err(invalid(format!(
                        "duplicate property '{}.{}'",
                        entity.name, rel.name
                    )));
                }
                if !entity_names.contains(rel.destination.as_str()) {
                    return Err(invalid(format!(
                        "relationship '{}.{}' points to unknown entity '{}'",
                        entity.name, rel.name, rel.destination
                    )));
                }
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Look up an entity, failing with `InvalidArgument` when unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the model has no such entity.
    pub fn require_entity(&self, name: &str) -> Result<&Entity> {
        self.entity(name).ok_or_else(|| {
            Error::InvalidArgument(format!("model '{}' has no entity '{name}'", self.name))
        })
    }

    /// Canonical JSON form, as persisted in the store metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// SHA256 fingerprint of the canonical JSON form.
    ///
    /// Two models with the same hash are treated as identical by the
    /// migration check, regardless of their declared version.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn content_hash(&self) -> Result<String> {
        let json = self.to_json()?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Fill absent attributes that declare a default value.
    ///
    /// # Errors
    ///
    /// Returns an error if the record's entity is unknown.
    pub fn apply_defaults(&self, record: &mut Record) -> Result<()> {
        let entity = self.require_entity(&record.entity)?;
        for attr in &entity.attributes {
            if let Some(default) = &attr.default {
                record
                    .attributes
                    .entry(attr.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        Ok(())
    }

    /// Check a record against its entity description.
    ///
    /// # Errors
    ///
    /// Returns `Validation` describing the first violation found.
    pub fn validate(&self, record: &Record) -> Result<()> {
        let fail = |reason: String| Error::Validation {
            entity: record.entity.clone(),
            id: record.id.to_string(),
            reason,
        };

        let Some(entity) = self.entity(&record.entity) else {
            return Err(fail(format!("unknown entity in model '{}'", self.name)));
        };

        for key in record.attributes.keys() {
            if entity.attribute(key).is_none() && entity.relationship(key).is_none() {
                return Err(fail(format!("unknown property '{key}'")));
            }
        }

        for attr in &entity.attributes {
            match record.attributes.get(&attr.name) {
                None | Some(Value::Null) => {
                    if !attr.optional {
                        return Err(fail(format!("missing required attribute '{}'", attr.name)));
                    }
                }
                Some(value) => {
                    if !attr.kind.accepts(value) {
                        return Err(fail(format!(
                            "attribute '{}' expects {}",
                            attr.name,
                            attr.kind.as_str()
                        )));
                    }
                }
            }
        }

        for rel in &entity.relationships {
            match record.attributes.get(&rel.name) {
                None | Some(Value::Null) => {
                    if !rel.optional {
                        return Err(fail(format!("missing required relationship '{}'", rel.name)));
                    }
                }
                Some(Value::Array(ids)) if rel.to_many => {
                    if !ids.iter().all(is_object_id) {
                        return Err(fail(format!("relationship '{}' holds a bad id", rel.name)));
                    }
                }
                Some(value) if !rel.to_many && is_object_id(value) => {}
                Some(_) => {
                    let shape = if rel.to_many { "an id array" } else { "an id" };
                    return Err(fail(format!("relationship '{}' expects {shape}", rel.name)));
                }
            }
        }

        Ok(())
    }
}

fn is_object_id(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.parse::<ObjectId>().is_ok())
}
