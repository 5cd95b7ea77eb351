//! Inferred mapping between two model versions.
//!
//! Lightweight migration only covers changes that can be expressed without
//! user code: added or removed entities, added optional or defaulted
//! attributes, removed properties, and relationship additions/removals.

use crate::error::{Error, Result};
use crate::model::record::Record;
use crate::model::schema::Schema;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Per-entity transformation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityMapping {
    /// Properties present in the source model only.
    pub removed: Vec<String>,
    /// Values to fill when a property is absent after migration.
    pub defaults: Vec<(String, Value)>,
}

impl EntityMapping {
    fn is_identity(&self) -> bool {
        self.removed.is_empty() && self.defaults.is_empty()
    }
}

/// Mapping from a source model to a destination model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingModel {
    pub from_version: u32,
    pub to_version: u32,
    pub entities: HashMap<String, EntityMapping>,
    /// Entities removed from the model; their records are dropped.
    pub dropped_entities: HashSet<String>,
}

impl MappingModel {
    /// Infer the mapping from `source` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns `MappingUnavailable` when a change cannot be migrated
    /// without custom code.
    pub fn infer(source: &Schema, destination: &Schema) -> Result<Self> {
        let unavailable = |reason: String| Error::MappingUnavailable {
            from: source.version,
            to: destination.version,
            reason,
        };

        let mut mapping = Self {
            from_version: source.version,
            to_version: destination.version,
            ..Self::default()
        };

        for old in &source.entities {
            if destination.entity(&old.name).is_none() {
                mapping.dropped_entities.insert(old.name.clone());
            }
        }

        for new in &destination.entities {
            let Some(old) = source.entity(&new.name) else {
                continue;
            };
            let mut entity_mapping = EntityMapping::default();

            for attr in &old.attributes {
                if new.attribute(&attr.name).is_none() {
                    entity_mapping.removed.push(attr.name.clone());
                }
            }
            for rel in &old.relationships {
                if new.relationship(&rel.name).is_none() {
                    entity_mapping.removed.push(rel.name.clone());
                }
            }

            for attr in &new.attributes {
                let was_optional = match old.attribute(&attr.name) {
                    Some(previous) if previous.kind != attr.kind => {
                        return Err(unavailable(format!(
                            "'{}.{}' changed type from {} to {}",
                            new.name,
                            attr.name,
                            previous.kind.as_str(),
                            attr.kind.as_str()
                        )));
                    }
                    Some(previous) => previous.optional,
                    None => true,
                };

                if attr.optional || !was_optional {
                    continue;
                }
                match &attr.default {
                    Some(default) => entity_mapping
                        .defaults
                        .push((attr.name.clone(), default.clone())),
                    None => {
                        return Err(unavailable(format!(
                            "'{}.{}' is required and has no default",
                            new.name, attr.name
                        )));
                    }
                }
            }

            for rel in &new.relationships {
                match old.relationship(&rel.name) {
                    Some(previous)
                        if previous.destination != rel.destination
                            || previous.to_many != rel.to_many =>
                    {
                        return Err(unavailable(format!(
                            "relationship '{}.{}' changed shape",
                            new.name, rel.name
                        )));
                    }
                    Some(previous) if previous.optional && !rel.optional => {
                        return Err(unavailable(format!(
                            "relationship '{}.{}' became required",
                            new.name, rel.name
                        )));
                    }
                    None if !rel.optional => {
                        return Err(unavailable(format!(
                            "new relationship '{}.{}' is required",
                            new.name, rel.name
                        )));
                    }
                    _ => {}
                }
            }

            if !entity_mapping.is_identity() {
                mapping.entities.insert(new.name.clone(), entity_mapping);
            }
        }

        Ok(mapping)
    }

    /// Transform one record. Returns `None` when its entity was dropped.
    #[must_use]
    pub fn apply(&self, mut record: Record) -> Option<Record> {
        if self.dropped_entities.contains(&record.entity) {
            return None;
        }
        if let Some(entity_mapping) = self.entities.get(&record.entity) {
            for key in &entity_mapping.removed {
                record.attributes.remove(key);
            }
            for (key, default) in &entity_mapping.defaults {
                let absent = record.attributes.get(key).is_none_or(Value::is_null);
                if absent {
                    record.attributes.insert(key.clone(), default.clone());
                }
            }
        }
        Some(record)
    }
}
