//! Persisted objects.
//!
//! A record is one managed object: a stable id, the name of its entity and
//! a JSON map of attribute and relationship values.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a persisted object (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(uuid::Uuid);

impl ObjectId {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidArgument(format!("bad object id '{s}': {e}")))
    }
}

/// A managed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: ObjectId,
    pub entity: String,
    pub attributes: Map<String, Value>,
}

impl Record {
    /// Create a record with a fresh id.
    ///
    /// Non-object `attributes` values yield an empty attribute map.
    #[must_use]
    pub fn new(entity: &str, attributes: Value) -> Self {
        Self::with_id(ObjectId::new(), entity, attributes)
    }

    #[must_use]
    pub fn with_id(id: ObjectId, entity: &str, attributes: Value) -> Self {
        let attributes = match attributes {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id,
            entity: entity.to_string(),
            attributes,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Merge `changes` into the attribute map. `null` values remove keys.
    pub fn apply_changes(&mut self, changes: Map<String, Value>) {
        for (key, value) in changes {
            if value.is_null() {
                self.attributes.remove(&key);
            } else {
                self.attributes.insert(key, value);
            }
        }
    }
}
