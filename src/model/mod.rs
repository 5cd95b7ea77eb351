//! Managed object model.
//!
//! - [`schema`] - Entity descriptions loaded from `<name>.model.json`
//! - [`record`] - Objects and their identifiers
//! - [`mapping`] - Lightweight mappings between model versions

pub mod mapping;
pub mod record;
pub mod schema;

pub use mapping::{EntityMapping, MappingModel};
pub use record::{ObjectId, Record};
pub use schema::{Attribute, AttributeType, Entity, Relationship, Schema};
