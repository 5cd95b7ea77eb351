//! Insert an object through the main context.

use crate::cli::commands::{ensure_flushed, open_coordinator};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::model::{AttributeType, Entity};
use colored::Colorize;
use serde_json::{Map, Value};

/// Parse `key=value` assignments against the entity description.
///
/// String and date attributes take the raw text; everything else is
/// read as JSON (`true`, `42`, `["<id>"]`).
///
/// # Errors
///
/// Returns `InvalidArgument` for malformed assignments or values.
pub fn parse_assignments(entity: &Entity, pairs: &[String]) -> Result<Map<String, Value>> {
    let mut attributes = Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| Error::InvalidArgument(format!("expected KEY=VALUE, got '{pair}'")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::InvalidArgument(format!("empty key in '{pair}'")));
        }

        let takes_text = entity
            .attribute(key)
            .is_some_and(|a| matches!(a.kind, AttributeType::String | AttributeType::Date))
            || (entity.relationship(key).is_some_and(|r| !r.to_many));
        let value = if takes_text {
            Value::String(raw.to_string())
        } else {
            serde_json::from_str(raw).map_err(|e| {
                Error::InvalidArgument(format!("value for '{key}' is not valid JSON: {e}"))
            })?
        };
        attributes.insert(key.to_string(), value);
    }
    Ok(attributes)
}

/// Insert, save the main context, then flush to disk.
///
/// # Errors
///
/// Returns setup errors, `InvalidArgument`, `Validation`, or a flush error.
pub fn execute(config: &StoreConfig, entity: &str, pairs: &[String], json: bool) -> Result<()> {
    let coordinator = open_coordinator(config);
    let schema = coordinator.schema()?;
    let attributes = parse_assignments(schema.require_entity(entity)?, pairs)?;

    let main = coordinator.main_context()?;
    let record = main.insert(entity, Value::Object(attributes))?;
    main.save()?;
    let report = coordinator.close()?;
    ensure_flushed(&report)?;

    if json {
        println!("{}", serde_json::to_string(&record)?);
    } else {
        println!("{} {} {}", "Added".green(), record.entity.bold(), record.id);
    }
    Ok(())
}
