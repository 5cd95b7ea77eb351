//! Count stored objects.

use crate::cli::commands::open_coordinator;
use crate::config::StoreConfig;
use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct CountOutput<'a> {
    entity: &'a str,
    count: usize,
}

/// # Errors
///
/// Returns setup errors or an unknown-entity error.
pub fn execute(config: &StoreConfig, entity: &str, json: bool) -> Result<()> {
    let coordinator = open_coordinator(config);
    let count = coordinator.background_context()?.count(entity)?;
    coordinator.close()?;

    if json {
        println!("{}", serde_json::to_string(&CountOutput { entity, count })?);
    } else {
        println!("{count}");
    }
    Ok(())
}
