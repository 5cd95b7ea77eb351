//! List stored objects.

use crate::cli::commands::open_coordinator;
use crate::config::StoreConfig;
use crate::error::Result;
use colored::Colorize;

/// Print every stored object of `entity`, read through the background
/// context.
///
/// # Errors
///
/// Returns setup errors or an unknown-entity error.
pub fn execute(config: &StoreConfig, entity: &str, json: bool) -> Result<()> {
    let coordinator = open_coordinator(config);
    let records = coordinator.background_context()?.fetch(entity)?;
    coordinator.close()?;

    if json {
        println!("{}", serde_json::to_string(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No {entity} objects.");
        return Ok(());
    }
    for record in &records {
        println!(
            "{}  {}",
            record.id.to_string().dimmed(),
            serde_json::to_string(&record.attributes)?
        );
    }
    println!("{} {}", records.len().to_string().bold(), entity);
    Ok(())
}
