//! Create or open the store.

use crate::cli::commands::open_coordinator;
use crate::config::StoreConfig;
use crate::error::Result;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    store: PathBuf,
    model: String,
    version: u32,
    created: bool,
}

/// Open both store handles, creating the store file if needed.
///
/// # Errors
///
/// Returns any setup error of the coordinator.
pub fn execute(config: &StoreConfig, json: bool) -> Result<()> {
    let coordinator = open_coordinator(config);
    let created = !coordinator.store_path().exists();
    coordinator.initialize()?;
    let schema = coordinator.schema()?;
    coordinator.close()?;

    let output = InitOutput {
        store: coordinator.store_path(),
        model: schema.name.clone(),
        version: schema.version,
        created,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        let verb = if created { "Created" } else { "Opened" };
        println!(
            "{} {} store: {}",
            verb.green(),
            output.model.bold(),
            output.store.display()
        );
    }
    Ok(())
}
