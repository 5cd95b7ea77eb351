//! Model and store details.

use crate::cli::commands::open_coordinator;
use crate::config::StoreConfig;
use crate::error::Result;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Serialize)]
struct InfoOutput {
    model: String,
    model_version: u32,
    model_hash: String,
    stored_model_version: u32,
    store: PathBuf,
    counts: BTreeMap<String, usize>,
}

/// # Errors
///
/// Returns any setup error of the coordinator.
pub fn execute(config: &StoreConfig, json: bool) -> Result<()> {
    let coordinator = open_coordinator(config);
    let schema = coordinator.schema()?;
    let store = coordinator.primary_store()?;
    let background = coordinator.background_context()?;

    let mut counts = BTreeMap::new();
    for entity in &schema.entities {
        counts.insert(entity.name.clone(), background.count(&entity.name)?);
    }

    let output = InfoOutput {
        model: schema.name.clone(),
        model_version: schema.version,
        model_hash: schema.content_hash()?,
        stored_model_version: store.stored_model_version()?,
        store: store.path().to_path_buf(),
        counts,
    };
    drop(background);
    drop(store);
    coordinator.close()?;

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "Model".cyan().bold());
    println!("  Name:    {}", output.model);
    println!("  Version: {}", output.model_version);
    println!("  Hash:    {}", output.model_hash.dimmed());
    println!("{}", "Store".cyan().bold());
    println!("  Path:    {}", output.store.display());
    println!("  Written with model version {}", output.stored_model_version);
    println!("{}", "Objects".cyan().bold());
    for (entity, count) in &output.counts {
        println!("  {entity:<16} {count}");
    }
    Ok(())
}
