//! Bulk import through the import context.

use crate::cli::commands::open_coordinator;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

#[derive(Serialize)]
struct ImportOutput<'a> {
    entity: &'a str,
    imported: usize,
    batches: usize,
}

/// Read one JSON object per non-blank line and insert them, saving every
/// `batch_size` objects.
///
/// A failing batch stops the import; earlier batches stay committed.
///
/// # Errors
///
/// Returns setup errors, `InvalidArgument` for malformed lines, or the
/// first failing save.
pub fn execute(
    config: &StoreConfig,
    entity: &str,
    file: &Path,
    batch_size: usize,
    json: bool,
) -> Result<()> {
    if batch_size == 0 {
        return Err(Error::InvalidArgument("--batch-size must be at least 1".to_string()));
    }

    let coordinator = open_coordinator(config);
    coordinator.schema()?.require_entity(entity)?;
    let import = coordinator.import_context()?;

    let reader = BufReader::new(std::fs::File::open(file)?);
    let mut imported = 0;
    let mut batches = 0;
    let mut pending = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| {
            Error::InvalidArgument(format!("{}:{}: {e}", file.display(), index + 1))
        })?;
        if !value.is_object() {
            return Err(Error::InvalidArgument(format!(
                "{}:{}: expected a JSON object",
                file.display(),
                index + 1
            )));
        }

        import.insert(entity, value)?;
        pending += 1;
        if pending == batch_size {
            imported += import.save()?;
            batches += 1;
            pending = 0;
            debug!(imported, "Import batch saved");
        }
    }
    if pending > 0 {
        imported += import.save()?;
        batches += 1;
    }
    coordinator.close()?;
    info!(entity, imported, batches, "Import complete");

    if json {
        println!(
            "{}",
            serde_json::to_string(&ImportOutput {
                entity,
                imported,
                batches
            })?
        );
    } else {
        println!("{} {imported} {entity} objects", "Imported".green());
    }
    Ok(())
}
