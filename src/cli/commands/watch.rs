//! Flush on lifecycle signals.

use crate::cli::commands::open_coordinator;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::lifecycle::{forward_os_signals, NotificationCenter};
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

/// Open the store, then flush on every lifecycle signal until Ctrl-C or
/// SIGTERM.
///
/// # Errors
///
/// Returns setup errors or a failure to install signal handlers.
pub fn execute(config: &StoreConfig, json: bool) -> Result<()> {
    let coordinator = Arc::new(open_coordinator(config));
    coordinator.initialize()?;

    let center = NotificationCenter::new();
    coordinator.observe_lifecycle(&center);

    if !json {
        println!(
            "{} {} (SIGHUP flushes, Ctrl-C exits)",
            "Watching".green(),
            coordinator.store_path().display()
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Other(format!("Failed to start runtime: {e}")))?;
    runtime.block_on(forward_os_signals(center))?;

    let report = coordinator.close()?;
    info!(?report, "Watch stopped");
    if json {
        println!("{}", serde_json::to_string(&report)?);
    }
    Ok(())
}
