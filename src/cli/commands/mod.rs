//! Command implementations.

pub mod add;
pub mod count;
pub mod import;
pub mod info;
pub mod init;
pub mod list;
pub mod watch;

use crate::config::{EnvPassphrase, StoreConfig};
use crate::coordinator::{FlushReport, PersistenceCoordinator, SaveOutcome};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Build a coordinator that reads the passphrase from the environment.
pub(crate) fn open_coordinator(config: &StoreConfig) -> PersistenceCoordinator {
    PersistenceCoordinator::new(config.clone(), Arc::new(EnvPassphrase::default()))
}

/// Turn a swallowed save failure back into a command error.
pub(crate) fn ensure_flushed(report: &FlushReport) -> Result<()> {
    for outcome in [&report.foreground, &report.background] {
        if let SaveOutcome::Failed { code, message } = outcome {
            return Err(Error::Other(format!("Flush failed ({code}): {message}")));
        }
    }
    Ok(())
}
