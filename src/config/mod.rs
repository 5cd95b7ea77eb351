//! Configuration for a persistence coordinator.
//!
//! A [`StoreConfig`] names the model, says where the store file and model
//! resource live, and carries the store options and flush timeout. It is
//! passed into the coordinator explicitly, so several isolated coordinators
//! can live in one process.
//!
//! Directory resolution (see [`StoreConfig::from_env`]):
//! 1. Explicit path from the caller (CLI flag)
//! 2. `LISTVAULT_DOCUMENTS_DIR` / `LISTVAULT_RESOURCES_DIR`
//! 3. Platform default

mod passphrase;

pub use passphrase::{EnvPassphrase, PassphraseProvider, StaticPassphrase, PASSPHRASE_ENV};

use crate::error::{Error, Result};
use crate::storage::{store_path, StoreOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the documents directory.
pub const DOCUMENTS_DIR_ENV: &str = "LISTVAULT_DOCUMENTS_DIR";

/// Environment variable overriding the resources directory.
pub const RESOURCES_DIR_ENV: &str = "LISTVAULT_RESOURCES_DIR";

/// Model loaded when none is named.
pub const DEFAULT_MODEL_NAME: &str = "Lists";

/// How long lifecycle-triggered flushes wait for the store write.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a coordinator needs to locate and open its store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Schema name; also the store file stem.
    pub model_name: String,
    /// Directory holding `<model_name>.sqlite`.
    pub documents_dir: PathBuf,
    /// Directory holding `<model_name>.model.json`.
    pub resources_dir: PathBuf,
    pub options: StoreOptions,
    pub flush_timeout: Duration,
}

impl StoreConfig {
    /// Build a config from explicit directories with default options.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the model name cannot be used as a file stem.
    pub fn new(
        model_name: &str,
        documents_dir: impl Into<PathBuf>,
        resources_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        validate_model_name(model_name)?;
        Ok(Self {
            model_name: model_name.to_string(),
            documents_dir: documents_dir.into(),
            resources_dir: resources_dir.into(),
            options: StoreOptions::default(),
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        })
    }

    /// Build a config, filling unset directories from the environment and
    /// platform defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the model name is unusable or no documents
    /// directory can be determined.
    pub fn from_env(
        model_name: &str,
        documents_dir: Option<&Path>,
        resources_dir: Option<&Path>,
    ) -> Result<Self> {
        let documents = resolve_dir(
            documents_dir,
            std::env::var(DOCUMENTS_DIR_ENV).ok(),
            default_documents_dir,
        )
        .ok_or_else(|| {
            Error::Config(format!(
                "Cannot determine a documents directory; set {DOCUMENTS_DIR_ENV}"
            ))
        })?;

        let resources = resolve_dir(
            resources_dir,
            std::env::var(RESOURCES_DIR_ENV).ok(),
            default_resources_dir,
        )
        .ok_or_else(|| {
            Error::Config(format!(
                "Cannot determine a resources directory; set {RESOURCES_DIR_ENV}"
            ))
        })?;

        Self::new(model_name, documents, resources)
    }

    #[must_use]
    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// `<documents>/<model_name>.sqlite`
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        store_path(&self.documents_dir, &self.model_name)
    }
}

/// Pick the first usable directory: explicit, then environment, then
/// fallback. Blank environment values are ignored.
fn resolve_dir(
    explicit: Option<&Path>,
    env_value: Option<String>,
    fallback: impl FnOnce() -> Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(value) = env_value {
        if !value.trim().is_empty() {
            return Some(PathBuf::from(value));
        }
    }
    fallback()
}

/// Platform documents directory, falling back to `~/Documents`.
#[must_use]
pub fn default_documents_dir() -> Option<PathBuf> {
    directories::UserDirs::new().and_then(|dirs| {
        dirs.document_dir()
            .map(Path::to_path_buf)
            .or_else(|| Some(dirs.home_dir().join("Documents")))
    })
}

/// `resources/` under the current directory.
#[must_use]
pub fn default_resources_dir() -> Option<PathBuf> {
    std::env::current_dir().ok().map(|cwd| cwd.join("resources"))
}

fn validate_model_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Config("Model name must not be empty".to_string()));
    }
    if trimmed != name || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(Error::Config(format!(
            "Model name {name:?} cannot be used as a file name"
        )));
    }
    Ok(())
}
