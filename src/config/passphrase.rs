//! Store passphrase sources.

use crate::error::{Error, Result};
use zeroize::Zeroizing;

/// Environment variable read by [`EnvPassphrase::default`].
pub const PASSPHRASE_ENV: &str = "LISTVAULT_PASSPHRASE";

/// Supplies the passphrase a store key is derived from.
///
/// Called once per store handle, so twice per coordinator.
pub trait PassphraseProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns `Passphrase` if no passphrase is available.
    fn passphrase(&self) -> Result<Zeroizing<String>>;
}

/// A passphrase held in memory.
pub struct StaticPassphrase(Zeroizing<String>);

impl StaticPassphrase {
    #[must_use]
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(Zeroizing::new(passphrase.into()))
    }
}

impl std::fmt::Debug for StaticPassphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticPassphrase(<redacted>)")
    }
}

impl PassphraseProvider for StaticPassphrase {
    fn passphrase(&self) -> Result<Zeroizing<String>> {
        Ok(self.0.clone())
    }
}

/// Reads the passphrase from an environment variable on each call.
#[derive(Debug, Clone)]
pub struct EnvPassphrase {
    var: String,
}

impl EnvPassphrase {
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvPassphrase {
    fn default() -> Self {
        Self::new(PASSPHRASE_ENV)
    }
}

impl PassphraseProvider for EnvPassphrase {
    fn passphrase(&self) -> Result<Zeroizing<String>> {
        match std::env::var(&self.var) {
            Ok(value) if !value.is_empty() => Ok(Zeroizing::new(value)),
            Ok(_) => Err(Error::Passphrase(format!("{} is empty", self.var))),
            Err(_) => Err(Error::Passphrase(format!("{} is not set", self.var))),
        }
    }
}
