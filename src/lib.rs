//! listvault - encrypted, layered object persistence
//!
//! A [`PersistenceCoordinator`] loads a named object model, opens an
//! encrypted SQLite store for it twice, and serves three object contexts:
//! a foreground context whose saves land in a background context, the
//! background context that writes to disk, and an independent import
//! context. Dirty state is flushed to disk when the host posts a lifecycle
//! event.
//!
//! # Architecture
//!
//! - [`coordinator`] - Lazy setup, flush routine, lifecycle wiring
//! - [`context`] - Queue-confined object contexts
//! - [`model`] - Object model, records, version mappings
//! - [`storage`] - Encrypted SQLite store handles
//! - [`lifecycle`] - Lifecycle events and notification center
//! - [`config`] - Store configuration and passphrase providers
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod storage;

pub use config::{PassphraseProvider, StoreConfig};
pub use coordinator::{FlushReport, PersistenceCoordinator, SaveOutcome};
pub use error::{Error, Result};
pub use lifecycle::{LifecycleEvent, NotificationCenter};
