//! CLI definitions using clap.

use crate::config::{StoreConfig, DEFAULT_MODEL_NAME};
use crate::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// listvault - encrypted object store with layered contexts
#[derive(Parser, Debug)]
#[command(name = "listvault", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the store file (default: platform documents dir)
    #[arg(long, global = true)]
    pub documents: Option<PathBuf>,

    /// Directory holding <model>.model.json (default: ./resources)
    #[arg(long, global = true)]
    pub resources: Option<PathBuf>,

    /// Model name; also the store file name
    #[arg(long, global = true, env = "LISTVAULT_MODEL", default_value = DEFAULT_MODEL_NAME)]
    pub model: String,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Resolve the store configuration from flags and environment.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no usable directories can be determined.
    pub fn store_config(&self) -> Result<StoreConfig> {
        StoreConfig::from_env(
            &self.model,
            self.documents.as_deref(),
            self.resources.as_deref(),
        )
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or open the store and print its location
    Init,

    /// Insert an object through the main context, then flush
    Add(AddArgs),

    /// List stored objects of an entity
    List {
        /// Entity name
        entity: String,
    },

    /// Count stored objects of an entity
    Count {
        /// Entity name
        entity: String,
    },

    /// Bulk insert objects from a JSONL file through the import context
    Import {
        /// Entity name
        entity: String,

        /// File with one JSON object per line
        file: PathBuf,

        /// Objects per save
        #[arg(long, default_value_t = 500)]
        batch_size: usize,
    },

    /// Show model and store details
    Info,

    /// Flush on lifecycle signals until terminated
    ///
    /// SIGHUP flushes and keeps running; Ctrl-C or SIGTERM flushes and exits.
    Watch,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Entity name
    pub entity: String,

    /// Attribute assignment, repeatable (e.g. --set name=Groceries)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}
