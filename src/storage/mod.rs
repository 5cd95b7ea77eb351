//! Encrypted SQLite storage for the object graph.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode so a second handle can read while the first writes
//! - IMMEDIATE transactions for every write
//! - Per-record authenticated encryption of attribute payloads
//!
//! # Submodules
//!
//! - [`crypto`] - Key derivation and payload sealing
//! - [`migrations`] - Store layout migrations
//! - [`schema`] - Database schema definitions
//! - [`store`] - Store handles

pub mod crypto;
pub mod migrations;
pub mod schema;
pub mod store;

pub use store::{CommitStats, StoreHandle, StoreOptions, store_path};
