//! Infrastructure layer for edubudget.
//!
//! Contains implementations of the repository traits defined in `edubudget-core`:
//! SQLite storage with split reader/writer pools, a dashmap-backed in-memory
//! store, and the `config.toml` loader.

pub mod config;
pub mod memory;
pub mod sqlite;
