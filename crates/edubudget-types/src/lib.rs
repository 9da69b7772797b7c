//! Shared domain types for edubudget.
//!
//! This crate contains the domain types used across the workspace:
//! accounts and their roles, student records, token usage, derived budget
//! views (aggregated usage, admission decisions, status reports), the usage
//! ledger, configuration, and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod account;
pub mod config;
pub mod error;
pub mod student;
pub mod usage;
