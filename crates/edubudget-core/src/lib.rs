//! Budget accounting and repository trait definitions for edubudget.
//!
//! This crate defines the "ports" (repository traits) that the infrastructure
//! layer implements, and the budget logic built on them: usage aggregation,
//! admission control, usage recording, status reporting, and the guarded
//! check-and-record path. It never depends on `edubudget-infra` or any
//! database crate.

pub mod budget;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;
