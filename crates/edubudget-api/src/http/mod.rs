//! HTTP/REST API layer for edubudget.
//!
//! Axum-based REST API at `/api/v1/` with envelope response format and
//! CORS support.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;

#[cfg(test)]
mod tests;
