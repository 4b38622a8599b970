//! checkin — daily check-in client for a panel account API.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod api;
pub mod workflow;
