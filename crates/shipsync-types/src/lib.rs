//! Shared types for the shipsync workspace.
//!
//! This crate is intentionally light on dependencies: data model structs,
//! configuration structs and the typed error hierarchy, nothing else.

pub mod error;
pub mod models;

pub use error::{GatewayError, SyncError};
