//! Unified error types for the opc-engine crate.
//!
//! This module provides a single error type over the OPC layer's errors,
//! presenting a consistent API to users.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, Result};
