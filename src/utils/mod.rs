//! Shared utilities: errors, logging, formatting.

pub mod errors;
pub mod format;
pub mod logger;
