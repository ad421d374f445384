/// Core Module
///
/// This module contains the data-access layer and the infrastructure it
/// shares: error types and log sinks.

pub mod db;
pub mod error;
pub mod log;

// Re-export commonly used types for convenience
pub use error::{DbError, Result};
