// Core infrastructure modules
pub mod core;

pub mod config;

pub use crate::config::{Config, DatabaseConfig};
pub use crate::core::db::{Database, Fetched, Fields, QueryOutput, Record};
pub use crate::core::{DbError, Result};
pub use rusqlite::types::Value;
