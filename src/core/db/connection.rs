/// Connection Management Module
///
/// This module owns the single database connection of a `Database` instance.
/// The connection is opened lazily on first use and kept for the lifetime of
/// the manager; there is no explicit teardown.

use crate::config::DatabaseConfig;
use crate::core::log::LogSink;
use crate::core::{DbError, Result};
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Event written to the log sink when the connection cannot be opened
pub const CONNECT_FAILURE_EVENT: &str = "Unable to connect to the database";

/// Represents the lifecycle of the managed connection
#[derive(Debug)]
enum ConnectionState {
    /// Not opened yet (or released after a non-persistent call)
    Unopened,
    /// Open and usable
    Open(Connection),
    /// Opening failed; every later request fails with the stored message
    Failed(String),
}

/// Connection manager for database operations
pub struct ConnectionManager {
    config: DatabaseConfig,
    state: ConnectionState,
    sink: Arc<dyn LogSink>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("database", &self.config.database_path())
            .field("state", &self.state)
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a manager; nothing is opened until `get_instance` is called
    pub fn new(config: DatabaseConfig, sink: Arc<dyn LogSink>) -> Self {
        ConnectionManager {
            config,
            state: ConnectionState::Unopened,
            sink,
        }
    }

    /// Returns the shared connection, opening it on first call.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` when the database cannot be opened. The
    /// failure is remembered: later calls fail the same way without retrying.
    pub fn get_instance(&mut self) -> Result<&Connection> {
        if let ConnectionState::Unopened = self.state {
            self.state = match self.open() {
                Ok(conn) => ConnectionState::Open(conn),
                Err(e) => {
                    error!("Connection error: {}", e);
                    self.sink.log(CONNECT_FAILURE_EVENT);
                    ConnectionState::Failed(e.to_string())
                }
            };
        }

        match &self.state {
            ConnectionState::Open(conn) => Ok(conn),
            ConnectionState::Failed(msg) => Err(DbError::Connection(msg.clone())),
            ConnectionState::Unopened => Err(DbError::Connection("connection not opened".to_string())),
        }
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        let path = self.config.database_path();
        if !self.config.login.is_empty() || !self.config.password.is_empty() {
            debug!("SQLite ignores login credentials for {}", path);
        }

        let conn = Connection::open(&path)?;

        // Initialize connection with common pragmas
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if let Some(ms) = self.config.busy_timeout_ms {
            conn.busy_timeout(Duration::from_millis(ms))?;
        }

        info!("Opened database {}", path);
        Ok(conn)
    }

    /// Drops an open connection so the next call reopens it.
    ///
    /// A failed connection stays failed.
    pub fn release(&mut self) {
        if let ConnectionState::Open(_) = self.state {
            debug!("Releasing non-persistent connection");
            self.state = ConnectionState::Unopened;
        }
    }

    /// Whether the connection is kept between calls
    pub fn is_persistent(&self) -> bool {
        self.config.persistent
    }

    /// Checks if there's an active database connection
    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Open(_))
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}
