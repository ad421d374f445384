/// Query Execution Module
///
/// This module is the only place SQL reaches the database. It prepares a
/// statement, binds positional parameters, runs it (optionally under a
/// deadline) and collects the result rows as `Record`s.

use crate::core::{DbError, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, Statement};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// One result row: column names mapped to values, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column; a repeated name replaces the earlier value.
    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.columns.iter().position(|c| *c == column) {
            Some(idx) => self.values[idx] = value,
            None => {
                self.columns.push(column);
                self.values.push(value);
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            match value {
                Value::Null => map.serialize_entry(column, &())?,
                Value::Integer(i) => map.serialize_entry(column, i)?,
                Value::Real(f) => map.serialize_entry(column, f)?,
                Value::Text(t) => map.serialize_entry(column, t)?,
                Value::Blob(b) => map.serialize_entry(column, &format_blob(b))?,
            }
        }
        map.end()
    }
}

fn format_blob(bytes: &[u8]) -> String {
    format!("<BLOB: {} bytes>", bytes.len())
}

/// SQL text with `?` placeholders and the values bound to them, in order
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub sql: String,
    pub params: Vec<Value>,
    /// Whether result rows should be collected and returned
    pub want_results: bool,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>, params: Vec<Value>, want_results: bool) -> Self {
        QueryRequest {
            sql: sql.into(),
            params,
            want_results,
        }
    }
}

/// Outcome of a successful execution
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Rows returned by a row-producing statement with `want_results` set
    Rows(Vec<Record>),
    /// Statement completed without a row payload
    Done {
        /// Rows changed by INSERT/UPDATE/DELETE (0 otherwise)
        affected: usize,
        /// Rowid of the most recent successful INSERT on this connection
        last_insert_id: i64,
    },
}

impl QueryOutput {
    /// The returned rows; empty when the statement produced no payload
    pub fn into_records(self) -> Vec<Record> {
        match self {
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Done { .. } => Vec::new(),
        }
    }
}

/// Interrupts the connection when a statement outlives its deadline.
struct Watchdog {
    done: Option<mpsc::Sender<()>>,
    fired: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Watchdog {
    fn arm(connection: &Connection, timeout: Duration) -> Self {
        let (done, rx) = mpsc::channel::<()>();
        let interrupt_handle = connection.get_interrupt_handle();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let thread = thread::spawn(move || {
            // A dropped sender means the statement finished in time
            if let Err(mpsc::RecvTimeoutError::Timeout) = rx.recv_timeout(timeout) {
                flag.store(true, Ordering::SeqCst);
                interrupt_handle.interrupt();
            }
        });

        Watchdog {
            done: Some(done),
            fired,
            thread: Some(thread),
        }
    }

    /// Stops the timer and reports whether it interrupted the statement.
    fn disarm(mut self) -> bool {
        drop(self.done.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Query watchdog thread panicked");
            }
        }
        self.fired.load(Ordering::SeqCst)
    }
}

/// Query execution service that operates on a database connection
pub struct QueryExecutor<'a> {
    connection: &'a Connection,
    timeout: Option<Duration>,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor for the given connection
    pub fn new(connection: &'a Connection) -> Self {
        QueryExecutor {
            connection,
            timeout: None,
        }
    }

    /// Bounds every execution by `timeout`; `None` means unbounded
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executes a request and returns its outcome
    ///
    /// Parameters are bound positionally, 1-indexed, in the order supplied.
    ///
    /// # Errors
    ///
    /// - `DbError::Query` if the statement cannot be prepared
    /// - `DbError::ParameterCount` if the number of values differs from the
    ///   number of placeholders; nothing is executed in that case
    /// - `DbError::Timeout` if the deadline interrupted the statement
    /// - `DbError::Database` for any other execution failure
    pub fn run(&self, request: &QueryRequest) -> Result<QueryOutput> {
        debug!(sql = %request.sql, params = ?request.params, "executing");

        let mut stmt = self.prepare(&request.sql)?;

        let expected = stmt.parameter_count();
        if expected != request.params.len() {
            return Err(DbError::ParameterCount {
                expected,
                supplied: request.params.len(),
            });
        }
        for (idx, value) in request.params.iter().enumerate() {
            stmt.raw_bind_parameter(idx + 1, value)?;
        }

        let watchdog = self.timeout.map(|t| Watchdog::arm(self.connection, t));
        let result = self.step(&mut stmt, request.want_results);
        let fired = watchdog.map(Watchdog::disarm).unwrap_or(false);

        match (result, self.timeout) {
            (Err(_), Some(timeout)) if fired => Err(DbError::Timeout(timeout)),
            (result, _) => result,
        }
    }

    fn step(&self, stmt: &mut Statement<'_>, want_results: bool) -> Result<QueryOutput> {
        let column_count = stmt.column_count();
        if column_count == 0 {
            let affected = stmt.raw_execute()?;
            return Ok(QueryOutput::Done {
                affected,
                last_insert_id: self.connection.last_insert_rowid(),
            });
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut records = Vec::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            if !want_results {
                continue;
            }
            let mut record = Record::new();
            for (idx, column) in columns.iter().enumerate() {
                record.push(column.clone(), Value::from(row.get_ref(idx)?));
            }
            records.push(record);
        }

        if want_results {
            Ok(QueryOutput::Rows(records))
        } else {
            Ok(QueryOutput::Done {
                affected: 0,
                last_insert_id: self.connection.last_insert_rowid(),
            })
        }
    }

    /// Prepares a SQL statement for execution without running it
    ///
    /// # Errors
    ///
    /// Returns `DbError::Query` if the SQL statement cannot be prepared.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'a>> {
        self.connection
            .prepare(sql)
            .map_err(|e| DbError::Query(format!("Failed to prepare statement: {}", e)))
    }
}

/// Represents different SQL statement types for introspection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    /// Other statement types
    Other,
}

impl StatementType {
    /// Determines the statement type from a SQL string
    pub fn from_sql(sql: &str) -> Self {
        let sql_upper = sql.trim_start().to_uppercase();

        if sql_upper.starts_with("SELECT") || sql_upper.starts_with("WITH") {
            StatementType::Select
        } else if sql_upper.starts_with("INSERT") {
            StatementType::Insert
        } else if sql_upper.starts_with("UPDATE") {
            StatementType::Update
        } else if sql_upper.starts_with("DELETE") {
            StatementType::Delete
        } else if sql_upper.starts_with("CREATE") {
            StatementType::Create
        } else if sql_upper.starts_with("DROP") {
            StatementType::Drop
        } else if sql_upper.starts_with("ALTER") {
            StatementType::Alter
        } else {
            StatementType::Other
        }
    }

    /// Whether the statement can change the set of tables or columns
    pub fn changes_schema(self) -> bool {
        matches!(self, StatementType::Create | StatementType::Drop | StatementType::Alter)
    }
}
