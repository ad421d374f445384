/// CRUD Facade Module
///
/// `Database` builds conventional SELECT/INSERT/UPDATE/DELETE statements from
/// table names, field maps and where clauses, and routes every statement
/// through the query executor.
///
/// Each operation comes in two forms:
/// - `try_*` returns a typed `Result`
/// - the plain form never fails; it returns an empty container instead and
///   leaves the outcome in `has_error()`
///
/// The error flag describes the most recent raw query: it is cleared when a
/// query starts and set when one fails. Rejected input (empty fields, a bad
/// clause, an unknown identifier) sends no SQL and leaves the flag alone.

use crate::config::{Config, DatabaseConfig};
use crate::core::db::clause::{parse_filter, Filter, Operator, WhereClause};
use crate::core::db::connection::ConnectionManager;
use crate::core::db::query::{QueryExecutor, QueryOutput, QueryRequest, Record, StatementType};
use crate::core::db::schema::{Catalog, Table, COLUMNS_SQL, TABLES_SQL};
use crate::core::log::{FileSink, LogSink, TracingSink};
use crate::core::{DbError, Result};
use rusqlite::types::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Ordered column → value pairs for INSERT and UPDATE
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Value)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column; setting an existing column replaces its value in place
    pub fn with_value(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column.to_string(), value)),
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        self.entries.iter().map(|(c, _)| c.as_str()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (column, value) in iter {
            let column: String = column.into();
            fields.set(&column, value);
        }
        fields
    }
}

/// Result of a `get`: one record or all of them
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// First matching record; empty when nothing matched
    One(Record),
    Many(Vec<Record>),
}

impl Fetched {
    fn empty(single: bool) -> Self {
        if single {
            Fetched::One(Record::new())
        } else {
            Fetched::Many(Vec::new())
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            Fetched::One(record) if record.is_empty() => Vec::new(),
            Fetched::One(record) => vec![record],
            Fetched::Many(records) => records,
        }
    }

    /// The first record, or an empty one
    pub fn into_record(self) -> Record {
        match self {
            Fetched::One(record) => record,
            Fetched::Many(records) => records.into_iter().next().unwrap_or_default(),
        }
    }
}

/// `SELECT * FROM table [WHERE field op ?]`
pub fn select_statement(table: &str, filter: &Filter) -> QueryRequest {
    match filter {
        Filter::All => QueryRequest::new(format!("SELECT * FROM {}", table), vec![], true),
        Filter::Where(clause) => QueryRequest::new(
            format!("SELECT * FROM {} WHERE {}", table, clause.to_sql()),
            vec![clause.param()],
            true,
        ),
    }
}

/// `INSERT INTO table (c1, c2) VALUES (?, ?)`, one placeholder per field
pub fn insert_statement(table: &str, fields: &Fields) -> QueryRequest {
    let placeholders = vec!["?"; fields.len()].join(", ");
    QueryRequest::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            fields.columns().join(", "),
            placeholders
        ),
        fields.values(),
        false,
    )
}

/// `UPDATE table SET c1 = ?, c2 = ? WHERE field op ?`
pub fn update_statement(table: &str, clause: &WhereClause, fields: &Fields) -> QueryRequest {
    let assignments: Vec<String> = fields.columns().iter().map(|c| format!("{} = ?", c)).collect();
    let mut params = fields.values();
    params.push(clause.param());
    QueryRequest::new(
        format!("UPDATE {} SET {} WHERE {}", table, assignments.join(", "), clause.to_sql()),
        params,
        false,
    )
}

/// `DELETE FROM table WHERE field op ?`
pub fn delete_statement(table: &str, clause: &WhereClause) -> QueryRequest {
    QueryRequest::new(
        format!("DELETE FROM {} WHERE {}", table, clause.to_sql()),
        vec![clause.param()],
        false,
    )
}

fn id_clause(id: i64) -> WhereClause {
    WhereClause::new("id", Operator::Eq, id.to_string())
}

/// Binds the id wrappers' value as an integer, so an `id` column declared
/// without a type still matches.
fn with_integer_id(mut request: QueryRequest, id: i64) -> QueryRequest {
    if let Some(param) = request.params.last_mut() {
        *param = Value::Integer(id);
    }
    request
}

/// Data-access facade over one lazily opened connection.
///
/// A `Database` serves one caller at a time. Multi-threaded hosts create one
/// instance per worker or request.
pub struct Database {
    connections: ConnectionManager,
    sink: Arc<dyn LogSink>,
    timeout: Option<Duration>,
    allowed_tables: Option<Vec<String>>,
    catalog: Option<Catalog>,
    error: bool,
    last_error: Option<String>,
}

impl Database {
    /// Creates a facade that logs failures through `tracing`
    pub fn new(config: DatabaseConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    pub fn with_sink(config: DatabaseConfig, sink: Arc<dyn LogSink>) -> Self {
        let timeout = config.query_timeout_ms.map(Duration::from_millis);
        Database {
            connections: ConnectionManager::new(config, Arc::clone(&sink)),
            sink,
            timeout,
            allowed_tables: None,
            catalog: None,
            error: false,
            last_error: None,
        }
    }

    /// Builds a facade from a full configuration: the log file (if any)
    /// becomes the sink and the schema section narrows the allow-list.
    pub fn from_config(config: &Config) -> Self {
        let sink: Arc<dyn LogSink> = match config.log.as_ref().and_then(|l| l.file.clone()) {
            Some(path) => Arc::new(FileSink::new(path)),
            None => Arc::new(TracingSink),
        };
        let mut db = Self::with_sink(config.database.clone(), sink);
        db.allowed_tables = config.allowed_tables().map(<[String]>::to_vec);
        db
    }

    /// Restricts statements built by the facade to these tables
    pub fn with_allowed_tables(mut self, tables: &[&str]) -> Self {
        self.allowed_tables = Some(tables.iter().map(|t| t.to_string()).collect());
        self.catalog = None;
        self
    }

    /// Whether the most recent raw query failed
    pub fn has_error(&self) -> bool {
        self.error
    }

    /// Message of the most recent failed raw query
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Executes raw SQL with positional parameters.
    ///
    /// Resets the error flag on entry. On failure the message goes to the
    /// log sink and the flag is set.
    pub fn try_query(&mut self, sql: &str, params: &[Value], want_results: bool) -> Result<QueryOutput> {
        self.run(&QueryRequest::new(sql, params.to_vec(), want_results))
    }

    /// Executes raw SQL; `None` on failure or when no rows were requested
    pub fn query(&mut self, sql: &str, params: &[Value], want_results: bool) -> Option<Vec<Record>> {
        let output = self.try_query(sql, params, want_results).ok()?;
        want_results.then(|| output.into_records())
    }

    fn run(&mut self, request: &QueryRequest) -> Result<QueryOutput> {
        self.error = false;

        let outcome = self.execute(request);
        match &outcome {
            Ok(_) => {
                if StatementType::from_sql(&request.sql).changes_schema() {
                    debug!("Schema changed, dropping cached catalog");
                    self.catalog = None;
                }
            }
            Err(e) => self.fail(e),
        }

        if !self.connections.is_persistent() {
            self.connections.release();
        }
        outcome
    }

    fn execute(&mut self, request: &QueryRequest) -> Result<QueryOutput> {
        let timeout = self.timeout;
        let connection = self.connections.get_instance()?;
        QueryExecutor::new(connection).with_timeout(timeout).run(request)
    }

    fn fail(&mut self, e: &DbError) {
        let message = e.to_string();
        self.sink.log(&message);
        self.error = true;
        self.last_error = Some(message);
    }

    /// Re-reads the table and column allow-list from the database
    pub fn refresh_catalog(&mut self) -> Result<()> {
        self.catalog = Some(self.introspect()?);
        Ok(())
    }

    /// Loads the catalog without clearing the error flag.
    ///
    /// A failure here is a real execution failure: it is logged and flagged
    /// like any other.
    fn introspect(&mut self) -> Result<Catalog> {
        let loaded = self.read_tables();
        if !self.connections.is_persistent() {
            self.connections.release();
        }
        match loaded {
            Ok(tables) => Ok(Catalog::from_tables(tables, self.allowed_tables.as_deref())),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn read_tables(&mut self) -> Result<Vec<Table>> {
        let names = self.execute(&QueryRequest::new(TABLES_SQL, vec![], true))?.into_records();

        let mut tables = Vec::with_capacity(names.len());
        for row in names {
            let name = match row.get("name") {
                Some(Value::Text(name)) => name.clone(),
                _ => continue,
            };
            let columns = self
                .execute(&QueryRequest::new(COLUMNS_SQL, vec![Value::Text(name.clone())], true))?
                .into_records()
                .into_iter()
                .filter_map(|c| match c.get("name") {
                    Some(Value::Text(column)) => Some(column.clone()),
                    _ => None,
                })
                .collect();
            tables.push(Table { name, columns });
        }
        Ok(tables)
    }

    /// Checks identifiers against the catalog, loading it on first use.
    ///
    /// Another connection may have changed the schema since the catalog was
    /// read, so a cached catalog that misses is reloaded once before the
    /// call is rejected.
    fn check_identifiers(&mut self, table: &str, columns: &[&str]) -> Result<()> {
        let cached = self.catalog.take();
        let fresh = cached.is_none();
        let catalog = match cached {
            Some(catalog) => catalog,
            None => self.introspect()?,
        };

        let (catalog, checked) = match catalog.check(table, columns) {
            Err(DbError::UnknownTable(_)) | Err(DbError::UnknownColumn { .. }) if !fresh => {
                debug!("'{}' not in cached catalog, reloading", table);
                let catalog = self.introspect()?;
                let checked = catalog.check(table, columns);
                (catalog, checked)
            }
            checked => (catalog, checked),
        };
        self.catalog = Some(catalog);
        checked
    }

    /// Selects from `table`, filtered by `clause` when it parses.
    ///
    /// A clause that is empty or not three tokens long selects the whole
    /// table. With `single`, only the first record is returned.
    pub fn try_get(&mut self, table: &str, clause: &str, single: bool) -> Result<Fetched> {
        let filter = parse_filter(clause)?;
        self.select(table, &filter, select_statement(table, &filter), single)
    }

    fn select(&mut self, table: &str, filter: &Filter, request: QueryRequest, single: bool) -> Result<Fetched> {
        match filter {
            Filter::All => self.check_identifiers(table, &[])?,
            Filter::Where(w) => self.check_identifiers(table, &[w.field.as_str()])?,
        }

        let records = self.run(&request)?.into_records();
        if single {
            Ok(Fetched::One(records.into_iter().next().unwrap_or_default()))
        } else {
            Ok(Fetched::Many(records))
        }
    }

    pub fn get(&mut self, table: &str, clause: &str, single: bool) -> Fetched {
        let fetched = self.try_get(table, clause, single);
        contain(fetched, Fetched::empty(single))
    }

    /// The record whose `id` equals `id`.
    ///
    /// Same statement as `get(table, "id = N", true)`, with the id bound as
    /// an integer.
    pub fn try_get_by_id(&mut self, table: &str, id: i64) -> Result<Record> {
        let filter = Filter::Where(id_clause(id));
        let request = with_integer_id(select_statement(table, &filter), id);
        Ok(self.select(table, &filter, request, true)?.into_record())
    }

    /// The record whose `id` equals `id`, or an empty record
    pub fn get_by_id(&mut self, table: &str, id: i64) -> Record {
        let record = self.try_get_by_id(table, id);
        contain(record, Record::new())
    }

    /// Every record of `table`
    pub fn get_all(&mut self, table: &str) -> Vec<Record> {
        self.get(table, "", false).into_records()
    }

    /// Inserts one row and returns its generated rowid.
    ///
    /// The rowid is read from the connection in the same executor call as
    /// the INSERT, so the two cannot be separated by another statement.
    pub fn try_insert(&mut self, table: &str, fields: &Fields) -> Result<i64> {
        if fields.is_empty() {
            return Err(DbError::EmptyFields);
        }
        self.check_identifiers(table, &fields.columns())?;

        match self.run(&insert_statement(table, fields))? {
            QueryOutput::Done { last_insert_id, .. } => Ok(last_insert_id),
            QueryOutput::Rows(_) => Err(DbError::Query("INSERT returned rows".to_string())),
        }
    }

    pub fn insert(&mut self, table: &str, fields: &Fields) -> Option<i64> {
        let inserted = self.try_insert(table, fields).map(Some);
        contain(inserted, None)
    }

    /// Updates the rows matched by a strict three-token clause and returns
    /// how many changed. The clause value is bound, not concatenated.
    pub fn try_update(&mut self, table: &str, clause: &str, fields: &Fields) -> Result<usize> {
        if fields.is_empty() {
            return Err(DbError::EmptyFields);
        }
        let clause = WhereClause::parse(clause)?;
        let mut columns = fields.columns();
        columns.push(clause.field.as_str());
        self.check_identifiers(table, &columns)?;

        match self.run(&update_statement(table, &clause, fields))? {
            QueryOutput::Done { affected, .. } => Ok(affected),
            QueryOutput::Rows(_) => Ok(0),
        }
    }

    pub fn update(&mut self, table: &str, clause: &str, fields: &Fields) -> Option<usize> {
        let updated = self.try_update(table, clause, fields).map(Some);
        contain(updated, None)
    }

    /// Deletes the row whose `id` equals `id` and returns how many rows went
    pub fn try_delete(&mut self, table: &str, id: i64) -> Result<usize> {
        let clause = id_clause(id);
        self.check_identifiers(table, &[clause.field.as_str()])?;

        match self.run(&with_integer_id(delete_statement(table, &clause), id))? {
            QueryOutput::Done { affected, .. } => Ok(affected),
            QueryOutput::Rows(_) => Ok(0),
        }
    }

    pub fn delete(&mut self, table: &str, id: i64) -> Option<usize> {
        let deleted = self.try_delete(table, id).map(Some);
        contain(deleted, None)
    }
}

/// Collapses a typed result into the non-failing form.
fn contain<T>(result: Result<T>, empty: T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            if e.is_rejection() {
                warn!("{}", e);
            }
            empty
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log::MemorySink;
    use insta::assert_snapshot;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn users_db() -> (Database, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let mut db = Database::with_sink(DatabaseConfig::in_memory(), sink.clone());
        db.try_query(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE,
                age INTEGER
            )",
            &[],
            false,
        )
        .unwrap();
        for (name, age) in [("Ada", 36), ("Grace", 85), ("Linus", 17)] {
            db.try_insert(
                "users",
                &Fields::new().with_value("name", name.to_string()).with_value("age", age as i64),
            )
            .unwrap();
        }
        (db, sink)
    }

    #[test]
    fn test_statement_builders() {
        let fields = Fields::new()
            .with_value("name", "Ada".to_string())
            .with_value("email", "ada@example.com".to_string());
        let clause = WhereClause::new("id", Operator::Eq, "3");

        assert_snapshot!(insert_statement("users", &fields).sql, @"INSERT INTO users (name, email) VALUES (?, ?)");
        assert_snapshot!(update_statement("users", &clause, &fields).sql, @"UPDATE users SET name = ?, email = ? WHERE id = ?");
        assert_snapshot!(delete_statement("users", &clause).sql, @"DELETE FROM users WHERE id = ?");
        assert_snapshot!(select_statement("users", &Filter::All).sql, @"SELECT * FROM users");

        let update = update_statement("users", &clause, &fields);
        assert_eq!(update.params, vec![text("Ada"), text("ada@example.com"), text("3")]);
        assert!(!update.want_results);
    }

    #[test]
    fn test_get_scenario() {
        let filter = parse_filter("age >= 18").unwrap();
        let request = select_statement("users", &filter);
        assert_eq!(request.sql, "SELECT * FROM users WHERE age >= ?");
        assert_eq!(request.params, vec![text("18")]);

        let (mut db, _) = users_db();
        let adults = db.get("users", "age >= 18", false).into_records();
        let names: Vec<_> = adults.iter().map(|r| r.get("name").cloned()).collect();
        assert_eq!(names, vec![Some(text("Ada")), Some(text("Grace"))]);
        assert!(!db.has_error());
    }

    #[test]
    fn test_insert_returns_generated_id() {
        let (mut db, _) = users_db();
        let id = db.insert("users", &Fields::new().with_value("name", "Barbara".to_string()));
        assert_eq!(id, Some(4));

        let record = db.get_by_id("users", 4);
        assert_eq!(record.get("name"), Some(&text("Barbara")));
        assert_eq!(record.get("age"), Some(&Value::Null));
    }

    #[test]
    fn test_insert_with_no_fields_is_rejected() {
        let (mut db, sink) = users_db();
        assert!(matches!(db.try_insert("users", &Fields::new()), Err(DbError::EmptyFields)));
        assert_eq!(db.insert("users", &Fields::new()), None);
        assert!(!db.has_error());
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_get_by_id_and_get_all() {
        let (mut db, _) = users_db();
        assert_eq!(db.get_by_id("users", 2), db.get("users", "id = 2", true).into_record());
        assert_eq!(db.get_all("users"), db.get("users", "", false).into_records());
        assert_eq!(db.get_all("users").len(), 3);

        // Nothing matched: empty record, no error
        assert!(db.get_by_id("users", 99).is_empty());
        assert!(!db.has_error());
    }

    #[test]
    fn test_unparseable_clause_selects_whole_table() {
        let (mut db, _) = users_db();
        let rows = db.get("users", "name = Ada Lovelace", false).into_records();
        assert_eq!(rows.len(), 3);

        let first = db.get("users", "nonsense", true);
        assert!(matches!(first, Fetched::One(ref r) if r.get("id") == Some(&Value::Integer(1))));
    }

    #[test]
    fn test_unsupported_operator_yields_empty() {
        let (mut db, sink) = users_db();
        assert!(matches!(
            db.try_get("users", "age != 17", false),
            Err(DbError::UnsupportedOperator(_))
        ));
        assert_eq!(db.get("users", "age != 17", false), Fetched::Many(vec![]));
        assert_eq!(db.get("users", "age != 17", true), Fetched::One(Record::new()));
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_update_binds_where_value() {
        let (mut db, _) = users_db();
        let changed = db.try_update(
            "users",
            "id = 3",
            &Fields::new().with_value("age", 18i64).with_value("email", "linus@example.com".to_string()),
        );
        assert_eq!(changed.unwrap(), 1);

        let linus = db.get_by_id("users", 3);
        assert_eq!(linus.get("age"), Some(&Value::Integer(18)));
        assert_eq!(linus.get("email"), Some(&text("linus@example.com")));
    }

    #[test]
    fn test_update_rejections_leave_error_state() {
        let (mut db, sink) = users_db();

        // A failed query sets the flag...
        assert!(db.query("SELECT * FROM ghosts", &[], true).is_none());
        assert!(db.has_error());

        // ...and rejected updates neither reset nor log
        assert_eq!(db.update("users", "id = 1", &Fields::new()), None);
        assert!(db.has_error());
        assert_eq!(db.update("users", "id", &Fields::new().with_value("age", 1i64)), None);
        assert!(db.has_error());
        assert_eq!(sink.messages().len(), 1);

        // The next raw query clears it
        assert!(db.query("SELECT 1", &[], true).is_some());
        assert!(!db.has_error());
    }

    #[test]
    fn test_update_cannot_smuggle_sql_through_clause() {
        let (mut db, _) = users_db();
        let fields = Fields::new().with_value("age", 0i64);
        assert!(matches!(
            db.try_update("users", "id = 1 OR 1=1", &fields),
            Err(DbError::InvalidClause(_))
        ));
        // The value is bound as text, so it matches nothing
        assert_eq!(db.try_update("users", "id = 1;DROP", &fields).unwrap(), 0);
        assert_eq!(db.get_all("users").len(), 3);
    }

    #[test]
    fn test_delete_scenario() {
        let (mut db, _) = users_db();
        let request = with_integer_id(delete_statement("users", &id_clause(7)), 7);
        assert_eq!(request.sql, "DELETE FROM users WHERE id = ?");
        assert_eq!(request.params, vec![Value::Integer(7)]);

        assert_eq!(db.delete("users", 7), Some(0));
        assert_eq!(db.delete("users", 1), Some(1));
        assert_eq!(db.get_all("users").len(), 2);
    }

    #[test]
    fn test_id_wrappers_match_untyped_id_column() {
        let (mut db, _) = users_db();
        db.try_query("CREATE TABLE notes (id, body)", &[], false).unwrap();
        db.try_query("INSERT INTO notes VALUES (1, 'first'), (2, 'second')", &[], false)
            .unwrap();

        assert_eq!(db.get_by_id("notes", 2).get("body"), Some(&text("second")));
        // A text-bound clause does not match integers stored without affinity
        assert!(db.get("notes", "id = 2", true).into_record().is_empty());

        assert_eq!(db.delete("notes", 1), Some(1));
        assert_eq!(db.get_all("notes").len(), 1);
    }

    #[test]
    fn test_first_rejection_keeps_earlier_failure() {
        let sink = Arc::new(MemorySink::new());
        let mut db = Database::with_sink(DatabaseConfig::in_memory(), sink.clone());
        db.try_query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &[], false)
            .unwrap();

        assert!(db.query("SELECT * FROM ghosts", &[], true).is_none());
        assert!(db.has_error());
        let failure = db.last_error().map(str::to_string);

        // The catalog is loaded here for the first time
        assert_eq!(db.update("users", "id = 1", &Fields::new().with_value("nope", 1i64)), None);
        assert!(db.has_error());
        assert_eq!(db.last_error().map(str::to_string), failure);
        assert_eq!(sink.messages().len(), 1);
    }

    #[test]
    fn test_unknown_identifiers_are_rejected_without_sql() {
        let (mut db, sink) = users_db();
        assert!(matches!(db.try_get("ghosts", "", false), Err(DbError::UnknownTable(_))));
        assert!(matches!(
            db.try_insert("users", &Fields::new().with_value("password", "x".to_string())),
            Err(DbError::UnknownColumn { .. })
        ));
        assert!(matches!(
            db.try_get("users; DROP TABLE users", "", false),
            Err(DbError::InvalidIdentifier(_))
        ));
        assert!(!db.has_error());
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_catalog_follows_schema_changes() {
        let (mut db, _) = users_db();
        assert!(matches!(db.try_get("posts", "", false), Err(DbError::UnknownTable(_))));

        db.try_query("CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT)", &[], false)
            .unwrap();
        let id = db
            .try_insert("posts", &Fields::new().with_value("title", "Hello".to_string()))
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_allow_list_hides_tables() {
        let (db, _) = users_db();
        let mut db = db.with_allowed_tables(&["posts"]);
        assert!(matches!(db.try_get("users", "", false), Err(DbError::UnknownTable(_))));
    }

    #[test]
    fn test_execution_failure_is_logged_and_flagged() {
        let (mut db, sink) = users_db();
        let dup = Fields::new()
            .with_value("name", "Eve".to_string())
            .with_value("email", "eve@example.com".to_string());
        assert!(db.insert("users", &dup).is_some());
        assert_eq!(db.insert("users", &dup), None);
        assert!(db.has_error());

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("UNIQUE constraint failed"));
        assert_eq!(db.last_error(), Some(messages[0].as_str()));
    }

    #[test]
    fn test_raw_query_without_results() {
        let (mut db, _) = users_db();
        assert_eq!(db.query("UPDATE users SET age = age + 1", &[], false), None);
        assert!(!db.has_error());

        let rows = db.query("SELECT age FROM users WHERE id = ?", &[Value::Integer(1)], true).unwrap();
        assert_eq!(rows[0].get("age"), Some(&Value::Integer(37)));
    }

    #[test]
    fn test_fields_keep_insertion_order_and_replace_duplicates() {
        let fields: Fields = vec![("b", 1i64), ("a", 2i64), ("b", 3i64)].into_iter().collect();
        assert_eq!(fields.columns(), vec!["b", "a"]);
        assert_eq!(fields.values(), vec![Value::Integer(3), Value::Integer(2)]);
    }

    #[test]
    fn test_connection_failure_is_contained() {
        let sink = Arc::new(MemorySink::new());
        let mut db = Database::with_sink(DatabaseConfig::for_path("/nonexistent/dir/app.db"), sink.clone());

        assert!(db.get_all("users").is_empty());
        assert!(db.has_error());
        assert!(matches!(db.try_query("SELECT 1", &[], true), Err(DbError::Connection(_))));

        let messages = sink.messages();
        assert_eq!(messages[0], crate::core::db::connection::CONNECT_FAILURE_EVENT);
        assert!(messages[1].starts_with("Connection error"));
    }
}
