/// Schema Allow-list Module
///
/// Table and column names are written into SQL text, so they must come from
/// a known set. This module holds that set: the tables and columns the live
/// database reports, optionally narrowed to a configured list of tables.

use crate::core::{DbError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Lists user tables and views
pub const TABLES_SQL: &str = "SELECT name FROM sqlite_master
         WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
         ORDER BY name";

/// Lists the columns of the table bound to the single placeholder
pub const COLUMNS_SQL: &str = "SELECT name FROM pragma_table_info(?) ORDER BY cid";

static IDENTIFIER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

/// Checks that `name` is a plain SQL identifier.
///
/// Nothing passes if the pattern failed to compile.
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.as_ref().map_or(false, |pattern| pattern.is_match(name)) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Represents a database table and the names of its columns
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
}

/// The set of identifiers statements may reference
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Keyed by lowercase table name; SQLite names are case-insensitive
    tables: HashMap<String, Table>,
}

impl Catalog {
    /// Builds a catalog from introspected tables, keeping only tables in
    /// `allow` when a list is given.
    pub fn from_tables(tables: Vec<Table>, allow: Option<&[String]>) -> Self {
        let tables = tables
            .into_iter()
            .filter(|t| match allow {
                Some(names) => names.iter().any(|n| n.eq_ignore_ascii_case(&t.name)),
                None => true,
            })
            .map(|t| (t.name.to_lowercase(), t))
            .collect();
        Catalog { tables }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Checks a table and the columns a statement will reference.
    ///
    /// # Errors
    ///
    /// `InvalidIdentifier`, `UnknownTable` or `UnknownColumn`, all of which
    /// are rejections.
    pub fn check(&self, table: &str, columns: &[&str]) -> Result<()> {
        validate_identifier(table)?;
        let known = self
            .table(table)
            .ok_or_else(|| DbError::UnknownTable(table.to_string()))?;

        for column in columns {
            validate_identifier(column)?;
            if !known.columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                return Err(DbError::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}
