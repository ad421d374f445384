/// Database Module
///
/// This module provides the data-access layer, organized into focused
/// submodules.
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): owns the lazily opened connection
/// - **Clause Parsing** (`clause.rs`): turns `field op value` text into a where clause
/// - **Schema Allow-list** (`schema.rs`): the identifiers statements may reference
/// - **Query Execution** (`query.rs`): prepares, binds and runs SQL
/// - **CRUD Facade** (`crud.rs`): builds SELECT/INSERT/UPDATE/DELETE statements
///
/// ## Error Handling
///
/// All database operations use the `DbError` type. The plain facade methods
/// contain failures and expose them through `Database::has_error`.
pub mod clause;
pub mod connection;
pub mod crud;
pub mod query;
pub mod schema;

pub use clause::*;
pub use connection::*;
pub use crud::*;
pub use query::*;
pub use schema::*;
