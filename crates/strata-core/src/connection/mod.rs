//! Database connections.
//!
//! The engine talks to databases only through the [`Connection`] trait.
//! [`SqliteConnection`] executes against SQLite, `PostgresConnection` (feature
//! `postgres`) against PostgreSQL; [`PretendConnection`] records statements
//! without sending them anywhere.

#[cfg(feature = "postgres")]
mod postgres;
mod pretend;
mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::PostgresConnection;
pub use pretend::{CapturedQuery, PretendConnection};
pub use sqlite::SqliteConnection;

use crate::error::{MigrationError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use strata_schema::Dialect;

/// A bound parameter or result value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Integer.
    Integer(i64),
    /// Text.
    Text(String),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// One result row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create a row from its column values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Value at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Text value at `index`.
    pub fn get_text(&self, index: usize) -> Result<&str> {
        match self.values.get(index) {
            Some(Value::Text(text)) => Ok(text),
            _ => Err(MigrationError::UnexpectedValue {
                index,
                expected: "text",
            }),
        }
    }

    /// Integer value at `index`.
    pub fn get_integer(&self, index: usize) -> Result<i64> {
        match self.values.get(index) {
            Some(Value::Integer(number)) => Ok(*number),
            _ => Err(MigrationError::UnexpectedValue {
                index,
                expected: "integer",
            }),
        }
    }

    /// Integer value at `index`, or `None` for SQL `NULL`.
    pub fn get_optional_integer(&self, index: usize) -> Result<Option<i64>> {
        match self.values.get(index) {
            Some(Value::Null) => Ok(None),
            _ => self.get_integer(index).map(Some),
        }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A synchronous database connection.
///
/// Implementations use interior mutability so one connection can be shared
/// between the ledger and migration bodies.
pub trait Connection: Send + Sync {
    /// Dialect spoken by this connection.
    fn dialect(&self) -> Dialect;

    /// Execute a statement, returning the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Run a query and collect its rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Begin a transaction.
    fn begin(&self) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the open transaction.
    fn rollback(&self) -> Result<()>;

    /// Whether statements are captured instead of executed.
    fn is_pretending(&self) -> bool {
        false
    }
}

/// Run `body` inside a transaction on `connection`.
///
/// Commits on `Ok`; rolls back on `Err` and returns the body's error.
pub fn transaction<T>(
    connection: &dyn Connection,
    body: impl FnOnce() -> Result<T>,
) -> Result<T> {
    connection.begin()?;
    match body() {
        Ok(value) => {
            connection.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = connection.rollback() {
                tracing::warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}

/// Named connections with a default.
pub struct ConnectionResolver {
    default: String,
    connections: HashMap<String, Arc<dyn Connection>>,
}

impl ConnectionResolver {
    /// Create a resolver whose default connection is `name`.
    pub fn new(name: impl Into<String>, connection: Arc<dyn Connection>) -> Self {
        let default = name.into();
        let mut connections = HashMap::new();
        connections.insert(default.clone(), connection);
        Self {
            default,
            connections,
        }
    }

    /// Add a named connection.
    pub fn with_connection(
        mut self,
        name: impl Into<String>,
        connection: Arc<dyn Connection>,
    ) -> Self {
        self.add(name, connection);
        self
    }

    /// Add or replace a named connection.
    pub fn add(&mut self, name: impl Into<String>, connection: Arc<dyn Connection>) {
        self.connections.insert(name.into(), connection);
    }

    /// Name of the default connection.
    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Resolve a connection; the empty name means the default.
    pub fn connection(&self, name: &str) -> Result<Arc<dyn Connection>> {
        let key = if name.is_empty() { self.default.as_str() } else { name };
        self.connections
            .get(key)
            .cloned()
            .ok_or_else(|| MigrationError::ConnectionNotConfigured {
                name: key.to_string(),
            })
    }

    /// The default connection.
    pub fn default_connection(&self) -> Result<Arc<dyn Connection>> {
        self.connection("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_getters() {
        let row = Row::new(vec![
            Value::from("2024_01_01_000000_create_users"),
            Value::from(3u32),
            Value::Null,
        ]);

        assert_eq!(row.len(), 3);
        assert_eq!(row.get_text(0).unwrap(), "2024_01_01_000000_create_users");
        assert_eq!(row.get_integer(1).unwrap(), 3);
        assert_eq!(row.get_optional_integer(2).unwrap(), None);
        assert!(matches!(
            row.get_integer(0),
            Err(MigrationError::UnexpectedValue { index: 0, .. })
        ));
        assert!(row.get(7).is_none());
    }

    #[test]
    fn test_resolver_lookup() {
        let default: Arc<dyn Connection> = Arc::new(PretendConnection::new(Dialect::Sqlite));
        let reporting: Arc<dyn Connection> = Arc::new(PretendConnection::new(Dialect::Postgres));
        let resolver =
            ConnectionResolver::new("main", default).with_connection("reporting", reporting);

        assert_eq!(resolver.default_name(), "main");
        assert_eq!(resolver.connection("").unwrap().dialect(), Dialect::Sqlite);
        assert_eq!(
            resolver.connection("reporting").unwrap().dialect(),
            Dialect::Postgres
        );
        assert!(matches!(
            resolver.connection("archive"),
            Err(MigrationError::ConnectionNotConfigured { name }) if name == "archive"
        ));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let connection = SqliteConnection::open_in_memory().unwrap();
        connection
            .execute("create table t (id integer)", &[])
            .unwrap();

        let result: Result<()> = transaction(&connection, || {
            connection.execute("insert into t (id) values (1)", &[])?;
            Err(MigrationError::message("abort"))
        });
        assert!(result.is_err());

        let rows = connection.query("select count(*) from t", &[]).unwrap();
        assert_eq!(rows[0].get_integer(0).unwrap(), 0);

        transaction(&connection, || {
            connection.execute("insert into t (id) values (?1)", &[Value::from(7i64)])
        })
        .unwrap();
        let rows = connection.query("select id from t", &[]).unwrap();
        assert_eq!(rows, vec![Row::new(vec![Value::Integer(7)])]);
    }
}
