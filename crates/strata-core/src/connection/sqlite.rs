//! SQLite connection backed by `rusqlite`.

use super::{Connection, Row, Value};
use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::params_from_iter;
use std::path::Path;
use strata_schema::Dialect;

/// A SQLite database.
pub struct SqliteConnection {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteConnection {
    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = rusqlite::Connection::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opened sqlite database");
        Self::from_rusqlite(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_rusqlite(rusqlite::Connection::open_in_memory()?)
    }

    /// Wrap an existing `rusqlite` connection.
    pub fn from_rusqlite(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        tracing::trace!(sql, params = params.len(), "execute");
        let conn = self.conn.lock();
        let affected = conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        tracing::trace!(sql, params = params.len(), "query");
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                values.push(read_value(row.get_ref(index)?));
            }
            out.push(Row::new(values));
        }
        Ok(out)
    }

    fn begin(&self) -> Result<()> {
        self.conn.lock().execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.conn.lock().execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.conn.lock().execute_batch("ROLLBACK")?;
        Ok(())
    }
}

fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::Integer(number),
        ValueRef::Real(number) => Value::Text(number.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(number) => ToSqlOutput::from(*number),
            Value::Text(text) => ToSqlOutput::from(text.as_str()),
        })
    }
}
