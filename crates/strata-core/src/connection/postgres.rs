//! PostgreSQL connection backed by `sqlx`.
//!
//! sqlx is async; this connection owns a Tokio runtime and blocks on it, so
//! it must not be used from inside another Tokio runtime.
//! Enable with `--features postgres`.

use super::{Connection, Row, Value};
use crate::error::{MigrationError, Result};
use parking_lot::Mutex;
use sqlx::postgres::{PgArguments, PgConnection, PgRow};
use sqlx::query::Query;
use sqlx::{Connection as _, Postgres, Row as _, TypeInfo, ValueRef};
use strata_schema::Dialect;
use tokio::runtime::Runtime;

/// A PostgreSQL database.
///
/// Holds a single server connection so `begin`/`commit` apply to the
/// statements issued in between.
pub struct PostgresConnection {
    conn: Mutex<PgConnection>,
    rt: Runtime,
}

impl PostgresConnection {
    /// Connect to `database_url`.
    pub fn connect(database_url: &str) -> Result<Self> {
        let rt = Runtime::new().map_err(|e| MigrationError::Database(e.to_string()))?;
        let conn = rt.block_on(PgConnection::connect(database_url))?;
        tracing::debug!("connected to postgres");

        Ok(Self {
            conn: Mutex::new(conn),
            rt,
        })
    }

    /// Connect using the `DATABASE_URL` environment variable.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| MigrationError::Database("DATABASE_URL is not set".to_string()))?;
        Self::connect(&database_url)
    }

    fn raw(&self, sql: &str) -> Result<()> {
        let mut conn = self.conn.lock();
        self.rt.block_on(sqlx::raw_sql(sql).execute(&mut *conn))?;
        Ok(())
    }
}

fn bind_values<'q>(sql: &'q str, params: &'q [Value]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<i64>),
            Value::Integer(number) => query.bind(*number),
            Value::Text(text) => query.bind(text.as_str()),
        };
    }
    query
}

fn read_value(row: &PgRow, index: usize) -> Result<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INT2" => Value::Integer(i64::from(row.try_get::<i16, _>(index)?)),
        "INT4" => Value::Integer(i64::from(row.try_get::<i32, _>(index)?)),
        "INT8" => Value::Integer(row.try_get::<i64, _>(index)?),
        "BOOL" => Value::Integer(i64::from(row.try_get::<bool, _>(index)?)),
        // information_schema reports identifiers as domain types over `name`
        _ => Value::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

impl Connection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        tracing::trace!(sql, params = params.len(), "execute");
        let mut conn = self.conn.lock();
        let result = self
            .rt
            .block_on(bind_values(sql, params).execute(&mut *conn))?;
        Ok(result.rows_affected())
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        tracing::trace!(sql, params = params.len(), "query");
        let mut conn = self.conn.lock();
        let rows = self
            .rt
            .block_on(bind_values(sql, params).fetch_all(&mut *conn))?;

        rows.iter()
            .map(|row| {
                (0..row.len())
                    .map(|index| read_value(row, index))
                    .collect::<Result<Vec<_>>>()
                    .map(Row::new)
            })
            .collect()
    }

    fn begin(&self) -> Result<()> {
        self.raw("BEGIN")
    }

    fn commit(&self) -> Result<()> {
        self.raw("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.raw("ROLLBACK")
    }
}
