//! Statement-capturing connection used for dry runs.

use super::{Connection, Row, Value};
use crate::error::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strata_schema::Dialect;

/// A statement recorded by [`PretendConnection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedQuery {
    /// SQL text.
    pub sql: String,
    /// Number of bound parameters.
    pub bindings: usize,
}

/// Records every statement and query instead of running it.
///
/// Queries return no rows. Transaction calls do nothing.
#[derive(Debug)]
pub struct PretendConnection {
    dialect: Dialect,
    queries: Mutex<Vec<CapturedQuery>>,
}

impl PretendConnection {
    /// Create a recorder that compiles for `dialect`.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Captured statements, in order.
    pub fn queries(&self) -> Vec<CapturedQuery> {
        self.queries.lock().clone()
    }

    /// Drain captured statements.
    pub fn take(&self) -> Vec<CapturedQuery> {
        std::mem::take(&mut *self.queries.lock())
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.queries.lock().push(CapturedQuery {
            sql: sql.to_string(),
            bindings: params.len(),
        });
    }
}

impl Connection for PretendConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql, params);
        Ok(0)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.record(sql, params);
        Ok(Vec::new())
    }

    fn begin(&self) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }

    fn is_pretending(&self) -> bool {
        true
    }
}
