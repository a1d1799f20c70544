//! Migration ledger.
//!
//! The ledger records which migrations have been applied and in which batch.
//! It is the single source of truth for the state of a database.

use crate::connection::{Connection, Row, Value};
use crate::error::{MigrationError, Result};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_schema::Grammar;
use tracing::debug;

/// One applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Migration name.
    pub name: String,
    /// Batch the migration was applied in.
    pub batch: u32,
}

impl MigrationRecord {
    /// Create a record.
    pub fn new(name: impl Into<String>, batch: u32) -> Self {
        Self {
            name: name.into(),
            batch,
        }
    }
}

/// Storage for applied-migration records.
pub trait MigrationRepository: Send + Sync {
    /// Applied names ordered by batch, then name.
    fn get_applied(&self) -> Result<Vec<String>>;

    /// Batch number of every applied migration.
    fn get_migration_batches(&self) -> Result<BTreeMap<String, u32>>;

    /// Records in the highest batch, most recently applied first.
    fn get_last_batch(&self) -> Result<Vec<MigrationRecord>>;

    /// Records in `batch`, most recently applied first.
    fn get_by_batch(&self, batch: u32) -> Result<Vec<MigrationRecord>>;

    /// The `steps` most recently applied records, most recent first.
    fn get_recent(&self, steps: usize) -> Result<Vec<MigrationRecord>>;

    /// Every record in apply order.
    fn get_all(&self) -> Result<Vec<MigrationRecord>>;

    /// Highest batch number, or 0 for an empty ledger.
    fn last_batch_number(&self) -> Result<u32>;

    /// Batch number for the next run.
    fn next_batch_number(&self) -> Result<u32> {
        Ok(self.last_batch_number()? + 1)
    }

    /// Record an applied migration.
    fn log(&self, name: &str, batch: u32) -> Result<()>;

    /// Remove the record of a reverted migration.
    fn delete(&self, name: &str) -> Result<()>;

    /// Create the ledger if missing.
    fn ensure_store_exists(&self) -> Result<()>;

    /// Check if the ledger exists.
    fn store_exists(&self) -> Result<bool>;

    /// Drop the ledger if present.
    fn drop_store(&self) -> Result<()>;
}

/// Ledger kept in a database table.
pub struct DatabaseMigrationRepository {
    connection: Arc<dyn Connection>,
    table: String,
    grammar: Box<dyn Grammar>,
}

impl DatabaseMigrationRepository {
    /// Create a ledger in `table` on `connection`.
    pub fn new(connection: Arc<dyn Connection>, table: impl Into<String>) -> Self {
        Self {
            grammar: connection.dialect().grammar(),
            connection,
            table: table.into(),
        }
    }

    /// Ledger table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn wrapped_table(&self) -> String {
        self.grammar.wrap(&self.table)
    }

    fn require_store(&self) -> Result<()> {
        if self.store_exists()? {
            Ok(())
        } else {
            Err(MigrationError::StoreNotInitialized {
                table: self.table.clone(),
            })
        }
    }

    fn select_records(&self, clause: &str, params: &[Value]) -> Result<Vec<MigrationRecord>> {
        self.require_store()?;
        let sql = format!(
            "select migration, batch from {} {}",
            self.wrapped_table(),
            clause
        );
        self.connection
            .query(&sql, params)?
            .iter()
            .map(read_record)
            .collect()
    }
}

fn read_record(row: &Row) -> Result<MigrationRecord> {
    Ok(MigrationRecord {
        name: row.get_text(0)?.to_string(),
        batch: read_batch(row, 1)?,
    })
}

fn read_batch(row: &Row, index: usize) -> Result<u32> {
    let value = row.get_integer(index)?;
    u32::try_from(value).map_err(|_| MigrationError::UnexpectedValue {
        index,
        expected: "batch number",
    })
}

impl MigrationRepository for DatabaseMigrationRepository {
    fn get_applied(&self) -> Result<Vec<String>> {
        Ok(self
            .get_all()?
            .into_iter()
            .map(|record| record.name)
            .collect())
    }

    fn get_migration_batches(&self) -> Result<BTreeMap<String, u32>> {
        Ok(self
            .get_all()?
            .into_iter()
            .map(|record| (record.name, record.batch))
            .collect())
    }

    fn get_last_batch(&self) -> Result<Vec<MigrationRecord>> {
        let clause = format!(
            "where batch = (select max(batch) from {}) order by migration desc",
            self.wrapped_table()
        );
        self.select_records(&clause, &[])
    }

    fn get_by_batch(&self, batch: u32) -> Result<Vec<MigrationRecord>> {
        let clause = format!(
            "where batch = {} order by migration desc",
            self.grammar.parameter(1)
        );
        self.select_records(&clause, &[Value::from(batch)])
    }

    fn get_recent(&self, steps: usize) -> Result<Vec<MigrationRecord>> {
        let limit = i64::try_from(steps).unwrap_or(i64::MAX);
        let clause = format!(
            "order by batch desc, migration desc limit {}",
            self.grammar.parameter(1)
        );
        self.select_records(&clause, &[Value::from(limit)])
    }

    fn get_all(&self) -> Result<Vec<MigrationRecord>> {
        self.select_records("order by batch asc, migration asc", &[])
    }

    fn last_batch_number(&self) -> Result<u32> {
        self.require_store()?;
        let sql = format!("select max(batch) from {}", self.wrapped_table());
        let rows = self.connection.query(&sql, &[])?;
        match rows.first() {
            Some(row) => match row.get_optional_integer(0)? {
                Some(_) => read_batch(row, 0),
                None => Ok(0),
            },
            None => Ok(0),
        }
    }

    fn log(&self, name: &str, batch: u32) -> Result<()> {
        self.require_store()?;
        let exists = format!(
            "select count(*) from {} where migration = {}",
            self.wrapped_table(),
            self.grammar.parameter(1)
        );
        let rows = self.connection.query(&exists, &[Value::from(name)])?;
        if let Some(row) = rows.first() {
            if row.get_integer(0)? > 0 {
                return Err(MigrationError::DuplicateRecord {
                    name: name.to_string(),
                });
            }
        }

        let insert = format!(
            "insert into {} (migration, batch) values ({}, {})",
            self.wrapped_table(),
            self.grammar.parameter(1),
            self.grammar.parameter(2)
        );
        self.connection
            .execute(&insert, &[Value::from(name), Value::from(batch)])?;
        debug!(migration = %name, batch, "logged migration");
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.require_store()?;
        let sql = format!(
            "delete from {} where migration = {}",
            self.wrapped_table(),
            self.grammar.parameter(1)
        );
        let affected = self.connection.execute(&sql, &[Value::from(name)])?;
        if affected == 0 {
            return Err(MigrationError::RecordNotFound {
                name: name.to_string(),
            });
        }
        debug!(migration = %name, "deleted migration record");
        Ok(())
    }

    fn ensure_store_exists(&self) -> Result<()> {
        let schema = Schema::new(self.connection.as_ref());
        if schema.has_table(&self.table)? {
            return Ok(());
        }
        schema.create_table(&self.table, |table| {
            table.increments("id");
            table.string("migration", 255);
            table.integer("batch");
            table.unique(&["migration"]);
        })?;
        debug!(table = %self.table, "created migration ledger");
        Ok(())
    }

    fn store_exists(&self) -> Result<bool> {
        Schema::new(self.connection.as_ref()).has_table(&self.table)
    }

    fn drop_store(&self) -> Result<()> {
        Schema::new(self.connection.as_ref()).drop_table_if_exists(&self.table)?;
        debug!(table = %self.table, "dropped migration ledger");
        Ok(())
    }
}
