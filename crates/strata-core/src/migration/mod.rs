//! Migrations and their orchestration.
//!
//! A [`Migration`] is a named pair of `up`/`down` operations. Migrations are
//! registered into a [`MigrationRegistry`], and the [`Migrator`] applies or
//! reverts them while recording progress through a [`MigrationRepository`].

mod migrator;
mod registry;
mod repository;

pub use migrator::{MigrationReport, MigrationStatus, Migrator, PretendedMigration};
pub use registry::{is_valid_migration_name, MigrationRegistry};
pub use repository::{DatabaseMigrationRepository, MigrationRecord, MigrationRepository};

use crate::error::Result;
use crate::schema::Schema;

/// A unit of schema change.
pub trait Migration: Send + Sync {
    /// Apply the change.
    fn up(&self, schema: &Schema<'_>) -> Result<()>;

    /// Revert the change.
    fn down(&self, schema: &Schema<'_>) -> Result<()>;

    /// Connection to run against. Empty means the default connection.
    fn connection_name(&self) -> &str {
        ""
    }

    /// Wrap `up`/`down` in a transaction.
    fn uses_transaction(&self) -> bool {
        false
    }

    /// Whether the migrator should run this migration at all.
    fn should_run(&self) -> bool {
        true
    }
}

/// A migration made of raw SQL statements.
#[derive(Debug, Clone, Default)]
pub struct SqlMigration {
    up: Vec<String>,
    down: Vec<String>,
    connection: String,
    transactional: bool,
}

impl SqlMigration {
    /// Create a migration from `up` and `down` statements.
    pub fn new<U, D>(up: U, down: D) -> Self
    where
        U: IntoIterator,
        U::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            up: up.into_iter().map(Into::into).collect(),
            down: down.into_iter().map(Into::into).collect(),
            connection: String::new(),
            transactional: false,
        }
    }

    /// Run against a named connection.
    pub fn on_connection(mut self, name: impl Into<String>) -> Self {
        self.connection = name.into();
        self
    }

    /// Wrap execution in a transaction.
    pub fn transactional(mut self) -> Self {
        self.transactional = true;
        self
    }
}

impl Migration for SqlMigration {
    fn up(&self, schema: &Schema<'_>) -> Result<()> {
        for sql in &self.up {
            schema.statement(sql)?;
        }
        Ok(())
    }

    fn down(&self, schema: &Schema<'_>) -> Result<()> {
        for sql in &self.down {
            schema.statement(sql)?;
        }
        Ok(())
    }

    fn connection_name(&self) -> &str {
        &self.connection
    }

    fn uses_transaction(&self) -> bool {
        self.transactional
    }
}
