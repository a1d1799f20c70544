//! Core error types.

use crate::event::Direction;
use strata_schema::SchemaError;
use thiserror::Error;

/// Errors raised by the ledger, the schema builder, and the migrator.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The ledger table has not been created.
    #[error("migration ledger table {table} does not exist")]
    StoreNotInitialized {
        /// Ledger table name.
        table: String,
    },

    /// A ledger record was expected but is absent.
    #[error("no ledger record for migration {name}")]
    RecordNotFound {
        /// Migration name.
        name: String,
    },

    /// A ledger record already exists for this name.
    #[error("migration {name} is already recorded in the ledger")]
    DuplicateRecord {
        /// Migration name.
        name: String,
    },

    /// A name in the ledger or rollback target has no registered migration.
    #[error("migration {name} is not registered")]
    MigrationNotRegistered {
        /// Migration name.
        name: String,
    },

    /// A migration body failed.
    #[error("migration {name} failed while running {direction}: {source}")]
    ExecutionFailed {
        /// Name of the failing migration.
        name: String,
        /// Direction that was running.
        direction: Direction,
        /// Migrations that completed before the failure, in order.
        completed: Vec<String>,
        /// Underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// The same name was registered twice.
    #[error("migration {name} is already registered")]
    DuplicateMigration {
        /// Migration name.
        name: String,
    },

    /// A name does not follow `YYYY_MM_DD_HHMMSS_description`.
    #[error("invalid migration name {name}: expected YYYY_MM_DD_HHMMSS_description")]
    InvalidMigrationName {
        /// Offending name.
        name: String,
    },

    /// A migration asked for a connection the resolver does not know.
    #[error("connection {name} is not configured")]
    ConnectionNotConfigured {
        /// Connection name.
        name: String,
    },

    /// The migrator is protected and the call was not forced.
    #[error("{operation} requires confirmation: pass force to proceed")]
    ConfirmationRequired {
        /// Operation that was refused.
        operation: &'static str,
    },

    /// A cancellation signal stopped the run between migrations.
    #[error("{direction} cancelled after {} migration(s)", .completed.len())]
    Cancelled {
        /// Direction that was running.
        direction: Direction,
        /// Migrations that completed before cancellation.
        completed: Vec<String>,
    },

    /// Blueprint validation or compilation failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// SQLite driver error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL driver error.
    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Error reported by another database driver.
    #[error("database error: {0}")]
    Database(String),

    /// A result row did not hold the expected type.
    #[error("unexpected value in column {index}: expected {expected}")]
    UnexpectedValue {
        /// Zero-based column index.
        index: usize,
        /// Expected type.
        expected: &'static str,
    },

    /// Failure raised by a migration body.
    #[error("{0}")]
    Message(String),
}

impl MigrationError {
    /// Create an author-raised failure.
    pub fn message(message: impl Into<String>) -> Self {
        MigrationError::Message(message.into())
    }

    /// Names completed before a failed or cancelled run stopped.
    pub fn completed(&self) -> &[String] {
        match self {
            MigrationError::ExecutionFailed { completed, .. }
            | MigrationError::Cancelled { completed, .. } => completed.as_slice(),
            _ => &[],
        }
    }

    /// Name of the migration that failed, if this is an execution failure.
    pub fn failed_migration(&self) -> Option<&str> {
        match self {
            MigrationError::ExecutionFailed { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Result type for core operations.
pub type Result<T, E = MigrationError> = std::result::Result<T, E>;
