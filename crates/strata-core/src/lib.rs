//! Strata Core - migration ledger, schema builder, and migrator.
//!
//! This crate runs the blueprints compiled by `strata-schema` against real
//! connections and keeps track of which migrations have been applied.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_core::{
//!     Connection, ConnectionResolver, MigrationRegistry, Migrator, MigratorConfig,
//!     RunOptions, SqlMigration, SqliteConnection,
//! };
//!
//! let conn: Arc<dyn Connection> = Arc::new(SqliteConnection::open_in_memory().unwrap());
//! let mut registry = MigrationRegistry::new();
//! registry
//!     .register(
//!         "2024_01_01_000000_create_users",
//!         SqlMigration::new(["create table users (id integer primary key)"], ["drop table users"]),
//!     )
//!     .unwrap();
//!
//! let migrator = Migrator::new(
//!     ConnectionResolver::new("default", conn),
//!     registry,
//!     MigratorConfig::default(),
//! )
//! .unwrap();
//!
//! let report = migrator.run(&RunOptions::default()).unwrap();
//! assert_eq!(report.names(), vec!["2024_01_01_000000_create_users"]);
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod migration;
pub mod schema;

pub use config::{
    CancelFlag, MigratorConfig, ResetOptions, RollbackOptions, RunOptions, DEFAULT_LEDGER_TABLE,
};
pub use connection::{
    transaction, CapturedQuery, Connection, ConnectionResolver, PretendConnection, Row,
    SqliteConnection, Value,
};
#[cfg(feature = "postgres")]
pub use connection::PostgresConnection;
pub use error::{MigrationError, Result};
pub use event::{
    Direction, EventPublisher, MemoryPublisher, MigrationEvent, NullPublisher, TracingPublisher,
};
pub use migration::{
    is_valid_migration_name, DatabaseMigrationRepository, Migration, MigrationRecord,
    MigrationRegistry, MigrationReport, MigrationRepository, MigrationStatus, Migrator,
    PretendedMigration, SqlMigration,
};
pub use schema::Schema;

/// Re-export the schema DSL.
pub use strata_schema as dsl;
pub use strata_schema::{Blueprint, Dialect, Grammar};
