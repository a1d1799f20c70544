//! Migrator - applies and reverts registered migrations.
//!
//! Pending migrations run in ascending name order. Rollbacks revert in the
//! order the ledger selection returns. Every run is fail-fast: the first
//! failing migration stops the run and is named in the returned error.

use super::registry::MigrationRegistry;
use super::repository::{DatabaseMigrationRepository, MigrationRecord, MigrationRepository};
use super::Migration;
use crate::config::{self, CancelFlag, MigratorConfig, ResetOptions, RollbackOptions, RunOptions};
use crate::connection::{
    transaction, CapturedQuery, Connection, ConnectionResolver, PretendConnection,
};
use crate::error::{MigrationError, Result};
use crate::event::{Direction, EventPublisher, MigrationEvent, NullPublisher};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// SQL captured for one migration in pretend mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PretendedMigration {
    /// Migration name.
    pub name: String,
    /// Statements the migration would have executed.
    pub queries: Vec<CapturedQuery>,
}

/// Outcome of a run, rollback, or reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Direction of the operation.
    pub direction: Direction,
    /// Migrations executed, in execution order, with their batch.
    pub records: Vec<MigrationRecord>,
    /// Migrations that declined to run.
    pub skipped: Vec<String>,
    /// Captured SQL per migration, filled only in pretend mode.
    pub pretended: Vec<PretendedMigration>,
}

impl MigrationReport {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            records: Vec::new(),
            skipped: Vec::new(),
            pretended: Vec::new(),
        }
    }

    /// Executed migration names, in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    /// Check if nothing was executed or skipped.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.skipped.is_empty()
    }

    fn completed(&self) -> Vec<String> {
        self.records.iter().map(|r| r.name.clone()).collect()
    }
}

/// Ledger state of one migration name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatus {
    /// Migration name.
    pub name: String,
    /// Batch it was applied in, if applied.
    pub batch: Option<u32>,
    /// Whether the ledger records it.
    pub applied: bool,
    /// Whether a migration is registered under this name.
    pub registered: bool,
}

/// Orchestrates migrations against a ledger.
///
/// Calls run sequentially; the migrator takes no locks of its own, so
/// concurrent processes must be serialized by the caller.
pub struct Migrator {
    repository: Box<dyn MigrationRepository>,
    /// Connection holding the built-in ledger; `None` for a custom repository.
    ledger_connection: Option<Arc<dyn Connection>>,
    resolver: ConnectionResolver,
    registry: MigrationRegistry,
    publisher: Arc<dyn EventPublisher>,
    config: MigratorConfig,
}

impl Migrator {
    /// Create a migrator whose ledger lives on the configured connection.
    pub fn new(
        resolver: ConnectionResolver,
        registry: MigrationRegistry,
        config: MigratorConfig,
    ) -> Result<Self> {
        let connection = resolver.connection(&config.connection)?;
        let repository =
            DatabaseMigrationRepository::new(connection.clone(), config.table.clone());

        Ok(Self {
            repository: Box::new(repository),
            ledger_connection: Some(connection),
            resolver,
            registry,
            publisher: Arc::new(NullPublisher),
            config,
        })
    }

    /// Replace the ledger.
    pub fn with_repository(mut self, repository: impl MigrationRepository + 'static) -> Self {
        self.repository = Box::new(repository);
        self.ledger_connection = None;
        self
    }

    /// Set the event sink.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// The ledger.
    pub fn repository(&self) -> &dyn MigrationRepository {
        self.repository.as_ref()
    }

    /// Registered migrations.
    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Create the ledger if it does not exist.
    pub fn install(&self) -> Result<()> {
        self.repository.ensure_store_exists()?;
        info!(table = %self.config.table, "migration ledger installed");
        Ok(())
    }

    /// Apply every pending migration.
    pub fn run(&self, options: &RunOptions) -> Result<MigrationReport> {
        self.confirm("run", options.force, options.pretend)?;
        self.migrate(options, false)
    }

    /// Revert migrations selected by steps, batch, or the last batch.
    pub fn rollback(&self, options: &RollbackOptions) -> Result<MigrationReport> {
        self.confirm("rollback", options.force, options.pretend)?;

        let targets = if options.steps > 0 {
            self.repository.get_recent(options.steps)?
        } else if options.batch > 0 {
            self.repository.get_by_batch(options.batch)?
        } else {
            self.repository.get_last_batch()?
        };

        self.revert(targets, options.pretend, &options.cancel)
    }

    /// Revert every applied migration, last applied first.
    pub fn reset(&self, options: &ResetOptions) -> Result<MigrationReport> {
        self.confirm("reset", options.force, options.pretend)?;

        let mut targets = self.repository.get_all()?;
        targets.reverse();

        self.revert(targets, options.pretend, &options.cancel)
    }

    /// Reset, then run everything again.
    pub fn refresh(&self, options: &RunOptions) -> Result<(MigrationReport, MigrationReport)> {
        self.confirm("refresh", options.force, options.pretend)?;

        let reset = self.reset(&ResetOptions {
            pretend: options.pretend,
            force: true,
            cancel: options.cancel.clone(),
        })?;
        // A pretended reset leaves the ledger intact, so plan the run as if it were empty.
        let run = self.migrate(options, options.pretend)?;
        Ok((reset, run))
    }

    /// Registered and applied migrations, sorted by name.
    pub fn status(&self) -> Result<Vec<MigrationStatus>> {
        let batches = self.repository.get_migration_batches()?;

        let mut names: BTreeSet<&str> = self.registry.names().collect();
        names.extend(batches.keys().map(String::as_str));

        Ok(names
            .into_iter()
            .map(|name| MigrationStatus {
                name: name.to_string(),
                batch: batches.get(name).copied(),
                applied: batches.contains_key(name),
                registered: self.registry.contains(name),
            })
            .collect())
    }

    /// Registered names not yet applied, in run order.
    ///
    /// A missing ledger counts as empty.
    pub fn pending(&self) -> Result<Vec<String>> {
        let applied: HashSet<String> = if self.repository.store_exists()? {
            self.repository.get_applied()?.into_iter().collect()
        } else {
            HashSet::new()
        };
        Ok(self.pending_from(&applied))
    }

    fn pending_from(&self, applied: &HashSet<String>) -> Vec<String> {
        self.registry
            .names()
            .filter(|name| !applied.contains(*name))
            .map(str::to_string)
            .collect()
    }

    fn confirm(&self, operation: &'static str, force: bool, pretend: bool) -> Result<()> {
        if self.config.protected && !force && !pretend {
            warn!(operation, "refusing to run on a protected migrator without force");
            return Err(MigrationError::ConfirmationRequired { operation });
        }
        Ok(())
    }

    fn migrate(&self, options: &RunOptions, assume_empty: bool) -> Result<MigrationReport> {
        let store_ready = if self.repository.store_exists()? {
            true
        } else if options.pretend {
            false
        } else if self.config.auto_install {
            self.install()?;
            true
        } else {
            return Err(MigrationError::StoreNotInitialized {
                table: self.config.table.clone(),
            });
        };

        let applied: HashSet<String> = if store_ready && !assume_empty {
            self.repository.get_applied()?.into_iter().collect()
        } else {
            HashSet::new()
        };

        let pending = self.pending_from(&applied);
        if pending.is_empty() {
            info!("nothing to migrate");
            self.emit(MigrationEvent::NoPendingMigrations {
                direction: Direction::Up,
            });
            return Ok(MigrationReport::new(Direction::Up));
        }

        let batch = if store_ready && !assume_empty {
            self.repository.next_batch_number()?
        } else {
            1
        };
        info!(
            pending = pending.len(),
            batch,
            pretend = options.pretend,
            step = options.step,
            force = options.force,
            "running migrations"
        );

        let targets = pending
            .into_iter()
            .map(|name| MigrationRecord::new(name, batch))
            .collect();
        self.execute(
            Direction::Up,
            targets,
            options.pretend,
            options.step,
            &options.cancel,
        )
    }

    fn revert(
        &self,
        targets: Vec<MigrationRecord>,
        pretend: bool,
        cancel: &Option<CancelFlag>,
    ) -> Result<MigrationReport> {
        if targets.is_empty() {
            info!("nothing to roll back");
            self.emit(MigrationEvent::NoPendingMigrations {
                direction: Direction::Down,
            });
            return Ok(MigrationReport::new(Direction::Down));
        }

        if let Some(missing) = targets.iter().find(|t| !self.registry.contains(&t.name)) {
            return Err(MigrationError::MigrationNotRegistered {
                name: missing.name.clone(),
            });
        }

        info!(targets = targets.len(), pretend, "rolling back migrations");
        self.execute(Direction::Down, targets, pretend, false, cancel)
    }

    fn execute(
        &self,
        direction: Direction,
        targets: Vec<MigrationRecord>,
        pretend: bool,
        step: bool,
        cancel: &Option<CancelFlag>,
    ) -> Result<MigrationReport> {
        self.emit(MigrationEvent::MigrationsStarted { direction });

        let mut report = MigrationReport::new(direction);
        let mut offset = 0;

        for target in targets {
            if config::is_cancelled(cancel) {
                warn!(%direction, completed = report.records.len(), "migration run cancelled");
                self.emit(MigrationEvent::MigrationsEnded { direction });
                return Err(MigrationError::Cancelled {
                    direction,
                    completed: report.completed(),
                });
            }

            let name = target.name;
            let migration = self.registry.get(&name).ok_or_else(|| {
                MigrationError::MigrationNotRegistered { name: name.clone() }
            })?;

            if !migration.should_run() {
                warn!(migration = %name, %direction, "migration skipped");
                self.emit(MigrationEvent::MigrationSkipped { name: name.clone() });
                report.skipped.push(name);
                continue;
            }

            let batch = target.batch + offset;
            self.emit(MigrationEvent::MigrationStarted {
                name: name.clone(),
                method: direction,
            });
            info!(migration = %name, batch, %direction, pretend, "migrating");

            let outcome = if pretend {
                self.pretend_one(migration.as_ref(), direction)
                    .map(|queries| Some(PretendedMigration {
                        name: name.clone(),
                        queries,
                    }))
            } else {
                self.apply_one(migration.as_ref(), direction, &name, batch)
                    .map(|()| None)
            };

            match outcome {
                Ok(pretended) => report.pretended.extend(pretended),
                Err(source) => {
                    warn!(migration = %name, %direction, error = %source, "migration failed");
                    return Err(MigrationError::ExecutionFailed {
                        name,
                        direction,
                        completed: report.completed(),
                        source: Box::new(source),
                    });
                }
            }

            self.emit(MigrationEvent::MigrationEnded {
                name: name.clone(),
                method: direction,
            });
            report.records.push(MigrationRecord::new(name, batch));

            if step {
                offset += 1;
            }
        }

        self.emit(MigrationEvent::MigrationsEnded { direction });
        info!(
            %direction,
            executed = report.records.len(),
            skipped = report.skipped.len(),
            "migrations finished"
        );
        Ok(report)
    }

    fn apply_one(
        &self,
        migration: &dyn Migration,
        direction: Direction,
        name: &str,
        batch: u32,
    ) -> Result<()> {
        let connection = self.resolver.connection(migration.connection_name())?;
        let schema = Schema::new(connection.as_ref());
        let body = || match direction {
            Direction::Up => migration.up(&schema),
            Direction::Down => migration.down(&schema),
        };

        let record = || match direction {
            Direction::Up => self.repository.log(name, batch),
            Direction::Down => self.repository.delete(name),
        };

        if !migration.uses_transaction() {
            body()?;
            return record();
        }

        // The ledger write joins the transaction when both live on one connection.
        let shares_ledger = self
            .ledger_connection
            .as_ref()
            .is_some_and(|ledger| Arc::ptr_eq(ledger, &connection));
        if shares_ledger {
            transaction(connection.as_ref(), || {
                body()?;
                record()
            })
        } else {
            transaction(connection.as_ref(), body)?;
            record()
        }
    }

    fn pretend_one(
        &self,
        migration: &dyn Migration,
        direction: Direction,
    ) -> Result<Vec<CapturedQuery>> {
        let connection = self.resolver.connection(migration.connection_name())?;
        let shim = PretendConnection::new(connection.dialect());
        let schema = Schema::new(&shim);

        match direction {
            Direction::Up => migration.up(&schema)?,
            Direction::Down => migration.down(&schema)?,
        }
        Ok(shim.take())
    }

    fn emit(&self, event: MigrationEvent) {
        self.publisher.publish(&event);
    }
}
