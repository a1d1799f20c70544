//! Migrator configuration and per-call options.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default ledger table name.
pub const DEFAULT_LEDGER_TABLE: &str = "migrations";

/// Configuration for a [`Migrator`](crate::Migrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    /// Ledger table name.
    pub table: String,

    /// Connection holding the ledger. Empty means the resolver default.
    pub connection: String,

    /// Create the ledger on the first `run` if it is missing.
    pub auto_install: bool,

    /// Refuse run, rollback, and reset unless forced.
    pub protected: bool,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_LEDGER_TABLE.to_string(),
            connection: String::new(),
            auto_install: true,
            protected: false,
        }
    }
}

impl MigratorConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ledger table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the connection holding the ledger.
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }

    /// Require an explicit `install` before the first run.
    pub fn without_auto_install(mut self) -> Self {
        self.auto_install = false;
        self
    }

    /// Require `force` for every mutating call.
    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }
}

/// Cooperative cancellation signal, checked between migrations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) fn is_cancelled(cancel: &Option<CancelFlag>) -> bool {
    cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
}

/// Options for [`Migrator::run`](crate::Migrator::run).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Capture SQL instead of executing it; leaves the ledger untouched.
    pub pretend: bool,
    /// Give every migration its own batch number.
    pub step: bool,
    /// Proceed on a protected migrator.
    pub force: bool,
    /// Optional cancellation signal.
    pub cancel: Option<CancelFlag>,
}

impl RunOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretend mode.
    pub fn with_pretend(mut self, pretend: bool) -> Self {
        self.pretend = pretend;
        self
    }

    /// Set step mode.
    pub fn with_step(mut self, step: bool) -> Self {
        self.step = step;
        self
    }

    /// Set force.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Attach a cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Whether the attached signal, if any, was raised.
    pub fn is_cancelled(&self) -> bool {
        is_cancelled(&self.cancel)
    }
}

/// Options for [`Migrator::rollback`](crate::Migrator::rollback).
///
/// Target selection: `steps > 0` reverts the most recent `steps` migrations;
/// otherwise `batch > 0` reverts that batch; otherwise the last batch.
#[derive(Debug, Clone, Default)]
pub struct RollbackOptions {
    /// Number of most recent migrations to revert.
    pub steps: usize,
    /// Batch to revert.
    pub batch: u32,
    /// Capture SQL instead of executing it; leaves the ledger untouched.
    pub pretend: bool,
    /// Proceed on a protected migrator.
    pub force: bool,
    /// Optional cancellation signal.
    pub cancel: Option<CancelFlag>,
}

impl RollbackOptions {
    /// Default options: revert the last batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Revert the most recent `steps` migrations.
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    /// Revert a specific batch.
    pub fn with_batch(mut self, batch: u32) -> Self {
        self.batch = batch;
        self
    }

    /// Set pretend mode.
    pub fn with_pretend(mut self, pretend: bool) -> Self {
        self.pretend = pretend;
        self
    }

    /// Set force.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Attach a cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Whether the attached signal, if any, was raised.
    pub fn is_cancelled(&self) -> bool {
        is_cancelled(&self.cancel)
    }
}

/// Options for [`Migrator::reset`](crate::Migrator::reset).
#[derive(Debug, Clone, Default)]
pub struct ResetOptions {
    /// Capture SQL instead of executing it; leaves the ledger untouched.
    pub pretend: bool,
    /// Proceed on a protected migrator.
    pub force: bool,
    /// Optional cancellation signal.
    pub cancel: Option<CancelFlag>,
}

impl ResetOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretend mode.
    pub fn with_pretend(mut self, pretend: bool) -> Self {
        self.pretend = pretend;
        self
    }

    /// Set force.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Attach a cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }
}
