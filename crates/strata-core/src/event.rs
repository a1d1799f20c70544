//! Migration lifecycle notifications.
//!
//! The migrator publishes a [`MigrationEvent`] before moving to its next
//! step. Sinks implement [`EventPublisher`]; delivery beyond that call is the
//! sink's concern.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Direction of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Applying migrations.
    Up,
    /// Reverting migrations.
    Down,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Lifecycle notification emitted by the migrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationEvent {
    /// A batch of migrations is about to run.
    MigrationsStarted {
        /// Run direction.
        direction: Direction,
    },
    /// A batch of migrations finished.
    MigrationsEnded {
        /// Run direction.
        direction: Direction,
    },
    /// One migration is about to run.
    MigrationStarted {
        /// Migration name.
        name: String,
        /// Method being invoked.
        method: Direction,
    },
    /// One migration finished.
    MigrationEnded {
        /// Migration name.
        name: String,
        /// Method that was invoked.
        method: Direction,
    },
    /// A migration declined to run.
    MigrationSkipped {
        /// Migration name.
        name: String,
    },
    /// There was nothing to do.
    NoPendingMigrations {
        /// Run direction.
        direction: Direction,
    },
}

impl MigrationEvent {
    /// Stable event name.
    pub fn name(&self) -> &'static str {
        match self {
            MigrationEvent::MigrationsStarted { .. } => "migration.started",
            MigrationEvent::MigrationsEnded { .. } => "migration.ended",
            MigrationEvent::MigrationStarted { .. } => "migration.migration_started",
            MigrationEvent::MigrationEnded { .. } => "migration.migration_ended",
            MigrationEvent::MigrationSkipped { .. } => "migration.skipped",
            MigrationEvent::NoPendingMigrations { .. } => "migration.no_pending",
        }
    }

    /// Migration name for per-item events.
    pub fn migration(&self) -> Option<&str> {
        match self {
            MigrationEvent::MigrationStarted { name, .. }
            | MigrationEvent::MigrationEnded { name, .. }
            | MigrationEvent::MigrationSkipped { name } => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Sink for migration events.
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Must not fail the migration run.
    fn publish(&self, event: &MigrationEvent);
}

/// Publisher that discards all events.
#[derive(Debug, Default)]
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: &MigrationEvent) {}
}

/// In-memory publisher for inspection and testing.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<MigrationEvent>>,
}

impl MemoryPublisher {
    /// Create an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// All published events, in order.
    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events.lock().clone()
    }

    /// Names of all published events, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(MigrationEvent::name).collect()
    }

    /// Remove all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventPublisher for MemoryPublisher {
    fn publish(&self, event: &MigrationEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Publisher that forwards events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingPublisher;

impl EventPublisher for TracingPublisher {
    fn publish(&self, event: &MigrationEvent) {
        match event {
            MigrationEvent::MigrationsStarted { direction }
            | MigrationEvent::MigrationsEnded { direction }
            | MigrationEvent::NoPendingMigrations { direction } => {
                tracing::info!(event = event.name(), %direction);
            }
            MigrationEvent::MigrationStarted { name, method }
            | MigrationEvent::MigrationEnded { name, method } => {
                tracing::info!(event = event.name(), migration = %name, %method);
            }
            MigrationEvent::MigrationSkipped { name } => {
                tracing::warn!(event = event.name(), migration = %name);
            }
        }
    }
}
