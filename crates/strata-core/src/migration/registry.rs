//! Explicit migration registry.

use super::Migration;
use crate::error::{MigrationError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registered migrations keyed by name, iterated in name order.
#[derive(Default, Clone)]
pub struct MigrationRegistry {
    migrations: BTreeMap<String, Arc<dyn Migration>>,
}

impl MigrationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        migration: impl Migration + 'static,
    ) -> Result<()> {
        self.register_arc(name, Arc::new(migration))
    }

    /// Register a shared migration under `name`.
    pub fn register_arc(
        &mut self,
        name: impl Into<String>,
        migration: Arc<dyn Migration>,
    ) -> Result<()> {
        let name = name.into();
        if !is_valid_migration_name(&name) {
            return Err(MigrationError::InvalidMigrationName { name });
        }
        if self.migrations.contains_key(&name) {
            return Err(MigrationError::DuplicateMigration { name });
        }
        self.migrations.insert(name, migration);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(
        mut self,
        name: impl Into<String>,
        migration: impl Migration + 'static,
    ) -> Result<Self> {
        self.register(name, migration)?;
        Ok(self)
    }

    /// Look up a migration.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Migration>> {
        self.migrations.get(name).cloned()
    }

    /// Check if a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.migrations.contains_key(name)
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.migrations.keys().map(String::as_str)
    }

    /// Number of registered migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("migrations", &self.migrations.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Check a name against `YYYY_MM_DD_HHMMSS_description`.
pub fn is_valid_migration_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    // 4 + 1 + 2 + 1 + 2 + 1 + 6 + 1 = 18 byte prefix
    if bytes.len() < 19 {
        return false;
    }

    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    let prefix_ok = digits(0..4)
        && bytes[4] == b'_'
        && digits(5..7)
        && bytes[7] == b'_'
        && digits(8..10)
        && bytes[10] == b'_'
        && digits(11..17)
        && bytes[17] == b'_';

    prefix_ok
        && name[18..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
