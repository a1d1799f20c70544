//! Table blueprints.
//!
//! A [`Blueprint`] describes one create or alter operation on a table. It is
//! populated by a migration author, validated, handed to a
//! [`Grammar`](crate::Grammar) once, and then discarded.

use crate::column::{ColumnDefinition, ColumnType, DEFAULT_STRING_LENGTH};
use crate::error::{SchemaError, SchemaResult};
use crate::foreign::ForeignKeyDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Kind of index a command adds or drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Primary key.
    Primary,
    /// Unique index.
    Unique,
    /// Plain (non-unique) index.
    Plain,
}

impl IndexKind {
    /// Suffix used when generating index names.
    pub fn suffix(self) -> &'static str {
        match self {
            IndexKind::Primary => "primary",
            IndexKind::Unique => "unique",
            IndexKind::Plain => "index",
        }
    }
}

/// A table-level command recorded on a blueprint, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Create the table.
    Create,
    /// Add an index or key.
    AddIndex {
        /// Index kind.
        kind: IndexKind,
        /// Index name.
        name: String,
        /// Indexed columns, in order.
        columns: Vec<String>,
    },
    /// Add a foreign key constraint.
    AddForeignKey(ForeignKeyDefinition),
    /// Drop one or more columns.
    DropColumn {
        /// Columns to drop.
        names: Vec<String>,
    },
    /// Rename a column.
    RenameColumn {
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// Drop an index or key.
    DropIndex {
        /// Index kind.
        kind: IndexKind,
        /// Index name.
        name: String,
    },
    /// Drop a foreign key constraint.
    DropForeign {
        /// Constraint name.
        name: String,
    },
}

impl Command {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Create => "create",
            Command::AddIndex { .. } => "add_index",
            Command::AddForeignKey(_) => "add_foreign_key",
            Command::DropColumn { .. } => "drop_column",
            Command::RenameColumn { .. } => "rename_column",
            Command::DropIndex { .. } => "drop_index",
            Command::DropForeign { .. } => "drop_foreign",
        }
    }

    fn is_destructive(&self) -> bool {
        matches!(
            self,
            Command::DropColumn { .. }
                | Command::RenameColumn { .. }
                | Command::DropIndex { .. }
                | Command::DropForeign { .. }
        )
    }
}

/// In-memory description of one table operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    /// Target table.
    pub table: String,
    /// Whether this blueprint creates the table.
    pub creating: bool,
    /// Columns to add, in declaration order.
    pub columns: Vec<ColumnDefinition>,
    /// Commands, in declaration order.
    pub commands: Vec<Command>,
}

impl Blueprint {
    /// Start a blueprint that creates `table`.
    pub fn create(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            creating: true,
            columns: Vec::new(),
            commands: vec![Command::Create],
        }
    }

    /// Start a blueprint that alters an existing `table`.
    pub fn alter(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            creating: false,
            columns: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Add a column of the given type.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        column_type: ColumnType,
    ) -> &mut ColumnDefinition {
        let index = self.columns.len();
        self.columns.push(ColumnDefinition::new(name, column_type));
        &mut self.columns[index]
    }

    /// Auto-incrementing big integer primary key named `id`.
    pub fn id(&mut self) -> &mut ColumnDefinition {
        self.big_increments("id")
    }

    /// Auto-incrementing unsigned integer primary key.
    pub fn increments(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Integer)
            .unsigned()
            .auto_increment()
    }

    /// Auto-incrementing unsigned big integer primary key.
    pub fn big_increments(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::BigInteger)
            .unsigned()
            .auto_increment()
    }

    /// Variable-length string column.
    pub fn string(&mut self, name: impl Into<String>, length: u32) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::String).length(length)
    }

    /// String column with the default length.
    pub fn string_default(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.string(name, DEFAULT_STRING_LENGTH)
    }

    /// Text column.
    pub fn text(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Text)
    }

    /// Integer column.
    pub fn integer(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Integer)
    }

    /// Big integer column.
    pub fn big_integer(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::BigInteger)
    }

    /// Boolean column.
    pub fn boolean(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Boolean)
    }

    /// Timestamp column.
    pub fn timestamp(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Timestamp)
    }

    /// Nullable `created_at` and `updated_at` timestamps.
    pub fn timestamps(&mut self) {
        self.timestamp("created_at").nullable();
        self.timestamp("updated_at").nullable();
    }

    /// JSON column.
    pub fn json(&mut self, name: impl Into<String>) -> &mut ColumnDefinition {
        self.add_column(name, ColumnType::Json)
    }

    /// Add a (possibly composite) primary key.
    pub fn primary(&mut self, columns: &[&str]) {
        self.add_index(IndexKind::Primary, columns);
    }

    /// Add a unique index.
    pub fn unique(&mut self, columns: &[&str]) {
        self.add_index(IndexKind::Unique, columns);
    }

    /// Add a plain index.
    pub fn index(&mut self, columns: &[&str]) {
        self.add_index(IndexKind::Plain, columns);
    }

    fn add_index(&mut self, kind: IndexKind, columns: &[&str]) {
        let name = self.index_name(kind, columns);
        self.commands.push(Command::AddIndex {
            kind,
            name,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
    }

    /// Add a foreign key on `column`.
    ///
    /// ```
    /// use strata_schema::{Blueprint, ForeignAction};
    ///
    /// let mut table = Blueprint::create("posts");
    /// table.big_integer("user_id").unsigned();
    /// table.foreign("user_id").references("id").on("users").on_delete(ForeignAction::Cascade);
    /// ```
    pub fn foreign(&mut self, column: impl Into<String>) -> &mut ForeignKeyDefinition {
        let column = column.into();
        let name = format!("{}_{}_foreign", self.table, column).to_lowercase();
        self.commands
            .push(Command::AddForeignKey(ForeignKeyDefinition::new(name, column)));

        let Some(Command::AddForeignKey(definition)) = self.commands.last_mut() else {
            unreachable!("foreign key command was just pushed");
        };
        definition
    }

    /// Drop a column.
    pub fn drop_column(&mut self, name: impl Into<String>) {
        self.commands.push(Command::DropColumn {
            names: vec![name.into()],
        });
    }

    /// Drop several columns at once.
    pub fn drop_columns(&mut self, names: &[&str]) {
        if names.is_empty() {
            return;
        }
        self.commands.push(Command::DropColumn {
            names: names.iter().map(|n| n.to_string()).collect(),
        });
    }

    /// Rename a column.
    pub fn rename_column(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.commands.push(Command::RenameColumn {
            from: from.into(),
            to: to.into(),
        });
    }

    /// Drop the primary key.
    pub fn drop_primary(&mut self) {
        let name = self.index_name(IndexKind::Primary, &[]);
        self.commands.push(Command::DropIndex {
            kind: IndexKind::Primary,
            name,
        });
    }

    /// Drop a unique index by name.
    pub fn drop_unique(&mut self, name: impl Into<String>) {
        self.commands.push(Command::DropIndex {
            kind: IndexKind::Unique,
            name: name.into(),
        });
    }

    /// Drop a plain index by name.
    pub fn drop_index(&mut self, name: impl Into<String>) {
        self.commands.push(Command::DropIndex {
            kind: IndexKind::Plain,
            name: name.into(),
        });
    }

    /// Drop a foreign key by constraint name.
    pub fn drop_foreign(&mut self, name: impl Into<String>) {
        self.commands.push(Command::DropForeign { name: name.into() });
    }

    /// Conventional index name: `{table}_{columns}_{suffix}`, or
    /// `{table}_pkey` for primary keys.
    pub fn index_name(&self, kind: IndexKind, columns: &[&str]) -> String {
        let name = match kind {
            IndexKind::Primary => format!("{}_pkey", self.table),
            _ => format!("{}_{}_{}", self.table, columns.join("_"), kind.suffix()),
        };
        name.to_lowercase().replace(['-', '.'], "_")
    }

    /// Columns flagged as primary key.
    pub fn primary_columns(&self) -> Vec<&ColumnDefinition> {
        self.columns.iter().filter(|c| c.primary).collect()
    }

    /// Check the blueprint for errors that no dialect could compile.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.table.trim().is_empty() {
            return Err(SchemaError::EmptyTableName);
        }

        let mut declared = HashSet::new();
        for column in &self.columns {
            if !declared.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.table.clone(),
                    column: column.name.clone(),
                });
            }
            if column.auto_increment && !column.column_type.is_integer() {
                return Err(SchemaError::InvalidAutoIncrement {
                    table: self.table.clone(),
                    column: column.name.clone(),
                });
            }
        }

        let mut primary_keys = self.primary_columns().len();
        for command in &self.commands {
            if self.creating && command.is_destructive() {
                return Err(SchemaError::ConflictingCommand {
                    table: self.table.clone(),
                    command: command.name().to_string(),
                });
            }

            match command {
                Command::AddIndex { kind, columns, .. } => {
                    if columns.is_empty() {
                        return Err(SchemaError::EmptyIndexColumns {
                            table: self.table.clone(),
                        });
                    }
                    if *kind == IndexKind::Primary {
                        primary_keys += 1;
                    }
                    if self.creating {
                        for column in columns {
                            self.ensure_declared(&declared, column)?;
                        }
                    }
                }
                Command::AddForeignKey(foreign) => {
                    if !foreign.is_complete() {
                        return Err(SchemaError::IncompleteForeignKey {
                            table: self.table.clone(),
                            column: foreign.column.clone(),
                        });
                    }
                    if self.creating {
                        self.ensure_declared(&declared, &foreign.column)?;
                    }
                }
                _ => {}
            }
        }

        if primary_keys > 1 {
            return Err(SchemaError::MultiplePrimaryKeys {
                table: self.table.clone(),
            });
        }

        Ok(())
    }

    fn ensure_declared(&self, declared: &HashSet<&str>, column: &str) -> SchemaResult<()> {
        if declared.contains(column) {
            Ok(())
        } else {
            Err(SchemaError::UnknownIndexColumn {
                table: self.table.clone(),
                column: column.to_string(),
            })
        }
    }
}
