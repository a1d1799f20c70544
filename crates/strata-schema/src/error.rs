//! Schema compilation errors.

use thiserror::Error;

/// Errors raised while validating or compiling a blueprint.
///
/// All of these are detected before any statement reaches a database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No grammar is registered for the requested dialect key.
    #[error("unsupported dialect: {0}")]
    DialectUnsupported(String),

    /// A blueprint was opened with an empty table name.
    #[error("table name must not be empty")]
    EmptyTableName,

    /// The same column was declared twice in one blueprint.
    #[error("duplicate column {column} on table {table}")]
    DuplicateColumn {
        /// Table being built.
        table: String,
        /// Column declared more than once.
        column: String,
    },

    /// Auto-increment was requested on a non-integer column.
    #[error("column {table}.{column} cannot auto-increment: not an integer type")]
    InvalidAutoIncrement {
        /// Table being built.
        table: String,
        /// Offending column.
        column: String,
    },

    /// An index, key, or drop command was given no columns.
    #[error("index on table {table} must name at least one column")]
    EmptyIndexColumns {
        /// Table being built.
        table: String,
    },

    /// A new table's index references a column the blueprint never declared.
    #[error("index on table {table} references undeclared column {column}")]
    UnknownIndexColumn {
        /// Table being built.
        table: String,
        /// Column that was not declared.
        column: String,
    },

    /// More than one primary key was declared for a table.
    #[error("table {table} declares more than one primary key")]
    MultiplePrimaryKeys {
        /// Table being built.
        table: String,
    },

    /// A foreign key is missing its referenced table or column.
    #[error("foreign key on {table}.{column} must name a referenced table and column")]
    IncompleteForeignKey {
        /// Table being built.
        table: String,
        /// Local column of the foreign key.
        column: String,
    },

    /// A command cannot appear in this kind of blueprint.
    #[error("command {command} conflicts with creating table {table}")]
    ConflictingCommand {
        /// Table being built.
        table: String,
        /// Name of the conflicting command.
        command: String,
    },

    /// The dialect has no SQL for this command.
    #[error("{dialect} does not support {command}")]
    UnsupportedCommand {
        /// Dialect that rejected the command.
        dialect: String,
        /// Description of the command.
        command: String,
    },
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
