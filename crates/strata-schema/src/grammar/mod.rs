//! Dialect-specific SQL compilers.
//!
//! Each [`Grammar`] is a pure mapping from a [`Blueprint`] to an ordered list
//! of SQL statements. Grammars are selected by [`Dialect`] or by a dialect key
//! through [`grammar_for`].

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlGrammar;
pub use postgres::PostgresGrammar;
pub use sqlite::SqliteGrammar;

use crate::blueprint::{Blueprint, Command};
use crate::column::{ColumnDefinition, DefaultValue};
use crate::error::{SchemaError, SchemaResult};
use crate::foreign::ForeignKeyDefinition;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// MySQL and MariaDB.
    MySql,
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// The grammar for this dialect.
    pub fn grammar(self) -> Box<dyn Grammar> {
        match self {
            Dialect::MySql => Box::new(MySqlGrammar),
            Dialect::Postgres => Box::new(PostgresGrammar),
            Dialect::Sqlite => Box::new(SqliteGrammar),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for Dialect {
    type Err = SchemaError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" | "pgsql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            _ => Err(SchemaError::DialectUnsupported(key.to_string())),
        }
    }
}

/// Look up a grammar by dialect key (`"mysql"`, `"postgres"`, `"sqlite"`, ...).
pub fn grammar_for(key: &str) -> SchemaResult<Box<dyn Grammar>> {
    key.parse::<Dialect>().map(Dialect::grammar)
}

/// Compiles blueprints and table-level operations into SQL for one dialect.
pub trait Grammar: Send + Sync {
    /// Dialect this grammar targets.
    fn dialect(&self) -> Dialect;

    /// Quote an identifier.
    fn wrap(&self, identifier: &str) -> String;

    /// Bound-parameter placeholder for the 1-based `index`.
    fn parameter(&self, index: usize) -> String;

    /// Full column definition as it appears in `create table` / `add column`.
    fn column_definition(&self, column: &ColumnDefinition) -> String;

    /// Statements that create the table described by `blueprint`.
    fn compile_create(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>>;

    /// Statements that add `blueprint.columns` to an existing table.
    fn compile_add(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>>;

    /// Statements for one non-create command.
    fn compile_command(
        &self,
        blueprint: &Blueprint,
        command: &Command,
    ) -> SchemaResult<Vec<String>>;

    /// Rename a table.
    fn compile_rename(&self, from: &str, to: &str) -> String;

    /// Query returning a single count row; binds the table name as parameter 1.
    fn compile_table_exists(&self) -> String;

    /// Query returning one row per column name; binds the table name as parameter 1.
    fn compile_column_listing(&self) -> String;

    /// Compile a blueprint, preserving column and command declaration order.
    fn compile(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        blueprint.validate()?;

        let mut statements = Vec::new();
        if !blueprint.creating && !blueprint.columns.is_empty() {
            statements.extend(self.compile_add(blueprint)?);
        }
        for command in &blueprint.commands {
            match command {
                Command::Create => statements.extend(self.compile_create(blueprint)?),
                other => statements.extend(self.compile_command(blueprint, other)?),
            }
        }
        Ok(statements)
    }

    /// Drop a table.
    fn compile_drop(&self, table: &str) -> String {
        format!("drop table {}", self.wrap(table))
    }

    /// Drop a table if it exists.
    fn compile_drop_if_exists(&self, table: &str) -> String {
        format!("drop table if exists {}", self.wrap(table))
    }

    /// Comma-separated list of wrapped identifiers.
    fn columnize(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.wrap(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `foreign key (...) references ... (...)` clause with actions.
    fn foreign_key_clause(&self, foreign: &ForeignKeyDefinition) -> String {
        let mut sql = format!(
            "foreign key ({}) references {} ({})",
            self.wrap(&foreign.column),
            self.wrap(&foreign.references_table),
            self.wrap(&foreign.references_column),
        );
        if let Some(action) = foreign.on_delete {
            sql.push_str(&format!(" on delete {}", action));
        }
        if let Some(action) = foreign.on_update {
            sql.push_str(&format!(" on update {}", action));
        }
        sql
    }
}

/// Quote an identifier with `quote`, doubling embedded quote characters.
pub(crate) fn quote_identifier(identifier: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    let escaped = identifier.replace(quote, &doubled);
    format!("{quote}{escaped}{quote}")
}

/// Quote a string literal.
pub(crate) fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a default value; booleans are rendered by the caller's dialect.
pub(crate) fn default_literal(value: &DefaultValue, boolean: fn(bool) -> String) -> String {
    match value {
        DefaultValue::Null => "null".to_string(),
        DefaultValue::Bool(flag) => boolean(*flag),
        DefaultValue::Integer(number) => number.to_string(),
        DefaultValue::String(text) => quote_string(text),
        DefaultValue::Expression(expression) => expression.clone(),
    }
}

pub(crate) fn unsupported(dialect: Dialect, command: impl Into<String>) -> SchemaError {
    SchemaError::UnsupportedCommand {
        dialect: dialect.to_string(),
        command: command.into(),
    }
}
