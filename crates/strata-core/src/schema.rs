//! Schema builder façade.
//!
//! [`Schema`] opens a [`Blueprint`], hands it to the caller to populate,
//! compiles it with the connection's grammar, and executes the statements in
//! order. Against a [`PretendConnection`](crate::PretendConnection) the
//! statements are captured instead.

use crate::connection::{Connection, Value};
use crate::error::Result;
use strata_schema::{Blueprint, Grammar};
use tracing::debug;

/// Table-level DDL operations against one connection.
pub struct Schema<'a> {
    connection: &'a dyn Connection,
    grammar: Box<dyn Grammar>,
}

impl<'a> Schema<'a> {
    /// Create a builder using the grammar of the connection's dialect.
    pub fn new(connection: &'a dyn Connection) -> Self {
        Self {
            grammar: connection.dialect().grammar(),
            connection,
        }
    }

    /// Create a builder with an explicit grammar.
    pub fn with_grammar(connection: &'a dyn Connection, grammar: Box<dyn Grammar>) -> Self {
        Self {
            connection,
            grammar,
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &dyn Connection {
        self.connection
    }

    /// The active grammar.
    pub fn grammar(&self) -> &dyn Grammar {
        self.grammar.as_ref()
    }

    /// Whether statements are being captured instead of executed.
    pub fn is_pretending(&self) -> bool {
        self.connection.is_pretending()
    }

    /// Create a table.
    pub fn create_table(
        &self,
        table: &str,
        populate: impl FnOnce(&mut Blueprint),
    ) -> Result<Vec<String>> {
        let mut blueprint = Blueprint::create(table);
        populate(&mut blueprint);
        self.build(&blueprint)
    }

    /// Modify an existing table.
    pub fn alter_table(
        &self,
        table: &str,
        populate: impl FnOnce(&mut Blueprint),
    ) -> Result<Vec<String>> {
        let mut blueprint = Blueprint::alter(table);
        populate(&mut blueprint);
        self.build(&blueprint)
    }

    /// Drop a table.
    pub fn drop_table(&self, table: &str) -> Result<Vec<String>> {
        self.run(vec![self.grammar.compile_drop(table)])
    }

    /// Drop a table if it exists.
    pub fn drop_table_if_exists(&self, table: &str) -> Result<Vec<String>> {
        self.run(vec![self.grammar.compile_drop_if_exists(table)])
    }

    /// Rename a table.
    pub fn rename_table(&self, from: &str, to: &str) -> Result<Vec<String>> {
        self.run(vec![self.grammar.compile_rename(from, to)])
    }

    /// Check whether a table exists.
    pub fn has_table(&self, table: &str) -> Result<bool> {
        let sql = self.grammar.compile_table_exists();
        let rows = self.connection.query(&sql, &[Value::from(table)])?;
        match rows.first() {
            Some(row) => Ok(row.get_integer(0)? > 0),
            None => Ok(false),
        }
    }

    /// Check whether a table has a column. Names compare case-insensitively.
    pub fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self
            .column_listing(table)?
            .iter()
            .any(|name| name.eq_ignore_ascii_case(column)))
    }

    /// Column names of a table, in ordinal order.
    pub fn column_listing(&self, table: &str) -> Result<Vec<String>> {
        let sql = self.grammar.compile_column_listing();
        self.connection
            .query(&sql, &[Value::from(table)])?
            .iter()
            .map(|row| row.get_text(0).map(str::to_string))
            .collect()
    }

    /// Execute a raw statement.
    pub fn statement(&self, sql: &str) -> Result<Vec<String>> {
        self.run(vec![sql.to_string()])
    }

    fn build(&self, blueprint: &Blueprint) -> Result<Vec<String>> {
        let statements = self.grammar.compile(blueprint)?;
        self.run(statements)
    }

    fn run(&self, statements: Vec<String>) -> Result<Vec<String>> {
        for sql in &statements {
            debug!(sql = %sql, pretend = self.is_pretending(), "schema statement");
            self.connection.execute(sql, &[])?;
        }
        Ok(statements)
    }
}
