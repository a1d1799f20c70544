//! PostgreSQL grammar.

use super::{default_literal, quote_identifier, quote_string, Dialect, Grammar};
use crate::blueprint::{Blueprint, Command, IndexKind};
use crate::column::{ColumnDefinition, ColumnType, DEFAULT_STRING_LENGTH};
use crate::error::SchemaResult;

/// Grammar for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGrammar;

impl PostgresGrammar {
    fn type_name(&self, column: &ColumnDefinition) -> String {
        match column.column_type {
            ColumnType::String => {
                format!("varchar({})", column.length.unwrap_or(DEFAULT_STRING_LENGTH))
            }
            ColumnType::Text => "text".to_string(),
            ColumnType::Integer if column.auto_increment => "serial".to_string(),
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInteger if column.auto_increment => "bigserial".to_string(),
            ColumnType::BigInteger => "bigint".to_string(),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Timestamp => "timestamp(0) without time zone".to_string(),
            ColumnType::Json => "json".to_string(),
        }
    }

    /// `comment on column` statements for commented columns.
    fn comment_statements(&self, blueprint: &Blueprint) -> Vec<String> {
        blueprint
            .columns
            .iter()
            .filter_map(|column| {
                column.comment.as_ref().map(|comment| {
                    format!(
                        "comment on column {}.{} is {}",
                        self.wrap(&blueprint.table),
                        self.wrap(&column.name),
                        quote_string(comment)
                    )
                })
            })
            .collect()
    }
}

impl Grammar for PostgresGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn wrap(&self, identifier: &str) -> String {
        quote_identifier(identifier, '"')
    }

    fn parameter(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn column_definition(&self, column: &ColumnDefinition) -> String {
        let mut sql = format!("{} {}", self.wrap(&column.name), self.type_name(column));

        sql.push_str(if column.nullable { " null" } else { " not null" });
        if let Some(default) = &column.default {
            let literal = default_literal(default, |flag| flag.to_string());
            sql.push_str(&format!(" default {}", literal));
        }
        if column.primary {
            sql.push_str(" primary key");
        }
        sql
    }

    fn compile_create(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let columns: Vec<String> = blueprint
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();

        let mut statements = vec![format!(
            "create table {} ({})",
            self.wrap(&blueprint.table),
            columns.join(", ")
        )];
        statements.extend(self.comment_statements(blueprint));
        Ok(statements)
    }

    fn compile_add(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let columns: Vec<String> = blueprint
            .columns
            .iter()
            .map(|c| format!("add column {}", self.column_definition(c)))
            .collect();

        let mut statements = vec![format!(
            "alter table {} {}",
            self.wrap(&blueprint.table),
            columns.join(", ")
        )];
        statements.extend(self.comment_statements(blueprint));
        Ok(statements)
    }

    fn compile_command(
        &self,
        blueprint: &Blueprint,
        command: &Command,
    ) -> SchemaResult<Vec<String>> {
        let table = self.wrap(&blueprint.table);

        let sql = match command {
            Command::Create => return self.compile_create(blueprint),
            Command::AddIndex {
                kind: IndexKind::Primary,
                columns,
                ..
            } => format!("alter table {} add primary key ({})", table, self.columnize(columns)),
            Command::AddIndex {
                kind: IndexKind::Unique,
                name,
                columns,
            } => format!(
                "alter table {} add constraint {} unique ({})",
                table,
                self.wrap(name),
                self.columnize(columns)
            ),
            Command::AddIndex {
                kind: IndexKind::Plain,
                name,
                columns,
            } => format!(
                "create index {} on {} ({})",
                self.wrap(name),
                table,
                self.columnize(columns)
            ),
            Command::AddForeignKey(foreign) => format!(
                "alter table {} add constraint {} {}",
                table,
                self.wrap(&foreign.name),
                self.foreign_key_clause(foreign)
            ),
            Command::DropColumn { names } => {
                let drops: Vec<String> = names
                    .iter()
                    .map(|n| format!("drop column {}", self.wrap(n)))
                    .collect();
                format!("alter table {} {}", table, drops.join(", "))
            }
            Command::RenameColumn { from, to } => format!(
                "alter table {} rename column {} to {}",
                table,
                self.wrap(from),
                self.wrap(to)
            ),
            Command::DropIndex {
                kind: IndexKind::Plain,
                name,
            } => format!("drop index {}", self.wrap(name)),
            Command::DropIndex { name, .. } | Command::DropForeign { name } => {
                format!("alter table {} drop constraint {}", table, self.wrap(name))
            }
        };

        Ok(vec![sql])
    }

    fn compile_rename(&self, from: &str, to: &str) -> String {
        format!("alter table {} rename to {}", self.wrap(from), self.wrap(to))
    }

    fn compile_table_exists(&self) -> String {
        "select count(*) from information_schema.tables \
         where table_schema = current_schema() and table_name = $1 and table_type = 'BASE TABLE'"
            .to_string()
    }

    fn compile_column_listing(&self) -> String {
        "select column_name from information_schema.columns \
         where table_schema = current_schema() and table_name = $1 order by ordinal_position"
            .to_string()
    }
}
