//! MySQL / MariaDB grammar.

use super::{default_literal, quote_identifier, quote_string, Dialect, Grammar};
use crate::blueprint::{Blueprint, Command, IndexKind};
use crate::column::{ColumnDefinition, ColumnType, DEFAULT_STRING_LENGTH};
use crate::error::SchemaResult;

/// Grammar for MySQL-family databases.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlGrammar;

impl MySqlGrammar {
    fn type_name(&self, column: &ColumnDefinition) -> String {
        match column.column_type {
            ColumnType::String => {
                format!("varchar({})", column.length.unwrap_or(DEFAULT_STRING_LENGTH))
            }
            ColumnType::Text => "text".to_string(),
            ColumnType::Integer => "int".to_string(),
            ColumnType::BigInteger => "bigint".to_string(),
            ColumnType::Boolean => "tinyint(1)".to_string(),
            ColumnType::Timestamp => "timestamp".to_string(),
            ColumnType::Json => "json".to_string(),
        }
    }
}

impl Grammar for MySqlGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn wrap(&self, identifier: &str) -> String {
        quote_identifier(identifier, '`')
    }

    fn parameter(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn column_definition(&self, column: &ColumnDefinition) -> String {
        let mut sql = format!("{} {}", self.wrap(&column.name), self.type_name(column));

        if column.unsigned && column.column_type.is_integer() {
            sql.push_str(" unsigned");
        }
        sql.push_str(if column.nullable { " null" } else { " not null" });
        if let Some(default) = &column.default {
            let literal = default_literal(default, |flag| {
                (if flag { "'1'" } else { "'0'" }).to_string()
            });
            sql.push_str(&format!(" default {}", literal));
        }
        if column.auto_increment {
            sql.push_str(" auto_increment primary key");
        } else if column.primary {
            sql.push_str(" primary key");
        }
        if let Some(comment) = &column.comment {
            sql.push_str(&format!(" comment {}", quote_string(comment)));
        }
        sql
    }

    fn compile_create(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let columns: Vec<String> = blueprint
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();

        Ok(vec![format!(
            "create table {} ({})",
            self.wrap(&blueprint.table),
            columns.join(", ")
        )])
    }

    fn compile_add(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let columns: Vec<String> = blueprint
            .columns
            .iter()
            .map(|c| format!("add {}", self.column_definition(c)))
            .collect();

        Ok(vec![format!(
            "alter table {} {}",
            self.wrap(&blueprint.table),
            columns.join(", ")
        )])
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
                "alter table {} add unique {}({})",
                table,
                self.wrap(name),
                self.columnize(columns)
            ),
            Command::AddIndex {
                kind: IndexKind::Plain,
                name,
                columns,
            } => format!(
                "alter table {} add index {}({})",
                table,
                self.wrap(name),
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
                    .map(|n| format!("drop {}", self.wrap(n)))
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
                kind: IndexKind::Primary,
                ..
            } => format!("alter table {} drop primary key", table),
            Command::DropIndex { name, .. } => {
                format!("alter table {} drop index {}", table, self.wrap(name))
            }
            Command::DropForeign { name } => {
                format!("alter table {} drop foreign key {}", table, self.wrap(name))
            }
        };

        Ok(vec![sql])
    }

    fn compile_rename(&self, from: &str, to: &str) -> String {
        format!("rename table {} to {}", self.wrap(from), self.wrap(to))
    }

    fn compile_table_exists(&self) -> String {
        "select count(*) from information_schema.tables \
         where table_schema = database() and table_name = ? and table_type = 'BASE TABLE'"
            .to_string()
    }

    fn compile_column_listing(&self) -> String {
        "select column_name from information_schema.columns \
         where table_schema = database() and table_name = ? order by ordinal_position"
            .to_string()
    }
}
