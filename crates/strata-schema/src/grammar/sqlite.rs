//! SQLite grammar.
//!
//! SQLite cannot add keys to an existing table, so primary and foreign keys
//! are inlined into `create table` and rejected on alter.

use super::{default_literal, quote_identifier, unsupported, Dialect, Grammar};
use crate::blueprint::{Blueprint, Command, IndexKind};
use crate::column::{ColumnDefinition, ColumnType};
use crate::error::SchemaResult;

/// Grammar for SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGrammar;

impl SqliteGrammar {
    fn type_name(&self, column: &ColumnDefinition) -> &'static str {
        match column.column_type {
            ColumnType::String => "varchar",
            ColumnType::Text | ColumnType::Json => "text",
            ColumnType::Integer | ColumnType::BigInteger => "integer",
            ColumnType::Boolean => "tinyint(1)",
            ColumnType::Timestamp => "datetime",
        }
    }
}

impl Grammar for SqliteGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn wrap(&self, identifier: &str) -> String {
        quote_identifier(identifier, '"')
    }

    fn parameter(&self, index: usize) -> String {
        format!("?{}", index)
    }

    fn column_definition(&self, column: &ColumnDefinition) -> String {
        let mut sql = format!("{} {}", self.wrap(&column.name), self.type_name(column));

        if column.auto_increment {
            sql.push_str(" primary key autoincrement");
        } else if column.primary {
            sql.push_str(" primary key");
        }
        sql.push_str(if column.nullable { " null" } else { " not null" });
        if let Some(default) = &column.default {
            let literal = default_literal(default, |flag| u8::from(flag).to_string());
            sql.push_str(&format!(" default {}", literal));
        }
        sql
    }

    fn compile_create(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let mut parts: Vec<String> = blueprint
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();

        for command in &blueprint.commands {
            match command {
                Command::AddIndex {
                    kind: IndexKind::Primary,
                    columns,
                    ..
                } => parts.push(format!("primary key ({})", self.columnize(columns))),
                Command::AddForeignKey(foreign) => parts.push(self.foreign_key_clause(foreign)),
                _ => {}
            }
        }

        Ok(vec![format!(
            "create table {} ({})",
            self.wrap(&blueprint.table),
            parts.join(", ")
        )])
    }

    fn compile_add(&self, blueprint: &Blueprint) -> SchemaResult<Vec<String>> {
        let table = self.wrap(&blueprint.table);

        blueprint
            .columns
            .iter()
            .map(|column| {
                if column.primary {
                    return Err(unsupported(
                        self.dialect(),
                        format!("adding primary key column {}", column.name),
                    ));
                }
                Ok(format!(
                    "alter table {} add column {}",
                    table,
                    self.column_definition(column)
                ))
            })
            .collect()
    }

    fn compile_command(
        &self,
        blueprint: &Blueprint,
        command: &Command,
    ) -> SchemaResult<Vec<String>> {
        let table = self.wrap(&blueprint.table);

        let statements = match command {
            Command::Create => return self.compile_create(blueprint),
            Command::AddIndex {
                kind: IndexKind::Primary,
                ..
            }
            | Command::AddForeignKey(_)
                if blueprint.creating =>
            {
                Vec::new()
            }
            Command::AddIndex {
                kind: IndexKind::Primary,
                ..
            } => return Err(unsupported(self.dialect(), "adding a primary key")),
            Command::AddForeignKey(foreign) => {
                return Err(unsupported(
                    self.dialect(),
                    format!("adding foreign key {}", foreign.name),
                ))
            }
            Command::AddIndex {
                kind: IndexKind::Unique,
                name,
                columns,
            } => vec![format!(
                "create unique index {} on {} ({})",
                self.wrap(name),
                table,
                self.columnize(columns)
            )],
            Command::AddIndex {
                kind: IndexKind::Plain,
                name,
                columns,
            } => vec![format!(
                "create index {} on {} ({})",
                self.wrap(name),
                table,
                self.columnize(columns)
            )],
            Command::DropColumn { names } => names
                .iter()
                .map(|n| format!("alter table {} drop column {}", table, self.wrap(n)))
                .collect(),
            Command::RenameColumn { from, to } => vec![format!(
                "alter table {} rename column {} to {}",
                table,
                self.wrap(from),
                self.wrap(to)
            )],
            Command::DropIndex {
                kind: IndexKind::Primary,
                ..
            } => return Err(unsupported(self.dialect(), "dropping a primary key")),
            Command::DropIndex { name, .. } => vec![format!("drop index {}", self.wrap(name))],
            Command::DropForeign { name } => {
                return Err(unsupported(
                    self.dialect(),
                    format!("dropping foreign key {}", name),
                ))
            }
        };

        Ok(statements)
    }

    fn compile_rename(&self, from: &str, to: &str) -> String {
        format!("alter table {} rename to {}", self.wrap(from), self.wrap(to))
    }

    fn compile_table_exists(&self) -> String {
        "select count(*) from sqlite_master where type = 'table' and name = ?1".to_string()
    }

    fn compile_column_listing(&self) -> String {
        "select name from pragma_table_info(?1) order by cid".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::foreign::ForeignAction;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_inlines_keys() {
        let mut table = Blueprint::create("posts");
        table.id();
        table.big_integer("user_id");
        table.string("title", 200).default("untitled");
        table.boolean("draft").default(true);
        table
            .foreign("user_id")
            .references("id")
            .on("users")
            .on_delete(ForeignAction::Cascade);
        table.index(&["user_id"]);

        let sql = SqliteGrammar.compile(&table).unwrap();
        assert_eq!(
            sql,
            vec![
                "create table \"posts\" (\"id\" integer primary key autoincrement not null, \
                 \"user_id\" integer not null, \
                 \"title\" varchar not null default 'untitled', \
                 \"draft\" tinyint(1) not null default 1, \
                 foreign key (\"user_id\") references \"users\" (\"id\") on delete cascade)"
                    .to_string(),
                "create index \"posts_user_id_index\" on \"posts\" (\"user_id\")".to_string(),
            ]
        );
    }

    #[test]
    fn test_composite_primary_key() {
        let mut table = Blueprint::create("role_user");
        table.integer("role_id");
        table.integer("user_id");
        table.primary(&["role_id", "user_id"]);

        let sql = SqliteGrammar.compile(&table).unwrap();
        assert_eq!(
            sql,
            vec![
                "create table \"role_user\" (\"role_id\" integer not null, \
                 \"user_id\" integer not null, primary key (\"role_id\", \"user_id\"))"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_alter_emits_one_statement_per_column() {
        let mut table = Blueprint::alter("users");
        table.string("nickname", 40).nullable();
        table.json("settings").nullable();
        table.drop_columns(&["a", "b"]);

        let sql = SqliteGrammar.compile(&table).unwrap();
        assert_eq!(
            sql,
            vec![
                "alter table \"users\" add column \"nickname\" varchar null".to_string(),
                "alter table \"users\" add column \"settings\" text null".to_string(),
                "alter table \"users\" drop column \"a\"".to_string(),
                "alter table \"users\" drop column \"b\"".to_string(),
            ]
        );
    }

    #[test]
    fn test_alter_rejects_foreign_keys() {
        let mut table = Blueprint::alter("posts");
        table.foreign("user_id").references("id").on("users");

        assert!(matches!(
            SqliteGrammar.compile(&table),
            Err(SchemaError::UnsupportedCommand { dialect, .. }) if dialect == "sqlite"
        ));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(SqliteGrammar.parameter(1), "?1");
        assert!(SqliteGrammar.compile_table_exists().contains("?1"));
    }
}
