//! Strata Schema
//!
//! Table blueprints and the SQL grammars that compile them. This crate is
//! pure: it never talks to a database.
//!
//! # Usage
//!
//! ```rust
//! use strata_schema::{grammar_for, Blueprint};
//!
//! let mut table = Blueprint::create("users");
//! table.id();
//! table.string("email", 255);
//! table.unique(&["email"]);
//!
//! let grammar = grammar_for("sqlite").unwrap();
//! let statements = grammar.compile(&table).unwrap();
//! assert_eq!(statements.len(), 2);
//! ```

pub mod blueprint;
pub mod column;
pub mod error;
pub mod foreign;
pub mod grammar;

// Re-export main types
pub use blueprint::{Blueprint, Command, IndexKind};
pub use column::{ColumnDefinition, ColumnType, DefaultValue, DEFAULT_STRING_LENGTH};
pub use error::{SchemaError, SchemaResult};
pub use foreign::{ForeignAction, ForeignKeyDefinition};
pub use grammar::{grammar_for, Dialect, Grammar, MySqlGrammar, PostgresGrammar, SqliteGrammar};
