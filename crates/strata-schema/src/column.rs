//! Column definitions for table blueprints.

use serde::{Deserialize, Serialize};

/// Default length used by `string` columns when none is given.
pub const DEFAULT_STRING_LENGTH: u32 = 255;

/// Logical column type, mapped to a concrete SQL type by each grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Variable-length string with a maximum length.
    String,
    /// Unbounded text.
    Text,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInteger,
    /// Boolean flag.
    Boolean,
    /// Date and time without zone.
    Timestamp,
    /// JSON document.
    Json,
}

impl ColumnType {
    /// Whether the type can carry an auto-increment modifier.
    pub fn is_integer(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::BigInteger)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::String => write!(f, "string"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::BigInteger => write!(f, "big_integer"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::Json => write!(f, "json"),
        }
    }
}

/// Default value attached to a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// SQL `NULL`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Integer(i64),
    /// String literal, quoted by the grammar.
    String(String),
    /// Raw SQL expression emitted verbatim (e.g. `CURRENT_TIMESTAMP`).
    Expression(String),
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        DefaultValue::Bool(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        DefaultValue::Integer(value)
    }
}

impl From<i32> for DefaultValue {
    fn from(value: i32) -> Self {
        DefaultValue::Integer(i64::from(value))
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        DefaultValue::String(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        DefaultValue::String(value)
    }
}

/// A column to be added by a blueprint.
///
/// Modifiers return `&mut Self` so they chain off the blueprint method that
/// declared the column:
///
/// ```
/// use strata_schema::Blueprint;
///
/// let mut table = Blueprint::create("users");
/// table.string("email", 120).nullable().comment("login address");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Logical type.
    pub column_type: ColumnType,
    /// Maximum length for string columns.
    pub length: Option<u32>,
    /// Whether `NULL` is allowed.
    pub nullable: bool,
    /// Default value, if any.
    pub default: Option<DefaultValue>,
    /// Unsigned integer (honored by MySQL only).
    pub unsigned: bool,
    /// Auto-incrementing integer key.
    pub auto_increment: bool,
    /// Column is the table's primary key. Composite keys use
    /// `Blueprint::primary` instead.
    pub primary: bool,
    /// Column comment.
    pub comment: Option<String>,
}

impl ColumnDefinition {
    /// Create a non-nullable column with no modifiers.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            length: None,
            nullable: false,
            default: None,
            unsigned: false,
            auto_increment: false,
            primary: false,
            comment: None,
        }
    }

    /// Allow `NULL` values.
    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    /// Set the default value.
    pub fn default(&mut self, value: impl Into<DefaultValue>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    /// Use a raw SQL expression as the default.
    pub fn default_raw(&mut self, expression: impl Into<String>) -> &mut Self {
        self.default = Some(DefaultValue::Expression(expression.into()));
        self
    }

    /// Mark an integer column unsigned.
    pub fn unsigned(&mut self) -> &mut Self {
        self.unsigned = true;
        self
    }

    /// Make the column auto-increment. Implies primary key.
    pub fn auto_increment(&mut self) -> &mut Self {
        self.auto_increment = true;
        self.primary = true;
        self
    }

    /// Make this column the primary key.
    pub fn primary(&mut self) -> &mut Self {
        self.primary = true;
        self
    }

    /// Attach a comment.
    pub fn comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = Some(comment.into());
        self
    }

    /// Override the maximum length.
    pub fn length(&mut self, length: u32) -> &mut Self {
        self.length = Some(length);
        self
    }
}
