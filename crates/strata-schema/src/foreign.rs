//! Foreign key definitions.

use serde::{Deserialize, Serialize};

/// Referential action for `ON DELETE` / `ON UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignAction {
    /// Propagate the change to referencing rows.
    Cascade,
    /// Reject the change while referencing rows exist.
    Restrict,
    /// Set referencing columns to `NULL`.
    SetNull,
    /// Defer to the database default.
    NoAction,
}

impl std::fmt::Display for ForeignAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForeignAction::Cascade => write!(f, "cascade"),
            ForeignAction::Restrict => write!(f, "restrict"),
            ForeignAction::SetNull => write!(f, "set null"),
            ForeignAction::NoAction => write!(f, "no action"),
        }
    }
}

/// A foreign key constraint declared on a blueprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    /// Constraint name.
    pub name: String,
    /// Local column.
    pub column: String,
    /// Referenced column.
    pub references_column: String,
    /// Referenced table.
    pub references_table: String,
    /// Action on delete of the referenced row.
    pub on_delete: Option<ForeignAction>,
    /// Action on update of the referenced key.
    pub on_update: Option<ForeignAction>,
}

impl ForeignKeyDefinition {
    /// Create an incomplete foreign key on `column`; finish it with
    /// [`references`](Self::references) and [`on`](Self::on).
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            references_column: String::new(),
            references_table: String::new(),
            on_delete: None,
            on_update: None,
        }
    }

    /// Set the referenced column.
    pub fn references(&mut self, column: impl Into<String>) -> &mut Self {
        self.references_column = column.into();
        self
    }

    /// Set the referenced table.
    pub fn on(&mut self, table: impl Into<String>) -> &mut Self {
        self.references_table = table.into();
        self
    }

    /// Set the `ON DELETE` action.
    pub fn on_delete(&mut self, action: ForeignAction) -> &mut Self {
        self.on_delete = Some(action);
        self
    }

    /// Set the `ON UPDATE` action.
    pub fn on_update(&mut self, action: ForeignAction) -> &mut Self {
        self.on_update = Some(action);
        self
    }

    /// Shorthand for `on_delete(Cascade)`.
    pub fn cascade_on_delete(&mut self) -> &mut Self {
        self.on_delete(ForeignAction::Cascade)
    }

    /// Whether both sides of the reference are named.
    pub fn is_complete(&self) -> bool {
        !self.references_column.is_empty() && !self.references_table.is_empty()
    }
}
