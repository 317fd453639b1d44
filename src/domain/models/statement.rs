//! Parameterized statements and the clause fragments the query builder produces.

use super::value::SqlValue;

/// Whether a statement produces rows (SELECT, `... RETURNING *`) or only a row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Execute,
}

/// SQL text with `$n` placeholders and the values bound to them, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub values: Vec<SqlValue>,
    pub kind: StatementKind,
}

impl Statement {
    /// A statement whose rows are returned to the caller.
    pub fn query(sql: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            values,
            kind: StatementKind::Query,
        }
    }

    /// A statement run only for its affected-row count.
    pub fn execute(sql: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            values,
            kind: StatementKind::Execute,
        }
    }

    pub fn returns_rows(&self) -> bool {
        self.kind == StatementKind::Query
    }
}

/// Rendered WHERE clause. `clause` is empty when the filter has no conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    pub clause: String,
    pub values: Vec<SqlValue>,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertClause {
    pub columns: String,
    pub placeholders: String,
    pub values: Vec<SqlValue>,
}

/// `col = $2, ...`; `$1` is left for the row id.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateClause {
    pub set_clause: String,
    pub values: Vec<SqlValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: String,
    pub on: String,
}

impl Join {
    pub fn new(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            on: on.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

impl Default for OrderBy {
    fn default() -> Self {
        Self {
            column: "id".to_string(),
            direction: SortDirection::Asc,
        }
    }
}
