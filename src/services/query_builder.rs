//! Parameterized SQL construction.
//!
//! Filters become WHERE clauses with `$n` placeholders; every rendered condition reports
//! the values it consumed, and the running placeholder index advances by exactly that
//! count. The rendered text is never inspected to recover the index, so values that
//! look like placeholders cannot shift it.

use std::borrow::Cow;

use crate::domain::models::{
    to_snake_case, ColumnNaming, Condition, FieldSet, Filter, FilterClause, InsertClause, Join,
    OrderBy, SortDirection, SqlValue, Statement, UpdateClause, WhereClause,
};

/// Inputs to [`QueryBuilder::build_select_query_with_joins`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub columns: Vec<String>,
    pub joins: Vec<Join>,
    pub filter: Filter,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub order_by: OrderBy,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: vec!["*".to_string()],
            joins: Vec::new(),
            filter: Filter::new(),
            limit: None,
            offset: None,
            order_by: OrderBy::default(),
        }
    }

    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn join(mut self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins.push(Join::new(table, on));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = OrderBy {
            column: column.into(),
            direction,
        };
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder {
    naming: ColumnNaming,
}

impl QueryBuilder {
    pub const fn new() -> Self {
        Self {
            naming: ColumnNaming::InsertOnly,
        }
    }

    pub const fn with_naming(naming: ColumnNaming) -> Self {
        Self { naming }
    }

    /// Render `filter` as `WHERE ...`, numbering placeholders from `start_index`.
    ///
    /// An empty filter yields an empty clause.
    pub fn build_where_clause(&self, filter: &Filter, start_index: usize) -> WhereClause {
        let (conditions, values) = self.render_conditions(filter, start_index);
        if conditions.is_empty() {
            return WhereClause::default();
        }
        WhereClause {
            clause: format!("WHERE {conditions}"),
            values,
        }
    }

    /// Conditions joined by AND (no `WHERE`), with the values they consumed.
    fn render_conditions(&self, filter: &Filter, start_index: usize) -> (String, Vec<SqlValue>) {
        let mut conditions = Vec::with_capacity(filter.clauses().len());
        let mut values = Vec::new();
        let mut index = start_index;

        for clause in filter.clauses() {
            match clause {
                FilterClause::Column { column, condition } => {
                    let column = self.filter_column(column);
                    let (sql, consumed) = render_condition(&column, condition, index);
                    index += consumed.len();
                    values.extend(consumed);
                    conditions.push(sql);
                }
                FilterClause::Or(groups) => {
                    if groups.is_empty() {
                        continue;
                    }
                    let mut alternatives = Vec::with_capacity(groups.len());
                    for group in groups {
                        let (sql, consumed) = self.render_conditions(group, index);
                        index += consumed.len();
                        values.extend(consumed);
                        alternatives.push(if sql.is_empty() {
                            "(TRUE)".to_string()
                        } else {
                            format!("({sql})")
                        });
                    }
                    conditions.push(format!("({})", alternatives.join(" OR ")));
                }
            }
        }

        debug_assert_eq!(index - start_index, values.len());
        (conditions.join(" AND "), values)
    }

    /// `(col_a, col_b)`-style pieces for an INSERT. Field names are snake_cased.
    pub fn build_insert_clause(&self, fields: &FieldSet) -> InsertClause {
        let columns = fields
            .iter()
            .map(|(name, _)| to_snake_case(name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = placeholder_list(1, fields.len());
        let values = fields.iter().map(|(_, value)| value.clone()).collect();
        InsertClause {
            columns,
            placeholders,
            values,
        }
    }

    /// `col = $2, ...` for an UPDATE keyed by `$1`. The caller binds the id first.
    pub fn build_update_clause(&self, updates: &FieldSet) -> UpdateClause {
        let set_clause = updates
            .iter()
            .enumerate()
            .map(|(position, (name, _))| format!("{} = ${}", self.filter_column(name), position + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let values = updates.iter().map(|(_, value)| value.clone()).collect();
        UpdateClause { set_clause, values }
    }

    /// `SELECT ... FROM ... [JOIN ...] [WHERE ...] ORDER BY ... [LIMIT $n] [OFFSET $n]`.
    pub fn build_select_query_with_joins(&self, query: &SelectQuery) -> Statement {
        let mut sql = format!("SELECT {} FROM {}", query.columns.join(", "), query.table);

        if !query.joins.is_empty() {
            let joins = query
                .joins
                .iter()
                .map(|join| format!("JOIN {} ON {}", join.table, join.on))
                .collect::<Vec<_>>()
                .join(" ");
            sql.push(' ');
            sql.push_str(&joins);
        }

        let WhereClause { clause, mut values } = self.build_where_clause(&query.filter, 1);
        if !clause.is_empty() {
            sql.push(' ');
            sql.push_str(&clause);
        }

        sql.push_str(&format!(
            " ORDER BY {} {}",
            query.order_by.column,
            query.order_by.direction.as_sql()
        ));

        if let Some(limit) = query.limit {
            values.push(SqlValue::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
            sql.push_str(&format!(" LIMIT ${}", values.len()));
        }

        if let Some(offset) = query.offset {
            values.push(SqlValue::Int(i64::try_from(offset).unwrap_or(i64::MAX)));
            sql.push_str(&format!(" OFFSET ${}", values.len()));
        }

        Statement::query(sql, values)
    }

    fn filter_column<'a>(&self, name: &'a str) -> Cow<'a, str> {
        match self.naming {
            ColumnNaming::InsertOnly => Cow::Borrowed(name),
            ColumnNaming::SnakeCase => Cow::Owned(to_snake_case(name)),
        }
    }
}

fn render_condition(column: &str, condition: &Condition, index: usize) -> (String, Vec<SqlValue>) {
    match condition {
        Condition::Like(value) => (
            format!("{column} LIKE ${index}"),
            vec![contains_pattern(value)],
        ),
        Condition::ILike(value) => (
            format!("{column} ILIKE ${index}"),
            vec![contains_pattern(value)],
        ),
        Condition::Range(low, high) => (
            format!("{column} BETWEEN ${index} AND ${}", index + 1),
            vec![low.clone(), high.clone()],
        ),
        Condition::In(values) if values.is_empty() => ("FALSE".to_string(), Vec::new()),
        Condition::NotIn(values) if values.is_empty() => ("TRUE".to_string(), Vec::new()),
        Condition::In(values) => (
            format!("{column} IN ({})", placeholder_list(index, values.len())),
            values.clone(),
        ),
        Condition::NotIn(values) => (
            format!("{column} NOT IN ({})", placeholder_list(index, values.len())),
            values.clone(),
        ),
        Condition::Gte(value) => (format!("{column} >= ${index}"), vec![value.clone()]),
        Condition::Lte(value) => (format!("{column} <= ${index}"), vec![value.clone()]),
        Condition::Neq(value) => (format!("{column} != ${index}"), vec![value.clone()]),
        Condition::Eq(value) => (format!("{column} = ${index}"), vec![value.clone()]),
    }
}

/// `%v%`. A null pattern stays null, so the comparison matches nothing.
fn contains_pattern(value: &SqlValue) -> SqlValue {
    if value.is_null() {
        SqlValue::Null
    } else {
        SqlValue::Text(format!("%{value}%"))
    }
}

/// `$start, $start+1, ...` for `count` placeholders.
fn placeholder_list(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
