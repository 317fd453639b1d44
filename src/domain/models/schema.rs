//! Per-table configuration handed to a repository at construction.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::time::Duration;
use uuid::Uuid;

use super::filter::Filter;
use super::record::FieldSet;
use super::value::SqlValue;
use crate::domain::errors::{DataError, DataResult};

/// Repository-level cache entries live for a day unless the schema says otherwise.
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Default lifetime of a stampede lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// How application field names map onto column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnNaming {
    /// Inserts snake_case their columns; update and filter columns are used verbatim.
    #[default]
    InsertOnly,
    /// Inserts, updates and filters all snake_case their columns.
    SnakeCase,
}

/// Column types that JSON input carries as plain strings.
///
/// Values bound to such columns are converted before the statement is built, so the
/// driver sends them with the column's own type rather than as `text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    /// `timestamptz`. Accepts RFC 3339 or a bare `YYYY-MM-DD` date (midnight UTC).
    Timestamp,
}

impl ColumnType {
    pub fn coerce(self, column: &str, value: SqlValue) -> DataResult<SqlValue> {
        let SqlValue::Text(text) = value else {
            return Ok(value);
        };
        match self {
            Self::Uuid => Uuid::parse_str(&text)
                .map(SqlValue::Uuid)
                .map_err(|_| invalid_value(column, "a UUID", &text)),
            Self::Timestamp => parse_timestamp(&text)
                .map(SqlValue::Timestamp)
                .ok_or_else(|| invalid_value(column, "an RFC 3339 timestamp", &text)),
        }
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    let midnight = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

fn invalid_value(column: &str, expected: &str, text: &str) -> DataError {
    DataError::BadRequest(format!("column `{column}`: expected {expected}, got {text:?}"))
}

/// How cache misses on reads are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadGuard {
    /// Plain cache-aside: every missing caller queries the store.
    #[default]
    None,
    /// Misses take a distributed lock so only one caller queries the store.
    Lock { timeout: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub primary_key: String,
    pub soft_delete: bool,
    pub soft_delete_column: String,
    pub column_naming: ColumnNaming,
    pub entry_ttl: Duration,
    /// Drop `table:list:*` entries after every write.
    pub invalidate_lists_on_write: bool,
    pub read_guard: ReadGuard,
    /// Columns whose values need converting before they are bound.
    pub column_types: Vec<(String, ColumnType)>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: "id".to_string(),
            soft_delete: false,
            soft_delete_column: "deleted_at".to_string(),
            column_naming: ColumnNaming::default(),
            entry_ttl: DEFAULT_ENTRY_TTL,
            invalidate_lists_on_write: false,
            read_guard: ReadGuard::default(),
            column_types: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn with_soft_delete(mut self) -> Self {
        self.soft_delete = true;
        self
    }

    pub fn with_soft_delete_column(mut self, column: impl Into<String>) -> Self {
        self.soft_delete = true;
        self.soft_delete_column = column.into();
        self
    }

    pub const fn with_column_naming(mut self, naming: ColumnNaming) -> Self {
        self.column_naming = naming;
        self
    }

    pub const fn with_entry_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    pub const fn with_list_invalidation(mut self) -> Self {
        self.invalidate_lists_on_write = true;
        self
    }

    pub const fn with_lock_guard(mut self, timeout: Duration) -> Self {
        self.read_guard = ReadGuard::Lock { timeout };
        self
    }

    pub fn with_column_type(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_types.push((column.into(), column_type));
        self
    }

    /// Declared type of a column, given as a column name or a camelCase field name,
    /// optionally table-qualified.
    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        let bare = name.rsplit('.').next().unwrap_or(name);
        let snake = to_snake_case(bare);
        self.column_types
            .iter()
            .find(|(column, _)| column == bare || *column == snake)
            .map(|(_, column_type)| *column_type)
    }

    fn coerce(&self, column: &str, value: SqlValue) -> DataResult<SqlValue> {
        match self.column_type(column) {
            Some(column_type) => column_type.coerce(column, value),
            None => Ok(value),
        }
    }

    /// Convert filter operands to the declared column types.
    pub fn coerce_filter(&self, filter: &Filter) -> DataResult<Filter> {
        if self.column_types.is_empty() {
            return Ok(filter.clone());
        }
        filter.try_map_operands(&mut |column: &str, value: SqlValue| self.coerce(column, value))
    }

    /// Convert written field values to the declared column types.
    pub fn coerce_fields(&self, fields: &FieldSet) -> DataResult<FieldSet> {
        if self.column_types.is_empty() {
            return Ok(fields.clone());
        }
        fields.try_map_values(|name, value| self.coerce(name, value))
    }
}

/// `taskDueDate` -> `task_due_date`. Every uppercase letter gains a leading underscore.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_repository_conventions() {
        let schema = TableSchema::new("todos");
        assert_eq!(schema.primary_key, "id");
        assert!(!schema.soft_delete);
        assert_eq!(schema.entry_ttl, Duration::from_secs(86_400));
        assert_eq!(schema.column_naming, ColumnNaming::InsertOnly);
        assert_eq!(schema.read_guard, ReadGuard::None);
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("taskDueDate"), "task_due_date");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("id"), "id");
    }

    fn typed_schema() -> TableSchema {
        TableSchema::new("todos")
            .with_column_type("id", ColumnType::Uuid)
            .with_column_type("task_due_date", ColumnType::Timestamp)
    }

    #[test]
    fn test_column_type_lookup() {
        let schema = typed_schema();
        assert_eq!(schema.column_type("id"), Some(ColumnType::Uuid));
        assert_eq!(schema.column_type("todos.id"), Some(ColumnType::Uuid));
        assert_eq!(schema.column_type("taskDueDate"), Some(ColumnType::Timestamp));
        assert_eq!(schema.column_type("task_name"), None);
    }

    #[test]
    fn test_coerce_filter_types_operands() {
        let id = Uuid::from_u128(7);
        let filter = Filter::new()
            .eq("id", id.to_string())
            .gte("task_due_date", "2000-01-01T00:00:00Z")
            .like("task_name", "ship")
            .or([Filter::new().is_in("id", [id.to_string()])]);

        let typed = typed_schema().coerce_filter(&filter).unwrap();
        let due = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let expected = Filter::new()
            .eq("id", id)
            .gte("task_due_date", due)
            .like("task_name", "ship")
            .or([Filter::new().is_in("id", [id])]);
        assert_eq!(typed, expected);
    }

    #[test]
    fn test_coerce_fields_accepts_dates_and_keeps_nulls() {
        let fields = FieldSet::new()
            .set("taskDueDate", "2031-05-06")
            .set("updatedAt", SqlValue::Null)
            .set("taskName", "x");
        let typed = typed_schema()
            .with_column_type("updated_at", ColumnType::Timestamp)
            .coerce_fields(&fields)
            .unwrap();
        assert_eq!(
            typed.get("taskDueDate"),
            Some(&SqlValue::Timestamp(Utc.with_ymd_and_hms(2031, 5, 6, 0, 0, 0).unwrap()))
        );
        assert_eq!(typed.get("updatedAt"), Some(&SqlValue::Null));
        assert_eq!(typed.get("taskName"), Some(&SqlValue::Text("x".into())));
    }

    #[test]
    fn test_malformed_typed_values_are_bad_requests() {
        let schema = typed_schema();
        let err = schema
            .coerce_filter(&Filter::new().eq("id", "not-a-uuid"))
            .unwrap_err();
        assert!(matches!(err, DataError::BadRequest(_)), "{err:?}");
        let err = schema
            .coerce_fields(&FieldSet::new().set("task_due_date", "tomorrow"))
            .unwrap_err();
        assert!(matches!(err, DataError::BadRequest(_)), "{err:?}");
    }

    #[test]
    fn test_soft_delete_column_enables_soft_delete() {
        let schema = TableSchema::new("notes").with_soft_delete_column("removed_at");
        assert!(schema.soft_delete);
        assert_eq!(schema.soft_delete_column, "removed_at");
    }
}
