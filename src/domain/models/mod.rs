//! Domain models: filters, statements, records and configuration.

pub mod config;
pub mod filter;
pub mod record;
pub mod schema;
pub mod statement;
pub mod todo;
pub mod value;

pub use config::{
    CacheBackendKind, CacheConfig, Config, DatabaseConfig, LogFormat, LoggingConfig,
    RotationPolicy,
};
pub use filter::{Condition, Filter, FilterClause};
pub use record::{Entity, FieldSet, Page, Row};
pub use schema::{
    to_snake_case, ColumnNaming, ColumnType, ReadGuard, TableSchema, DEFAULT_ENTRY_TTL,
    DEFAULT_LOCK_TIMEOUT,
};
pub use statement::{
    InsertClause, Join, OrderBy, SortDirection, Statement, StatementKind, UpdateClause,
    WhereClause,
};
pub use todo::{todo_schema, NewTodo, Todo, TodoUpdate, TODOS_TABLE};
pub use value::SqlValue;
