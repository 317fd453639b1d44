//! Common test utilities for integration tests
//!
//! Provides an in-memory relational store that understands the statements the cached
//! repository renders, plus cache fixtures on the in-process backend.

#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rowcache::adapters::cache::MemoryCache;
use rowcache::domain::errors::{DataError, DataResult};
use rowcache::domain::models::{Entity, Row, SqlValue, Statement, StatementKind};
use rowcache::domain::ports::{QueryOutput, RelationalStore};
use rowcache::services::CacheStore;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A cache store on a fresh in-process backend.
pub fn memory_cache() -> CacheStore {
    CacheStore::new(Arc::new(MemoryCache::default()))
}

/// Minimal soft-deletable entity keyed by an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub body: String,
    #[serde(default)]
    pub deleted_at: Option<String>,
}

impl Entity for Note {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

type Tables = HashMap<String, Vec<Row>>;

/// In-memory stand-in for PostgreSQL.
///
/// Understands `INSERT ... RETURNING *`, `UPDATE ... [RETURNING *]`, `DELETE`, and
/// `SELECT *` with equality-only WHERE clauses, `ORDER BY <pk> ASC`, LIMIT and OFFSET.
/// Duplicate primary keys fail the statement, which rolls back a transaction.
#[derive(Default)]
pub struct FakeStore {
    tables: Mutex<Tables>,
    insert_defaults: Row,
    queries: AtomicUsize,
    executed: Mutex<Vec<Statement>>,
    delay: Option<Duration>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store for the `todos` table: inserts get `created_at` and `updated_at` filled in.
    pub fn for_todos() -> Self {
        let mut defaults = Row::new();
        defaults.insert("created_at".into(), Value::String(chrono::Utc::now().to_rfc3339()));
        defaults.insert("updated_at".into(), Value::Null);
        Self {
            insert_defaults: defaults,
            ..Self::default()
        }
    }

    /// Make every statement take at least `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Statements run so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<Statement> {
        self.executed.lock().unwrap().clone()
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.lock().unwrap().get(table).cloned().unwrap_or_default()
    }

    fn record(&self, statement: &Statement) {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().unwrap().push(statement.clone());
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn apply(&self, tables: &mut Tables, statement: &Statement) -> DataResult<QueryOutput> {
        let sql = statement.sql.as_str();
        let values = &statement.values;
        let (rows, row_count) = if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
            self.insert(tables, rest, values)?
        } else if let Some(rest) = sql.strip_prefix("UPDATE ") {
            update(tables, rest, values)
        } else if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
            delete(tables, rest, values)
        } else if let Some(rest) = sql.strip_prefix("SELECT * FROM ") {
            select(tables, rest, values)
        } else {
            panic!("fake store cannot run: {sql}");
        };

        Ok(match statement.kind {
            StatementKind::Query => QueryOutput { rows, row_count },
            StatementKind::Execute => QueryOutput {
                rows: Vec::new(),
                row_count,
            },
        })
    }

    fn insert(
        &self,
        tables: &mut Tables,
        rest: &str,
        values: &[SqlValue],
    ) -> DataResult<(Vec<Row>, u64)> {
        let (table, rest) = rest.split_once(" (").expect("insert column list");
        let (columns, _) = rest.split_once(')').expect("insert column list");

        let mut row = self.insert_defaults.clone();
        for (column, value) in columns.split(", ").zip(values) {
            row.insert(column.to_string(), value.to_json());
        }

        let rows = tables.entry(table.to_string()).or_default();
        if rows.iter().any(|existing| existing.get("id") == row.get("id")) {
            return Err(DataError::Database {
                message: format!("duplicate key value violates unique constraint \"{table}_pkey\""),
                source: None,
            });
        }
        rows.push(row.clone());
        Ok((vec![row], 1))
    }
}

fn update(tables: &mut Tables, rest: &str, values: &[SqlValue]) -> (Vec<Row>, u64) {
    let (table, rest) = rest.split_once(" SET ").expect("update SET");
    let (assignments, predicate) = rest.split_once(" WHERE ").expect("update WHERE");
    let predicate = predicate.trim_end_matches(" RETURNING *");
    let conditions = parse_conditions(predicate, values);

    let mut updated = Vec::new();
    for row in tables.entry(table.to_string()).or_default().iter_mut() {
        if !matches(row, &conditions) {
            continue;
        }
        for assignment in assignments.split(", ") {
            let (column, operand) = assignment.split_once(" = ").expect("assignment");
            let value = if operand == "NOW()" {
                Value::String(chrono::Utc::now().to_rfc3339())
            } else {
                bound(operand, values)
            };
            row.insert(column.to_string(), value);
        }
        updated.push(row.clone());
    }
    let count = updated.len() as u64;
    (updated, count)
}

fn delete(tables: &mut Tables, rest: &str, values: &[SqlValue]) -> (Vec<Row>, u64) {
    let (table, predicate) = rest.split_once(" WHERE ").expect("delete WHERE");
    let conditions = parse_conditions(predicate, values);
    let rows = tables.entry(table.to_string()).or_default();
    let before = rows.len();
    rows.retain(|row| !matches(row, &conditions));
    (Vec::new(), (before - rows.len()) as u64)
}

fn select(tables: &Tables, rest: &str, values: &[SqlValue]) -> (Vec<Row>, u64) {
    let (head, tail) = rest.split_once(" ORDER BY ").unwrap_or((rest, ""));
    let (table, predicate) = head.split_once(" WHERE ").unwrap_or((head, ""));
    let conditions = parse_conditions(predicate, values);

    let mut rows: Vec<Row> = tables
        .get(table)
        .map(|rows| {
            rows.iter()
                .filter(|row| matches(row, &conditions))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    rows.sort_by_key(|row| row.get("id").map(ToString::to_string));

    let offset = clause_operand(tail, " OFFSET ", values).unwrap_or(0);
    let limit = clause_operand(tail, " LIMIT ", values).unwrap_or(usize::MAX);
    let rows: Vec<Row> = rows.into_iter().skip(offset).take(limit).collect();
    let count = rows.len() as u64;
    (rows, count)
}

fn parse_conditions(predicate: &str, values: &[SqlValue]) -> Vec<(String, Value)> {
    if predicate.is_empty() {
        return Vec::new();
    }
    predicate
        .split(" AND ")
        .map(|condition| {
            let (column, operand) = condition
                .split_once(" = ")
                .unwrap_or_else(|| panic!("fake store only evaluates equality: {condition}"));
            (column.to_string(), bound(operand, values))
        })
        .collect()
}

fn matches(row: &Row, conditions: &[(String, Value)]) -> bool {
    conditions
        .iter()
        .all(|(column, expected)| row.get(column).unwrap_or(&Value::Null) == expected)
}

/// Value bound to a `$n` operand.
fn bound(operand: &str, values: &[SqlValue]) -> Value {
    let index: usize = operand.trim_start_matches('$').parse().expect("placeholder");
    values[index - 1].to_json()
}

fn clause_operand(tail: &str, keyword: &str, values: &[SqlValue]) -> Option<usize> {
    let (_, rest) = tail.split_once(keyword)?;
    let operand = rest.split_whitespace().next()?;
    bound(operand, values).as_u64().map(|n| n as usize)
}

#[async_trait]
impl RelationalStore for FakeStore {
    async fn query(&self, statement: &Statement) -> DataResult<QueryOutput> {
        self.record(statement);
        self.pause().await;
        let mut tables = self.tables.lock().unwrap();
        self.apply(&mut tables, statement)
    }

    async fn transaction(&self, statements: &[Statement]) -> DataResult<Vec<QueryOutput>> {
        self.pause().await;
        let mut tables = self.tables.lock().unwrap();
        let mut working = tables.clone();
        let mut outputs = Vec::with_capacity(statements.len());
        for statement in statements {
            self.record(statement);
            outputs.push(self.apply(&mut working, statement)?);
        }
        *tables = working;
        Ok(outputs)
    }

    async fn health_check(&self) -> DataResult<()> {
        Ok(())
    }
}
