//! PostgreSQL implementation of the relational store port.
//!
//! Row-returning statements are wrapped so Postgres renders each row with `to_jsonb`;
//! rows arrive as JSON objects keyed by column name whatever the table shape.
//!
//! NULL parameters are sent without a declared type so Postgres infers it from the
//! column they meet. Statements are not kept prepared, since the same SQL text can be
//! bound with differently typed values from one call to the next.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::encode::IsNull;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgTypeInfo};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row as _};
use tracing::{debug, warn};

use crate::domain::errors::{DataError, DataResult};
use crate::domain::models::{Row, SqlValue, Statement, StatementKind};
use crate::domain::ports::{QueryOutput, RelationalStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RelationalStore for PgStore {
    async fn query(&self, statement: &Statement) -> DataResult<QueryOutput> {
        let mut conn = self.pool.acquire().await?;
        run_statement(&mut conn, statement).await
    }

    async fn transaction(&self, statements: &[Statement]) -> DataResult<Vec<QueryOutput>> {
        let mut tx = self.pool.begin().await?;
        let mut outputs = Vec::with_capacity(statements.len());

        for statement in statements {
            match run_statement(&mut tx, statement).await {
                Ok(output) => outputs.push(output),
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!(error = %rollback_err, "Rollback failed; connection will be discarded");
                    }
                    return Err(err);
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| DataError::database("Failed to commit transaction", e))?;
        Ok(outputs)
    }

    async fn health_check(&self) -> DataResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DataError::database("Database health check failed", e))?;
        Ok(())
    }
}

async fn run_statement(conn: &mut PgConnection, statement: &Statement) -> DataResult<QueryOutput> {
    debug!(sql = %statement.sql, params = statement.values.len(), "Executing statement");

    match statement.kind {
        StatementKind::Query => {
            let sql = format!("WITH q AS ({}) SELECT to_jsonb(q) AS row FROM q", statement.sql);
            let pg_rows = bind_values(sqlx::query(&sql), &statement.values)
                .persistent(false)
                .fetch_all(&mut *conn)
                .await?;
            let rows = pg_rows.iter().map(json_row).collect::<DataResult<Vec<_>>>()?;
            Ok(QueryOutput {
                row_count: rows.len() as u64,
                rows,
            })
        }
        StatementKind::Execute => {
            let result = bind_values(sqlx::query(&statement.sql), &statement.values)
                .persistent(false)
                .execute(&mut *conn)
                .await?;
            Ok(QueryOutput {
                rows: Vec::new(),
                row_count: result.rows_affected(),
            })
        }
    }
}

fn bind_values<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    values: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in values {
        query = match value {
            SqlValue::Null => query.bind(UntypedNull),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Uuid(u) => query.bind(*u),
            SqlValue::Timestamp(t) => query.bind(*t),
            SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
        };
    }
    query
}

/// A NULL parameter declared with the unspecified type (OID 0).
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl<'q> sqlx::Encode<'q, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> IsNull {
        IsNull::Yes
    }
}

fn json_row(row: &PgRow) -> DataResult<Row> {
    match row.try_get::<Value, _>("row")? {
        Value::Object(map) => Ok(map),
        other => Err(DataError::Serialization(format!(
            "expected a JSON object per row, got {other}"
        ))),
    }
}
