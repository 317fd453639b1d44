//! Relational store port.

use async_trait::async_trait;

use crate::domain::errors::DataResult;
use crate::domain::models::{Row, Statement};

/// Rows produced by a statement plus the number of rows it touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub row_count: u64,
}

impl QueryOutput {
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn into_first(self) -> Option<Row> {
        self.rows.into_iter().next()
    }
}

/// Parameterized statement execution against the source of truth.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Run one statement. Execute-only statements return no rows, just the count.
    async fn query(&self, statement: &Statement) -> DataResult<QueryOutput>;

    /// Run statements on one pooled connection inside BEGIN/COMMIT.
    ///
    /// Any failure rolls the whole batch back; the connection is released on every path.
    async fn transaction(&self, statements: &[Statement]) -> DataResult<Vec<QueryOutput>>;

    /// Verify a connection can be acquired and used.
    async fn health_check(&self) -> DataResult<()>;
}
