//! Cache-aside repository over a relational store.
//!
//! Rows are cached by id under `table:id` and list pages under `table:list:<signature>`,
//! where the signature hashes the rendered SQL together with its bound values. Writes
//! refresh or drop the id entry; list entries are only dropped when the schema asks for it.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::domain::errors::{DataError, DataResult};
use crate::domain::models::{
    Entity, FieldSet, Filter, Page, ReadGuard, SortDirection, Statement, TableSchema,
};
use crate::domain::ports::{RelationalStore, Repository};
use crate::services::cache_store::{cache_key, CacheStore};
use crate::services::query_builder::{QueryBuilder, SelectQuery};
use crate::services::stampede::StampedeGuard;

/// Hex characters of the SHA-256 digest kept in list keys.
const SIGNATURE_LEN: usize = 32;

pub struct CachedRepository<E> {
    store: Arc<dyn RelationalStore>,
    cache: CacheStore,
    guard: StampedeGuard,
    schema: TableSchema,
    builder: QueryBuilder,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> CachedRepository<E> {
    pub fn new(store: Arc<dyn RelationalStore>, cache: CacheStore, schema: TableSchema) -> Self {
        Self {
            store,
            guard: StampedeGuard::new(cache.clone()),
            cache,
            builder: QueryBuilder::with_naming(schema.column_naming),
            schema,
            _entity: PhantomData,
        }
    }

    /// Replace the stampede guard, e.g. to change its retry interval.
    pub fn with_stampede_guard(mut self, guard: StampedeGuard) -> Self {
        self.guard = guard;
        self
    }

    pub const fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub const fn supports_soft_delete(&self) -> bool {
        self.schema.soft_delete
    }

    pub fn id_key(&self, id: &E::Id) -> String {
        cache_key([self.schema.table.as_str(), id.to_string().as_str()])
    }

    /// Key for a rendered list query: `table:list:<hash of sql and values>`.
    pub fn list_key(&self, statement: &Statement) -> String {
        let mut hasher = Sha256::new();
        hasher.update(statement.sql.as_bytes());
        for value in &statement.values {
            hasher.update([0_u8]);
            hasher.update(value.to_json().to_string().as_bytes());
        }
        let mut signature = hex::encode(hasher.finalize());
        signature.truncate(SIGNATURE_LEN);
        cache_key([self.schema.table.as_str(), "list", signature.as_str()])
    }

    /// The SELECT `find_all` runs for `filter` and `page`. Operands are bound as given;
    /// `find_all` converts them to the schema's column types first.
    pub fn list_statement(&self, filter: &Filter, page: Page) -> Statement {
        let query = SelectQuery::new(self.schema.table.clone())
            .filter(filter.clone())
            .order_by(self.schema.primary_key.clone(), SortDirection::Asc)
            .limit(page.limit)
            .offset(page.offset);
        self.builder.build_select_query_with_joins(&query)
    }

    /// Insert several rows in one transaction, then cache each.
    #[instrument(skip(self, rows), fields(table = %self.schema.table, count = rows.len()))]
    pub async fn create_many(&self, rows: &[FieldSet]) -> DataResult<Vec<E>> {
        if rows.iter().any(FieldSet::is_empty) {
            return Err(DataError::BadRequest("cannot insert an empty row".to_string()));
        }
        let statements = rows
            .iter()
            .map(|fields| Ok(self.insert_statement(&self.schema.coerce_fields(fields)?)))
            .collect::<DataResult<Vec<Statement>>>()?;
        let outputs = self.store.transaction(&statements).await?;

        let mut entities = Vec::with_capacity(outputs.len());
        for output in outputs {
            let row = output.into_first().ok_or_else(|| missing_returned_row("insert"))?;
            entities.push(E::from_row(row)?);
        }
        for entity in &entities {
            self.cache_entity(entity).await;
        }
        self.after_write();
        Ok(entities)
    }

    /// Drop every cached entry for this table in the background.
    pub fn invalidate_table(&self) -> JoinHandle<u64> {
        self.cache
            .delete_by_pattern(&cache_key([self.schema.table.as_str(), "*"]))
    }

    fn insert_statement(&self, fields: &FieldSet) -> Statement {
        let insert = self.builder.build_insert_clause(fields);
        Statement::query(
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                self.schema.table, insert.columns, insert.placeholders
            ),
            insert.values,
        )
    }

    async fn read_through<T, F, Fut>(&self, key: &str, fetch: F) -> DataResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = DataResult<T>> + Send,
    {
        let ttl = self.schema.entry_ttl;
        match self.schema.read_guard {
            ReadGuard::None => self.guard.wrap(key, ttl, fetch).await,
            ReadGuard::Lock { timeout } => self.guard.wrap_with_lock(key, ttl, timeout, fetch).await,
        }
    }

    async fn fetch_rows(&self, statement: &Statement) -> DataResult<Vec<E>> {
        let output = self.store.query(statement).await?;
        output.rows.into_iter().map(E::from_row).collect()
    }

    async fn fetch_row(&self, statement: &Statement, id: &E::Id) -> DataResult<E> {
        match self.store.query(statement).await?.into_first() {
            Some(row) => E::from_row(row),
            None => Err(DataError::not_found(&self.schema.table, id)),
        }
    }

    async fn cache_entity(&self, entity: &E) {
        let key = self.id_key(&entity.id());
        if let Err(err) = self.cache.set(&key, entity, Some(self.schema.entry_ttl)).await {
            warn!(key = %key, error = %err, "Failed to cache written row");
        }
    }

    fn after_write(&self) {
        if self.schema.invalidate_lists_on_write {
            let pattern = cache_key([self.schema.table.as_str(), "list", "*"]);
            debug!(pattern = %pattern, "Dropping cached list pages");
            self.cache.delete_by_pattern(&pattern);
        }
    }
}

#[async_trait]
impl<E: Entity> Repository for CachedRepository<E> {
    type Entity = E;

    #[instrument(skip(self, filter, page), fields(table = %self.schema.table, limit = page.limit, offset = page.offset))]
    async fn find_all(&self, filter: &Filter, page: Page) -> DataResult<Vec<E>> {
        let filter = self.schema.coerce_filter(filter)?;
        let statement = self.list_statement(&filter, page);
        let key = self.list_key(&statement);
        let statement = &statement;

        self.read_through(&key, move || self.fetch_rows(statement)).await
    }

    #[instrument(skip(self, id), fields(table = %self.schema.table, id = %id))]
    async fn find_by_id(&self, id: &E::Id) -> DataResult<Option<E>> {
        let key = self.id_key(id);
        let statement = Statement::query(
            format!(
                "SELECT * FROM {} WHERE {} = $1",
                self.schema.table, self.schema.primary_key
            ),
            vec![id.clone().into()],
        );
        let statement = &statement;

        // Absent rows surface as NotFound inside the fetch so they are never cached.
        match self.read_through(&key, move || self.fetch_row(statement, id)).await {
            Ok(entity) => Ok(Some(entity)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, fields), fields(table = %self.schema.table))]
    async fn create(&self, fields: &FieldSet) -> DataResult<E> {
        if fields.is_empty() {
            return Err(DataError::BadRequest("cannot insert an empty row".to_string()));
        }
        let statement = self.insert_statement(&self.schema.coerce_fields(fields)?);
        let row = self
            .store
            .query(&statement)
            .await?
            .into_first()
            .ok_or_else(|| missing_returned_row("insert"))?;
        let entity = E::from_row(row)?;

        self.cache_entity(&entity).await;
        self.after_write();
        Ok(entity)
    }

    #[instrument(skip(self, id, updates), fields(table = %self.schema.table, id = %id))]
    async fn update(&self, id: &E::Id, updates: &FieldSet) -> DataResult<E> {
        if updates.is_empty() {
            return Err(DataError::BadRequest("no fields to update".to_string()));
        }
        let update = self
            .builder
            .build_update_clause(&self.schema.coerce_fields(updates)?);
        let mut values = Vec::with_capacity(update.values.len() + 1);
        values.push(id.clone().into());
        values.extend(update.values);

        let statement = Statement::query(
            format!(
                "UPDATE {} SET {} WHERE {} = $1 RETURNING *",
                self.schema.table, update.set_clause, self.schema.primary_key
            ),
            values,
        );
        let row = self
            .store
            .query(&statement)
            .await?
            .into_first()
            .ok_or_else(|| DataError::not_found(&self.schema.table, id))?;
        let entity = E::from_row(row)?;

        self.cache_entity(&entity).await;
        self.after_write();
        Ok(entity)
    }

    #[instrument(skip(self, id), fields(table = %self.schema.table, id = %id, soft = self.schema.soft_delete))]
    async fn delete(&self, id: &E::Id) -> DataResult<()> {
        let sql = if self.supports_soft_delete() {
            format!(
                "UPDATE {} SET {} = NOW() WHERE {} = $1",
                self.schema.table, self.schema.soft_delete_column, self.schema.primary_key
            )
        } else {
            format!(
                "DELETE FROM {} WHERE {} = $1",
                self.schema.table, self.schema.primary_key
            )
        };
        let output = self
            .store
            .query(&Statement::execute(sql, vec![id.clone().into()]))
            .await?;

        let key = self.id_key(id);
        if let Err(err) = self.cache.delete(&key).await {
            warn!(key = %key, error = %err, "Failed to drop cached row");
        }

        if output.row_count == 0 {
            return Err(DataError::not_found(&self.schema.table, id));
        }
        self.after_write();
        Ok(())
    }
}

fn missing_returned_row(operation: &str) -> DataError {
    DataError::Database {
        message: format!("{operation} returned no row"),
        source: None,
    }
}
