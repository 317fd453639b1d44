//! Record service: request-level CRUD over any repository.

use std::sync::Arc;
use tracing::{error, info};

use crate::domain::errors::{DataError, DataResult};
use crate::domain::models::{Entity, FieldSet, Filter, Page};
use crate::domain::ports::Repository;

type IdOf<R> = <<R as Repository>::Entity as Entity>::Id;

pub struct RecordService<R: Repository> {
    repository: Arc<R>,
    entity_name: String,
}

impl<R: Repository> RecordService<R> {
    pub fn new(repository: Arc<R>, entity_name: impl Into<String>) -> Self {
        Self {
            repository,
            entity_name: entity_name.into(),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Get a record, failing with NotFound when it does not exist.
    pub async fn get(&self, id: &IdOf<R>) -> DataResult<R::Entity> {
        match self.repository.find_by_id(id).await {
            Ok(Some(entity)) => Ok(entity),
            Ok(None) => Err(DataError::not_found(&self.entity_name, id)),
            Err(err) => Err(self.log_failure("get", err)),
        }
    }

    pub async fn list(&self, filter: &Filter, page: Page) -> DataResult<Vec<R::Entity>> {
        self.repository
            .find_all(filter, page)
            .await
            .map_err(|err| self.log_failure("list", err))
    }

    pub async fn create(&self, fields: &FieldSet) -> DataResult<R::Entity> {
        if fields.is_empty() {
            return Err(DataError::BadRequest(format!(
                "{} requires at least one field",
                self.entity_name
            )));
        }
        let entity = self
            .repository
            .create(fields)
            .await
            .map_err(|err| self.log_failure("create", err))?;
        info!(entity = %self.entity_name, id = %entity.id(), "Record created");
        Ok(entity)
    }

    pub async fn update(&self, id: &IdOf<R>, updates: &FieldSet) -> DataResult<R::Entity> {
        if updates.is_empty() {
            return Err(DataError::BadRequest("no fields to update".to_string()));
        }
        let entity = self
            .repository
            .update(id, updates)
            .await
            .map_err(|err| self.log_failure("update", err))?;
        info!(entity = %self.entity_name, id = %id, "Record updated");
        Ok(entity)
    }

    pub async fn delete(&self, id: &IdOf<R>) -> DataResult<()> {
        self.repository
            .delete(id)
            .await
            .map_err(|err| self.log_failure("delete", err))?;
        info!(entity = %self.entity_name, id = %id, "Record deleted");
        Ok(())
    }

    /// Log unexpected failures; expected outcomes like NotFound pass through quietly.
    fn log_failure(&self, operation: &str, err: DataError) -> DataError {
        if matches!(
            err,
            DataError::Database { .. } | DataError::Cache(_) | DataError::Serialization(_)
        ) {
            error!(entity = %self.entity_name, operation, error = %err, "Record operation failed");
        }
        err
    }
}
