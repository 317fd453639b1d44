//! Repository contract implemented per entity type.

use async_trait::async_trait;

use crate::domain::errors::DataResult;
use crate::domain::models::{Entity, FieldSet, Filter, Page};

#[async_trait]
pub trait Repository: Send + Sync {
    type Entity: Entity;

    /// List rows matching `filter`, one page at a time.
    async fn find_all(&self, filter: &Filter, page: Page) -> DataResult<Vec<Self::Entity>>;

    /// Get a row by primary key.
    async fn find_by_id(
        &self,
        id: &<Self::Entity as Entity>::Id,
    ) -> DataResult<Option<Self::Entity>>;

    /// Insert a row and return it as stored.
    async fn create(&self, fields: &FieldSet) -> DataResult<Self::Entity>;

    /// Update a row and return it as stored.
    async fn update(
        &self,
        id: &<Self::Entity as Entity>::Id,
        updates: &FieldSet,
    ) -> DataResult<Self::Entity>;

    /// Delete a row (soft or hard, depending on the repository).
    async fn delete(&self, id: &<Self::Entity as Entity>::Id) -> DataResult<()>;
}
