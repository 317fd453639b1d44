//! The `todos` table: the entity the CLI manages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{Entity, FieldSet};
use super::schema::{ColumnNaming, ColumnType, TableSchema};
use crate::domain::errors::{DataError, DataResult};

pub const TODOS_TABLE: &str = "todos";

/// A stored todo row. Column names are snake_case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub task_name: String,
    pub task_description: String,
    pub task_due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Todo {
    type Id = Uuid;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Schema used by the todo repository. Updates and filters use column names too.
pub fn todo_schema() -> TableSchema {
    TableSchema::new(TODOS_TABLE)
        .with_column_naming(ColumnNaming::SnakeCase)
        .with_column_type("id", ColumnType::Uuid)
        .with_column_type("task_due_date", ColumnType::Timestamp)
        .with_column_type("created_at", ColumnType::Timestamp)
        .with_column_type("updated_at", ColumnType::Timestamp)
}

/// Application-side payload for a new todo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTodo {
    pub task_name: String,
    pub task_description: String,
    pub task_due_date: Option<DateTime<Utc>>,
}

impl NewTodo {
    pub fn validate(&self) -> DataResult<()> {
        if self.task_name.trim().is_empty() {
            return Err(DataError::Validation("task name is required".to_string()));
        }
        if self.task_description.trim().is_empty() {
            return Err(DataError::Validation(
                "task description is required".to_string(),
            ));
        }
        if self.task_due_date.is_none() {
            return Err(DataError::Validation("task due date is required".to_string()));
        }
        Ok(())
    }

    /// Validate and convert into insert fields, generating the primary key.
    pub fn into_fields(self) -> DataResult<FieldSet> {
        self.validate()?;
        Ok(FieldSet::new()
            .set("id", Uuid::new_v4())
            .set("taskName", self.task_name)
            .set("taskDescription", self.task_description)
            .set("taskDueDate", self.task_due_date))
    }
}

/// Partial update; unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoUpdate {
    pub task_name: Option<String>,
    pub task_description: Option<String>,
    pub task_due_date: Option<DateTime<Utc>>,
}

impl TodoUpdate {
    /// Fields to write, stamped with `updatedAt`.
    pub fn into_fields(self) -> DataResult<FieldSet> {
        if matches!(&self.task_name, Some(name) if name.trim().is_empty()) {
            return Err(DataError::Validation("task name cannot be blank".to_string()));
        }
        let mut fields = FieldSet::new();
        if let Some(name) = self.task_name {
            fields = fields.set("taskName", name);
        }
        if let Some(description) = self.task_description {
            fields = fields.set("taskDescription", description);
        }
        if let Some(due) = self.task_due_date {
            fields = fields.set("taskDueDate", due);
        }
        if fields.is_empty() {
            return Err(DataError::BadRequest("no fields to update".to_string()));
        }
        Ok(fields.set("updatedAt", Utc::now()))
    }
}
