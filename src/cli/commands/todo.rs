//! Todo CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{Filter, NewTodo, Page, Todo, TodoUpdate, TODOS_TABLE};
use crate::services::cache_key;

#[derive(Args, Debug)]
pub struct TodoArgs {
    #[command(subcommand)]
    pub command: TodoCommands,
}

#[derive(Subcommand, Debug)]
pub enum TodoCommands {
    /// List todos
    List {
        /// Filter as JSON, e.g. '{"task_name":{"ilike":"ship"}}'
        #[arg(short, long)]
        filter: Option<String>,
        /// Maximum number of rows
        #[arg(short, long, default_value_t = 10)]
        limit: u64,
        /// Rows to skip
        #[arg(short, long, default_value_t = 0)]
        offset: u64,
    },
    /// Show a todo
    Get {
        /// Todo ID
        id: Uuid,
    },
    /// Create a todo
    Create {
        /// Task name
        name: String,
        /// Task description
        #[arg(short, long)]
        description: String,
        /// Due date (RFC 3339)
        #[arg(long)]
        due: DateTime<Utc>,
    },
    /// Update fields of a todo
    Update {
        /// Todo ID
        id: Uuid,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },
    /// Delete a todo
    Delete {
        /// Todo ID
        id: Uuid,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct TodoOutput {
    pub id: String,
    pub task_name: String,
    pub task_description: String,
    pub task_due_date: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<&Todo> for TodoOutput {
    fn from(todo: &Todo) -> Self {
        Self {
            id: todo.id.to_string(),
            task_name: todo.task_name.clone(),
            task_description: todo.task_description.clone(),
            task_due_date: todo.task_due_date.to_rfc3339(),
            created_at: todo.created_at.to_rfc3339(),
            updated_at: todo.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TodoDetailOutput {
    pub todo: TodoOutput,
}

impl CommandOutput for TodoDetailOutput {
    fn to_human(&self) -> String {
        let todo = &self.todo;
        let mut lines = vec![
            format!("ID:          {}", todo.id),
            format!("Name:        {}", todo.task_name),
            format!("Description: {}", todo.task_description),
            format!("Due:         {}", todo.task_due_date),
            format!("Created:     {}", todo.created_at),
        ];
        if let Some(updated) = &todo.updated_at {
            lines.push(format!("Updated:     {updated}"));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TodoListOutput {
    pub todos: Vec<TodoOutput>,
    pub total: usize,
}

impl CommandOutput for TodoListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "name", "due", "description"]);
        for todo in &self.todos {
            table.add_row(vec![
                Cell::new(&todo.id),
                Cell::new(truncate(&todo.task_name, 24)),
                Cell::new(&todo.task_due_date),
                Cell::new(truncate(&todo.task_description, 40)),
            ]);
        }
        render_list("todo", &table, self.total)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TodoActionOutput {
    pub success: bool,
    pub message: String,
    pub todo: Option<TodoOutput>,
}

impl CommandOutput for TodoActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

pub async fn execute(args: TodoArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let service = ctx.todo_service();

    match args.command {
        TodoCommands::List { filter, limit, offset } => {
            let filter = parse_filter(filter.as_deref())?;
            let todos = service
                .list(&filter, Page::new(limit, offset))
                .await
                .context("Failed to list todos")?;
            let out = TodoListOutput {
                total: todos.len(),
                todos: todos.iter().map(TodoOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        TodoCommands::Get { id } => {
            let todo = service.get(&id).await?;
            output(&TodoDetailOutput { todo: TodoOutput::from(&todo) }, json_mode);
        }

        TodoCommands::Create { name, description, due } => {
            let fields = NewTodo {
                task_name: name,
                task_description: description,
                task_due_date: Some(due),
            }
            .into_fields()?;
            let todo = service.create(&fields).await.context("Failed to create todo")?;
            drop_list_pages(ctx).await;

            let out = TodoActionOutput {
                success: true,
                message: format!("Todo created: {}", todo.id),
                todo: Some(TodoOutput::from(&todo)),
            };
            output(&out, json_mode);
        }

        TodoCommands::Update { id, name, description, due } => {
            let fields = TodoUpdate {
                task_name: name,
                task_description: description,
                task_due_date: due,
            }
            .into_fields()?;
            let todo = service.update(&id, &fields).await?;
            drop_list_pages(ctx).await;

            let out = TodoActionOutput {
                success: true,
                message: format!("Todo updated: {id}"),
                todo: Some(TodoOutput::from(&todo)),
            };
            output(&out, json_mode);
        }

        TodoCommands::Delete { id } => {
            service.delete(&id).await?;
            drop_list_pages(ctx).await;

            let out = TodoActionOutput {
                success: true,
                message: format!("Todo deleted: {id}"),
                todo: None,
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}

fn parse_filter(raw: Option<&str>) -> Result<Filter> {
    let Some(raw) = raw else {
        return Ok(Filter::new());
    };
    let value: serde_json::Value = serde_json::from_str(raw).context("Filter is not valid JSON")?;
    Ok(Filter::from_json(&value)?)
}

/// Cached list pages go stale after a write. The process may exit right after, so the
/// invalidation is awaited rather than left to a background task.
async fn drop_list_pages(ctx: &AppContext) {
    let pattern = cache_key([TODOS_TABLE, "list", "*"]);
    ctx.cache.delete_matching(&pattern).await;
}
