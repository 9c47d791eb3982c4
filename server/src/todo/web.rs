use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::todo::query::{self, ListParams};
use crate::todo::{
    CreateTodoInput, FieldError, Tag, Todo, TodoService, TodoServiceError, UpdateTodoInput,
};

#[derive(Clone, Debug)]
pub struct TodoState {
    pub db: Arc<sea_orm::DatabaseConnection>,
}

/// Custom error type for todo handler operations.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    /// Represents malformed input, carrying per-field detail.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    /// Represents an unknown todo ID.
    #[error("Todo with ID {0} not found")]
    NotFound(i32),
    /// Represents an unexpected failure, reported as a 500.
    #[error("Internal error")]
    Internal(#[source] TodoServiceError),
}

impl From<TodoServiceError> for TodoError {
    fn from(err: TodoServiceError) -> Self {
        match err {
            TodoServiceError::Validation(errors) => TodoError::Validation(errors),
            TodoServiceError::TodoNotFound(id) => TodoError::NotFound(id),
            other => TodoError::Internal(other),
        }
    }
}

impl IntoResponse for TodoError {
    fn into_response(self) -> axum::response::Response {
        match self {
            TodoError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidationErrorResponse { errors }),
            )
                .into_response(),
            TodoError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                Json(MessageResponse {
                    message: format!("Todo with ID {} not found", id),
                }),
            )
                .into_response(),
            TodoError::Internal(err) => {
                tracing::error!("Todo operation failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(MessageResponse {
                        message: "An unexpected error occurred while processing your request."
                            .to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Field-level validation failure payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationErrorResponse {
    pub errors: Vec<FieldError>,
}

/// Generic message payload for not-found and server errors.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// JSON representation of a tag.
#[derive(Debug, Serialize, ToSchema)]
pub struct TagJson {
    /// Unique identifier for the tag
    id: i32,
    /// The tag label
    name: String,
    /// Display color; currently always "gray"
    color: String,
}

impl From<Tag> for TagJson {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            color: tag.color,
        }
    }
}

/// JSON representation of a todo for API responses.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodoJson {
    /// Unique identifier for the todo
    id: i32,
    /// Short task summary
    title: String,
    /// Optional free-form details
    description: Option<String>,
    /// "pending" or "completed"
    status: String,
    /// "low", "medium", or "high"
    priority: String,
    /// Calendar due date, if any
    due_date: Option<chrono::NaiveDate>,
    /// Cached overdue flag as of the last recompute
    is_overdue: bool,
    /// Manual sort position; stored but not consumed by any sort path
    order: i32,
    /// Tags owned by this todo
    tags: Vec<TagJson>,
    created_at: chrono::DateTime<chrono::FixedOffset>,
    updated_at: chrono::DateTime<chrono::FixedOffset>,
}

impl From<Todo> for TodoJson {
    fn from(todo: Todo) -> Self {
        Self {
            id: todo.id,
            title: todo.title,
            description: todo.description,
            status: todo.status.as_str().to_string(),
            priority: todo.priority.as_str().to_string(),
            due_date: todo.due_date,
            is_overdue: todo.is_overdue,
            order: todo.order,
            tags: todo.tags.into_iter().map(TagJson::from).collect(),
            created_at: todo.created_at,
            updated_at: todo.updated_at,
        }
    }
}

/// Pagination bookkeeping for the list response.
#[derive(Debug, Serialize, ToSchema)]
pub struct PageMetaJson {
    total: u64,
    per_page: u64,
    current_page: u64,
    last_page: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TodosPageJson {
    meta: PageMetaJson,
    data: Vec<TodoJson>,
}

/// The resolved filters, echoed back so the client can hydrate its state.
#[derive(Debug, Serialize, ToSchema)]
pub struct FiltersJson {
    search: String,
    status: &'static str,
    sort_by: &'static str,
    sort_order: &'static str,
}

/// Response body for `GET /`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TodosIndexResponse {
    todos: TodosPageJson,
    filters: FiltersJson,
}

/// Response body for `GET /todos/export/json`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExportJsonResponse {
    exported_at: chrono::DateTime<Utc>,
    total: usize,
    todos: Vec<TodoJson>,
}

/// Handler for GET / that returns one filtered, sorted, paginated page.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/",
    params(ListParams),
    responses(
        (status = 200, description = "One page of todos with echoed filters", body = TodosIndexResponse),
        (status = 422, description = "Invalid query parameters", body = ValidationErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn index_handler(
    State(state): State<Arc<TodoState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<TodosIndexResponse>, TodoError> {
    let query = query::resolve(&params).map_err(TodoError::Validation)?;
    let service = TodoService::new(&state.db);
    let page = service.list_todos(&query).await.map_err(TodoError::from)?;

    Ok(Json(TodosIndexResponse {
        todos: TodosPageJson {
            meta: PageMetaJson {
                total: page.total,
                per_page: page.per_page,
                current_page: page.page,
                last_page: page.last_page,
            },
            data: page.items.into_iter().map(TodoJson::from).collect(),
        },
        filters: FiltersJson {
            search: query.search,
            status: query.status.as_str(),
            sort_by: query.sort_by.as_str(),
            sort_order: query.sort_order.as_str(),
        },
    }))
}

/// Handler for POST /todos that creates a todo with optional tags.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/todos",
    request_body = CreateTodoInput,
    responses(
        (status = 201, description = "Todo created", body = TodoJson),
        (status = 422, description = "Invalid input", body = ValidationErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn create_todo_handler(
    State(state): State<Arc<TodoState>>,
    Json(input): Json<CreateTodoInput>,
) -> Result<(StatusCode, Json<TodoJson>), TodoError> {
    let service = TodoService::new(&state.db);
    let todo = service.create_todo(input).await.map_err(TodoError::from)?;
    Ok((StatusCode::CREATED, Json(TodoJson::from(todo))))
}

/// Handler for PUT /todos/{id} that applies a partial patch.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    put,
    path = "/todos/{id}",
    request_body = UpdateTodoInput,
    params(("id" = i32, Path, description = "Todo ID")),
    responses(
        (status = 200, description = "Todo updated", body = TodoJson),
        (status = 404, description = "Unknown todo", body = MessageResponse),
        (status = 422, description = "Invalid input", body = ValidationErrorResponse)
    ),
    tag = "Todos"
)]
pub async fn update_todo_handler(
    State(state): State<Arc<TodoState>>,
    Path(id): Path<i32>,
    Json(input): Json<UpdateTodoInput>,
) -> Result<Json<TodoJson>, TodoError> {
    let service = TodoService::new(&state.db);
    let todo = service
        .update_todo(id, input)
        .await
        .map_err(TodoError::from)?;
    Ok(Json(TodoJson::from(todo)))
}

/// Handler for DELETE /todos/{id}.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/todos/{id}",
    params(("id" = i32, Path, description = "Todo ID")),
    responses(
        (status = 204, description = "Todo deleted"),
        (status = 404, description = "Unknown todo", body = MessageResponse)
    ),
    tag = "Todos"
)]
pub async fn delete_todo_handler(
    State(state): State<Arc<TodoState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, TodoError> {
    let service = TodoService::new(&state.db);
    service.delete_todo(id).await.map_err(TodoError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for PATCH /todos/{id}/toggle that flips the status.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    patch,
    path = "/todos/{id}/toggle",
    params(("id" = i32, Path, description = "Todo ID")),
    responses(
        (status = 200, description = "Status flipped", body = TodoJson),
        (status = 404, description = "Unknown todo", body = MessageResponse)
    ),
    tag = "Todos"
)]
pub async fn toggle_status_handler(
    State(state): State<Arc<TodoState>>,
    Path(id): Path<i32>,
) -> Result<Json<TodoJson>, TodoError> {
    let service = TodoService::new(&state.db);
    let todo = service.toggle_status(id).await.map_err(TodoError::from)?;
    Ok(Json(TodoJson::from(todo)))
}

/// Handler for GET /todos/export/json returning the full collection.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/todos/export/json",
    responses(
        (status = 200, description = "Full collection export", body = ExportJsonResponse)
    ),
    tag = "Export"
)]
pub async fn export_json_handler(
    State(state): State<Arc<TodoState>>,
) -> Result<Json<ExportJsonResponse>, TodoError> {
    let service = TodoService::new(&state.db);
    let todos = service.export_todos().await.map_err(TodoError::from)?;

    Ok(Json(ExportJsonResponse {
        exported_at: Utc::now(),
        total: todos.len(),
        todos: todos.into_iter().map(TodoJson::from).collect(),
    }))
}

/// Handler for GET /todos/export/csv returning the full collection as an
/// attachment.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/todos/export/csv",
    responses(
        (status = 200, description = "Full collection as CSV", content_type = "text/csv")
    ),
    tag = "Export"
)]
pub async fn export_csv_handler(
    State(state): State<Arc<TodoState>>,
) -> Result<impl IntoResponse, TodoError> {
    let service = TodoService::new(&state.db);
    let todos = service.export_todos().await.map_err(TodoError::from)?;
    let csv = super::projection::to_csv(&todos);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=todos.csv",
            ),
        ],
        csv,
    ))
}

/// Creates and returns the todo router with all todo-related routes.
pub fn create_todo_router(state: Arc<TodoState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/todos", post(create_todo_handler))
        .route("/todos/export/json", get(export_json_handler))
        .route("/todos/export/csv", get(export_csv_handler))
        .route(
            "/todos/{id}",
            put(update_todo_handler).delete(delete_todo_handler),
        )
        .route("/todos/{id}/toggle", patch(toggle_status_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn validation_errors_render_as_unprocessable_entity() {
        let error = TodoError::Validation(vec![FieldError::new("title", "title must not be empty")]);
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["errors"][0]["field"], "title");
    }

    #[tokio::test]
    async fn not_found_renders_as_404_with_message() {
        let response = TodoError::NotFound(42).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["message"], "Todo with ID 42 not found");
    }
}
