use crate::entities::*;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use crate::entities::sea_orm_active_enums::{TodoPriority, TodoStatus};

pub mod projection;
pub mod query;
pub mod validate;
pub mod web;

use query::TodoListQuery;

/// A todo aggregate: one row from `todos` plus its owned tags.
#[derive(Debug, Clone, PartialEq)]
pub struct Todo {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub due_date: Option<NaiveDate>,
    pub is_overdue: bool,
    pub order: i32,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<chrono::FixedOffset>,
    pub updated_at: DateTime<chrono::FixedOffset>,
}

/// A tag owned by exactly one todo.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: i32,
    pub name: String,
    pub color: String,
}

impl Todo {
    fn from_models(model: todo::Model, tags: Vec<todo_tag::Model>) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            status: model.status,
            priority: model.priority,
            due_date: model.due_date,
            is_overdue: model.is_overdue,
            order: model.order,
            tags: tags.into_iter().map(Tag::from).collect(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<todo_tag::Model> for Tag {
    fn from(model: todo_tag::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            color: model.color,
        }
    }
}

/// A single page of todos plus pagination bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub last_page: u64,
}

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error type for TodoService operations.
#[derive(Debug, thiserror::Error)]
pub enum TodoServiceError {
    /// Represents malformed or missing input, with per-field detail.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    /// Represents an unknown todo ID.
    #[error("Todo with ID {0} not found")]
    TodoNotFound(i32),
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Input for creating a todo. `priority` arrives as a raw string and is
/// checked by `validate::validate_create`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Partial patch for a todo. Absent fields are kept as-is; the nullable
/// fields distinguish "absent" from an explicit `null` which clears them.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "validate::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "validate::double_option")]
    pub due_date: Option<Option<String>>,
    #[serde(default)]
    pub order: Option<i32>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// True when `date` (taken at midnight UTC) is strictly before `now`.
pub(crate) fn date_is_past(date: NaiveDate, now: DateTime<Utc>) -> bool {
    date.and_time(NaiveTime::MIN).and_utc() < now
}

/// The overdue recompute rule: only a pending todo with a past due date is
/// overdue. Applied on every mutating update, never by a background sweep.
fn compute_overdue(due_date: Option<NaiveDate>, status: TodoStatus, now: DateTime<Utc>) -> bool {
    status == TodoStatus::Pending && due_date.is_some_and(|date| date_is_past(date, now))
}

fn now_fixed() -> DateTime<chrono::FixedOffset> {
    Utc::now().fixed_offset()
}

pub struct TodoService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl TodoService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> TodoService {
        TodoService { db }
    }

    /// Creates a new todo, together with one tag row per requested tag name.
    ///
    /// Duplicate tag names are preserved as separate rows. The cached
    /// `is_overdue` flag starts out false even for a past due date; the
    /// first mutating update recomputes it.
    #[tracing::instrument(skip(self))]
    pub async fn create_todo(&self, input: CreateTodoInput) -> Result<Todo, TodoServiceError> {
        let payload = validate::validate_create(&input).map_err(TodoServiceError::Validation)?;

        let now = now_fixed();
        let txn = self.db.begin().await?;

        let active_model = todo::ActiveModel {
            title: ActiveValue::Set(payload.title),
            description: ActiveValue::Set(payload.description),
            status: ActiveValue::Set(TodoStatus::Pending),
            priority: ActiveValue::Set(payload.priority),
            due_date: ActiveValue::Set(payload.due_date),
            is_overdue: ActiveValue::Set(false),
            order: ActiveValue::Set(0),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        let created_model = active_model.insert(&txn).await?;
        let tags = insert_tags(&txn, created_model.id, &payload.tags).await?;

        txn.commit().await?;
        Ok(Todo::from_models(created_model, tags))
    }

    /// Applies a partial patch to a todo.
    ///
    /// Every update recomputes `is_overdue` from the patched status and due
    /// date. When the `tags` key is present (even as an empty list) the
    /// whole tag set is replaced; delete, insert, and the parent update
    /// share one transaction so no zero-tag window is visible.
    #[tracing::instrument(skip(self))]
    pub async fn update_todo(
        &self,
        id: i32,
        input: UpdateTodoInput,
    ) -> Result<Todo, TodoServiceError> {
        let payload = validate::validate_update(&input).map_err(TodoServiceError::Validation)?;

        let txn = self.db.begin().await?;
        let model = todo::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(TodoServiceError::TodoNotFound(id))?;

        let status = payload.status.unwrap_or(model.status);
        let due_date = payload.due_date.clone().unwrap_or(model.due_date);

        let mut active_model: todo::ActiveModel = model.clone().into();
        if let Some(title) = payload.title {
            active_model.title = ActiveValue::Set(title);
        }
        if let Some(description) = payload.description {
            active_model.description = ActiveValue::Set(description);
        }
        if let Some(new_status) = payload.status {
            active_model.status = ActiveValue::Set(new_status);
        }
        if let Some(priority) = payload.priority {
            active_model.priority = ActiveValue::Set(priority);
        }
        if let Some(new_due_date) = payload.due_date {
            active_model.due_date = ActiveValue::Set(new_due_date);
        }
        if let Some(order) = payload.order {
            active_model.order = ActiveValue::Set(order);
        }
        active_model.is_overdue = ActiveValue::Set(compute_overdue(due_date, status, Utc::now()));
        active_model.updated_at = ActiveValue::Set(now_fixed());
        let updated_model = active_model.update(&txn).await?;

        let tags = match payload.tags {
            Some(names) => {
                todo_tag::Entity::delete_many()
                    .filter(todo_tag::Column::TodoId.eq(id))
                    .exec(&txn)
                    .await?;
                insert_tags(&txn, id, &names).await?
            }
            None => {
                updated_model
                    .find_related(todo_tag::Entity)
                    .all(&txn)
                    .await?
            }
        };

        txn.commit().await?;
        Ok(Todo::from_models(updated_model, tags))
    }

    /// Flips a todo between pending and completed, applying the same
    /// overdue recompute rule as `update_todo`.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_status(&self, id: i32) -> Result<Todo, TodoServiceError> {
        let model = todo::Entity::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or(TodoServiceError::TodoNotFound(id))?;

        let new_status = match model.status {
            TodoStatus::Pending => TodoStatus::Completed,
            TodoStatus::Completed => TodoStatus::Pending,
        };

        let mut active_model: todo::ActiveModel = model.clone().into();
        active_model.status = ActiveValue::Set(new_status);
        active_model.is_overdue =
            ActiveValue::Set(compute_overdue(model.due_date, new_status, Utc::now()));
        active_model.updated_at = ActiveValue::Set(now_fixed());
        let updated_model = active_model.update(self.db).await?;

        let tags = updated_model
            .find_related(todo_tag::Entity)
            .all(self.db)
            .await?;
        Ok(Todo::from_models(updated_model, tags))
    }

    /// Deletes a todo by ID. Tag rows go with it via the FK cascade.
    #[tracing::instrument(skip(self))]
    pub async fn delete_todo(&self, id: i32) -> Result<(), TodoServiceError> {
        todo::Entity::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or(TodoServiceError::TodoNotFound(id))?;

        todo::Entity::delete_by_id(id).exec(self.db).await?;
        Ok(())
    }

    /// Produces one page of todos for a resolved list query, tags eagerly
    /// loaded. Ties on the requested sort key break by id ascending so the
    /// ordering is reproducible.
    #[tracing::instrument(skip(self))]
    pub async fn list_todos(&self, q: &TodoListQuery) -> Result<Page<Todo>, TodoServiceError> {
        use sea_orm::sea_query::Expr;
        use sea_orm::sea_query::extension::postgres::PgExpr;

        let mut select = todo::Entity::find();

        if !q.search.is_empty() {
            let pattern = format!("%{}%", q.search);
            select = select.filter(
                Condition::any()
                    .add(Expr::col((todo::Entity, todo::Column::Title)).ilike(pattern.clone()))
                    .add(Expr::col((todo::Entity, todo::Column::Description)).ilike(pattern)),
            );
        }
        if let Some(status) = q.status.as_status() {
            select = select.filter(todo::Column::Status.eq(status));
        }

        select = select
            .order_by(q.sort_by.column(), q.sort_order.order())
            .order_by_asc(todo::Column::Id);

        let paginator = select.paginate(self.db, q.limit);
        let ItemsAndPagesNumber {
            number_of_items,
            number_of_pages,
        } = paginator.num_items_and_pages().await?;
        let models = paginator.fetch_page(q.page - 1).await?;
        let tag_models = models.load_many(todo_tag::Entity, self.db).await?;

        let items = models
            .into_iter()
            .zip(tag_models)
            .map(|(model, tags)| Todo::from_models(model, tags))
            .collect();

        Ok(Page {
            items,
            total: number_of_items,
            page: q.page,
            per_page: q.limit,
            last_page: number_of_pages.max(1),
        })
    }

    /// Retrieves the full collection for export, ordered by id ascending,
    /// tags eagerly loaded.
    #[tracing::instrument(skip(self))]
    pub async fn export_todos(&self) -> Result<Vec<Todo>, TodoServiceError> {
        let models = todo::Entity::find()
            .order_by_asc(todo::Column::Id)
            .all(self.db)
            .await?;
        let tag_models = models.load_many(todo_tag::Entity, self.db).await?;

        Ok(models
            .into_iter()
            .zip(tag_models)
            .map(|(model, tags)| Todo::from_models(model, tags))
            .collect())
    }
}

/// Inserts one tag row per name for the given todo, in input order.
/// Duplicate names become separate rows; color is always "gray" for now.
async fn insert_tags<C: ConnectionTrait>(
    conn: &C,
    todo_id: i32,
    names: &[String],
) -> Result<Vec<todo_tag::Model>, DbErr> {
    let now = now_fixed();
    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let active_model = todo_tag::ActiveModel {
            todo_id: ActiveValue::Set(todo_id),
            name: ActiveValue::Set(name.clone()),
            color: ActiveValue::Set("gray".to_string()),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        tags.push(active_model.insert(conn).await?);
    }
    Ok(tags)
}
