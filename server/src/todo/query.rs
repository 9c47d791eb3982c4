//! Resolution of raw list-query parameters into a typed, bounded query.
//!
//! Enumeration values are checked here and rejected with field errors
//! instead of being passed through to the database.

use sea_orm::Order;
use serde::Deserialize;
use utoipa::IntoParams;

use super::{FieldError, TodoStatus};
use crate::entities::todo;

pub const DEFAULT_LIMIT: u64 = 50;

/// Raw query parameters as they arrive on `GET /`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Page number, starting at 1.
    #[serde(default)]
    pub page: Option<u64>,
    /// Page size.
    #[serde(default)]
    pub limit: Option<u64>,
    /// Case-insensitive substring to match against title and description.
    #[serde(default)]
    pub search: Option<String>,
    /// One of `all`, `pending`, `completed`.
    #[serde(default)]
    pub status: Option<String>,
    /// Stored column to sort by, e.g. `createdAt`, `dueDate`, `priority`.
    #[serde(default)]
    pub sort_by: Option<String>,
    /// One of `asc`, `desc`.
    #[serde(default)]
    pub sort_order: Option<String>,
}

/// Server-side status filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Pending,
    Completed,
}

impl StatusFilter {
    pub fn as_status(self) -> Option<TodoStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Pending => Some(TodoStatus::Pending),
            StatusFilter::Completed => Some(TodoStatus::Completed),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Pending => "pending",
            StatusFilter::Completed => "completed",
        }
    }
}

/// Stored columns the caller may sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Id,
    Title,
    Status,
    Priority,
    DueDate,
    Order,
    CreatedAt,
    UpdatedAt,
}

impl SortKey {
    pub fn column(self) -> todo::Column {
        match self {
            SortKey::Id => todo::Column::Id,
            SortKey::Title => todo::Column::Title,
            SortKey::Status => todo::Column::Status,
            SortKey::Priority => todo::Column::Priority,
            SortKey::DueDate => todo::Column::DueDate,
            SortKey::Order => todo::Column::Order,
            SortKey::CreatedAt => todo::Column::CreatedAt,
            SortKey::UpdatedAt => todo::Column::UpdatedAt,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Id => "id",
            SortKey::Title => "title",
            SortKey::Status => "status",
            SortKey::Priority => "priority",
            SortKey::DueDate => "dueDate",
            SortKey::Order => "order",
            SortKey::CreatedAt => "createdAt",
            SortKey::UpdatedAt => "updatedAt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn order(self) -> Order {
        match self {
            SortDir::Asc => Order::Asc,
            SortDir::Desc => Order::Desc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

/// A fully resolved list query with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoListQuery {
    pub page: u64,
    pub limit: u64,
    pub search: String,
    pub status: StatusFilter,
    pub sort_by: SortKey,
    pub sort_order: SortDir,
}

impl Default for TodoListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
            search: String::new(),
            status: StatusFilter::All,
            sort_by: SortKey::CreatedAt,
            sort_order: SortDir::Desc,
        }
    }
}

/// Resolves raw parameters into a `TodoListQuery`, collecting every
/// violation rather than stopping at the first.
pub fn resolve(params: &ListParams) -> Result<TodoListQuery, Vec<FieldError>> {
    let mut errors = Vec::new();

    let page = params.page.unwrap_or(1);
    if page < 1 {
        errors.push(FieldError::new("page", "page must be at least 1"));
    }

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if limit < 1 {
        errors.push(FieldError::new("limit", "limit must be at least 1"));
    }

    let status = match params.status.as_deref() {
        None | Some("all") => StatusFilter::All,
        Some("pending") => StatusFilter::Pending,
        Some("completed") => StatusFilter::Completed,
        Some(_) => {
            errors.push(FieldError::new(
                "status",
                "status must be one of all, pending, completed",
            ));
            StatusFilter::All
        }
    };

    let sort_by = match params.sort_by.as_deref() {
        None | Some("createdAt") => SortKey::CreatedAt,
        Some("updatedAt") => SortKey::UpdatedAt,
        Some("dueDate") => SortKey::DueDate,
        Some("priority") => SortKey::Priority,
        Some("title") => SortKey::Title,
        Some("status") => SortKey::Status,
        Some("order") => SortKey::Order,
        Some("id") => SortKey::Id,
        Some(_) => {
            errors.push(FieldError::new(
                "sortBy",
                "sortBy must be one of id, title, status, priority, dueDate, order, createdAt, updatedAt",
            ));
            SortKey::CreatedAt
        }
    };

    let sort_order = match params.sort_order.as_deref() {
        None | Some("desc") => SortDir::Desc,
        Some("asc") => SortDir::Asc,
        Some(_) => {
            errors.push(FieldError::new(
                "sortOrder",
                "sortOrder must be one of asc, desc",
            ));
            SortDir::Desc
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(TodoListQuery {
        page,
        limit,
        search: params.search.clone().unwrap_or_default(),
        status,
        sort_by,
        sort_order,
    })
}
