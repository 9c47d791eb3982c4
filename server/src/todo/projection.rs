//! View-model pipeline over an already fetched page of todos.
//!
//! Everything here is a pure function of the snapshot it is given: local
//! search, status filter, sort, aggregate counts, kanban grouping, and the
//! export payloads. It only sees the current page, so re-filtering here
//! narrows the fetched rows rather than the whole dataset. Nothing in this
//! module talks to the store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Todo, TodoPriority, TodoStatus, date_is_past};

/// Client-local status filter, layered on top of whatever the server
/// already filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewFilter {
    All,
    Pending,
    Completed,
}

/// Client-local sort mode, independent of the server sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSort {
    /// Newest first.
    CreatedAt,
    /// Soonest first, todos without a due date last.
    DueDate,
    /// High before medium before low.
    Priority,
}

/// Aggregate counts over the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
}

/// The snapshot grouped into kanban columns by status.
#[derive(Debug, Clone, PartialEq)]
pub struct KanbanColumns {
    pub pending: Vec<Todo>,
    pub completed: Vec<Todo>,
}

fn priority_rank(priority: TodoPriority) -> u8 {
    match priority {
        TodoPriority::High => 3,
        TodoPriority::Medium => 2,
        TodoPriority::Low => 1,
    }
}

fn matches_search(todo: &Todo, needle: &str) -> bool {
    todo.title.to_lowercase().contains(needle)
        || todo
            .description
            .as_deref()
            .is_some_and(|description| description.to_lowercase().contains(needle))
        || todo
            .tags
            .iter()
            .any(|tag| tag.name.to_lowercase().contains(needle))
}

/// Derives the visible list: substring search over title, description, and
/// tag names, then the status filter, then the selected sort.
pub fn filter_and_sort(
    todos: &[Todo],
    search: &str,
    filter: ViewFilter,
    sort: ViewSort,
) -> Vec<Todo> {
    let needle = search.trim().to_lowercase();
    let mut result: Vec<Todo> = todos
        .iter()
        .filter(|todo| needle.is_empty() || matches_search(todo, &needle))
        .filter(|todo| match filter {
            ViewFilter::All => true,
            ViewFilter::Pending => todo.status == TodoStatus::Pending,
            ViewFilter::Completed => todo.status == TodoStatus::Completed,
        })
        .cloned()
        .collect();

    result.sort_by(|a, b| match sort {
        ViewSort::CreatedAt => b.created_at.cmp(&a.created_at),
        ViewSort::DueDate => match (a.due_date, b.due_date) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (Some(_), None) => std::cmp::Ordering::Less,
            (Some(left), Some(right)) => left.cmp(&right),
        },
        ViewSort::Priority => priority_rank(b.priority).cmp(&priority_rank(a.priority)),
    });

    result
}

/// Computes aggregate counts. Overdue is derived live from the due date,
/// independent of the store's cached `is_overdue` flag; the two diverge
/// when no mutating update has run since the due date passed.
pub fn stats(todos: &[Todo], now: DateTime<Utc>) -> ViewStats {
    ViewStats {
        total: todos.len(),
        completed: todos
            .iter()
            .filter(|todo| todo.status == TodoStatus::Completed)
            .count(),
        pending: todos
            .iter()
            .filter(|todo| todo.status == TodoStatus::Pending)
            .count(),
        overdue: todos
            .iter()
            .filter(|todo| {
                todo.status != TodoStatus::Completed
                    && todo.due_date.is_some_and(|date| date_is_past(date, now))
            })
            .count(),
    }
}

/// Groups the snapshot into status columns, preserving the input order.
pub fn kanban_columns(todos: &[Todo]) -> KanbanColumns {
    let (pending, completed) = todos
        .iter()
        .cloned()
        .partition(|todo| todo.status == TodoStatus::Pending);
    KanbanColumns { pending, completed }
}

/// Row shape for the JSON export of the visible list: camelCase keys and
/// tags flattened to their names.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRow<'a> {
    id: i32,
    title: &'a str,
    description: Option<&'a str>,
    status: &'a str,
    priority: &'a str,
    due_date: Option<String>,
    is_overdue: bool,
    order: i32,
    tags: Vec<&'a str>,
    created_at: String,
    updated_at: String,
}

impl<'a> From<&'a Todo> for ExportRow<'a> {
    fn from(todo: &'a Todo) -> Self {
        Self {
            id: todo.id,
            title: &todo.title,
            description: todo.description.as_deref(),
            status: todo.status.as_str(),
            priority: todo.priority.as_str(),
            due_date: todo.due_date.map(|date| date.to_string()),
            is_overdue: todo.is_overdue,
            order: todo.order,
            tags: todo.tags.iter().map(|tag| tag.name.as_str()).collect(),
            created_at: todo.created_at.to_rfc3339(),
            updated_at: todo.updated_at.to_rfc3339(),
        }
    }
}

/// Renders the visible list as pretty-printed JSON.
pub fn to_json(todos: &[Todo]) -> serde_json::Result<String> {
    let rows: Vec<ExportRow> = todos.iter().map(ExportRow::from).collect();
    serde_json::to_string_pretty(&rows)
}

/// Renders the visible list as CSV with the fixed column set
/// [ID, Title, Description, Status, Priority, DueDate, Tags, CreatedAt].
/// Text fields are quoted with inner quotes doubled so the output
/// round-trips.
pub fn to_csv(todos: &[Todo]) -> String {
    let header = "ID,Title,Description,Status,Priority,DueDate,Tags,CreatedAt";
    let mut lines = vec![header.to_string()];
    for todo in todos {
        let tags = todo
            .tags
            .iter()
            .map(|tag| tag.name.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        lines.push(format!(
            "{},{},{},{},{},{},{},{}",
            todo.id,
            csv_quote(&todo.title),
            csv_quote(todo.description.as_deref().unwrap_or("")),
            todo.status.as_str(),
            todo.priority.as_str(),
            todo.due_date.map(|date| date.to_string()).unwrap_or_default(),
            csv_quote(&tags),
            todo.created_at.format("%Y-%m-%d %H:%M:%S"),
        ));
    }
    lines.join("\n")
}

pub(crate) fn csv_quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Computes the list order after dragging `from_id` onto `to_id`, with
/// array-move semantics. The result is in-memory only: it is returned for
/// acknowledgment and never sent back to the store, so reloading restores
/// the server order.
pub fn reorder(todos: &[Todo], from_id: i32, to_id: i32) -> Option<Vec<Todo>> {
    if from_id == to_id {
        return None;
    }
    let from = todos.iter().position(|todo| todo.id == from_id)?;
    let to = todos.iter().position(|todo| todo.id == to_id)?;

    let mut result = todos.to_vec();
    let moved = result.remove(from);
    result.insert(to, moved);
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo::Tag;
    use chrono::{NaiveDate, TimeZone};

    fn sample(id: i32, title: &str) -> Todo {
        let created = Utc
            .with_ymd_and_hms(2026, 8, 1, 12, 0, 0)
            .unwrap()
            .fixed_offset()
            + chrono::Duration::hours(id as i64);
        Todo {
            id,
            title: title.to_string(),
            description: None,
            status: TodoStatus::Pending,
            priority: TodoPriority::Medium,
            due_date: None,
            is_overdue: false,
            order: 0,
            tags: Vec::new(),
            created_at: created,
            updated_at: created,
        }
    }

    fn tag(name: &str) -> Tag {
        Tag {
            id: 0,
            name: name.to_string(),
            color: "gray".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn search_matches_title_description_and_tag_names() {
        let mut groceries = sample(1, "Buy Milk");
        groceries.tags = vec![tag("errand")];
        let mut report = sample(2, "Quarterly report");
        report.description = Some("Figures for the MILK department".to_string());
        let other = sample(3, "Walk the dog");

        let todos = vec![groceries, report, other];

        let by_title = filter_and_sort(&todos, "milk", ViewFilter::All, ViewSort::CreatedAt);
        assert_eq!(by_title.len(), 2);

        let by_tag = filter_and_sort(&todos, "errand", ViewFilter::All, ViewSort::CreatedAt);
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].id, 1);
    }

    #[test]
    fn status_filter_layers_on_top_of_search() {
        let mut done = sample(1, "Buy milk");
        done.status = TodoStatus::Completed;
        let open = sample(2, "Buy milk again");

        let todos = vec![done, open];
        let result = filter_and_sort(&todos, "milk", ViewFilter::Pending, ViewSort::CreatedAt);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, 2);
    }

    #[test]
    fn created_at_sort_is_newest_first() {
        let todos = vec![sample(1, "old"), sample(3, "new"), sample(2, "mid")];
        let result = filter_and_sort(&todos, "", ViewFilter::All, ViewSort::CreatedAt);
        let ids: Vec<i32> = result.iter().map(|todo| todo.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn due_date_sort_puts_missing_dates_last() {
        let mut soon = sample(1, "soon");
        soon.due_date = Some(date(2026, 8, 26));
        let mut later = sample(2, "later");
        later.due_date = Some(date(2026, 9, 15));
        let undated = sample(3, "undated");

        let todos = vec![undated, later, soon];
        let result = filter_and_sort(&todos, "", ViewFilter::All, ViewSort::DueDate);
        let ids: Vec<i32> = result.iter().map(|todo| todo.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn priority_sort_ranks_high_over_medium_over_low() {
        let mut low = sample(1, "low");
        low.priority = TodoPriority::Low;
        let mut high = sample(2, "high");
        high.priority = TodoPriority::High;
        let medium = sample(3, "medium");

        let todos = vec![low, medium, high];
        let result = filter_and_sort(&todos, "", ViewFilter::All, ViewSort::Priority);
        let ids: Vec<i32> = result.iter().map(|todo| todo.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn stats_count_overdue_live_even_when_cached_flag_is_stale() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();

        // Past due date but the cached flag was never recomputed.
        let mut stale = sample(1, "stale");
        stale.due_date = Some(date(2026, 8, 20));
        stale.is_overdue = false;

        let mut done = sample(2, "done");
        done.status = TodoStatus::Completed;
        done.due_date = Some(date(2026, 8, 20));

        let fresh = sample(3, "fresh");

        let counts = stats(&[stale, done, fresh], now);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.overdue, 1);
    }

    #[test]
    fn kanban_groups_by_status_keeping_order() {
        let mut done = sample(2, "done");
        done.status = TodoStatus::Completed;
        let todos = vec![sample(1, "a"), done, sample(3, "b")];

        let columns = kanban_columns(&todos);
        let pending_ids: Vec<i32> = columns.pending.iter().map(|todo| todo.id).collect();
        assert_eq!(pending_ids, vec![1, 3]);
        assert_eq!(columns.completed.len(), 1);
    }

    #[test]
    fn csv_quotes_and_escapes_text_fields() {
        let mut todo = sample(1, "Say \"hello\"");
        todo.description = Some("line, with comma".to_string());
        todo.tags = vec![tag("work"), tag("home")];
        todo.due_date = Some(date(2026, 8, 30));

        let csv = to_csv(&[todo]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ID,Title,Description,Status,Priority,DueDate,Tags,CreatedAt"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("\"Say \"\"hello\"\"\""));
        assert!(row.contains("\"line, with comma\""));
        assert!(row.contains("\"work; home\""));
        assert!(row.contains("2026-08-30"));
    }

    #[test]
    fn json_export_flattens_tags_to_names() {
        let mut todo = sample(1, "Buy milk");
        todo.tags = vec![tag("errand")];

        let json = to_json(&[todo]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["title"], "Buy milk");
        assert_eq!(value[0]["tags"][0], "errand");
        assert_eq!(value[0]["status"], "pending");
    }

    #[test]
    fn reorder_moves_item_with_array_move_semantics() {
        let todos = vec![sample(1, "a"), sample(2, "b"), sample(3, "c")];
        let result = reorder(&todos, 1, 3).unwrap();
        let ids: Vec<i32> = result.iter().map(|todo| todo.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn reorder_is_a_no_op_for_same_or_unknown_ids() {
        let todos = vec![sample(1, "a"), sample(2, "b")];
        assert!(reorder(&todos, 1, 1).is_none());
        assert!(reorder(&todos, 1, 99).is_none());
    }

    #[test]
    fn reorder_never_touches_the_input_snapshot() {
        let todos = vec![sample(1, "a"), sample(2, "b")];
        let _ = reorder(&todos, 1, 2);
        let ids: Vec<i32> = todos.iter().map(|todo| todo.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
