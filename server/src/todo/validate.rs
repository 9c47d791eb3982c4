//! Explicit validation for todo inputs. Every check runs before any store
//! mutation and failures come back as a field-level error list.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};

use super::{CreateTodoInput, FieldError, TodoPriority, TodoStatus, UpdateTodoInput};

pub const TITLE_MAX_CHARS: usize = 255;
pub const TAG_MAX_CHARS: usize = 50;

/// A validated creation payload, with defaults applied and the due date
/// parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePayload {
    pub title: String,
    pub description: Option<String>,
    pub priority: TodoPriority,
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<String>,
}

/// A validated partial patch. Outer `None` means "field absent, keep the
/// stored value"; inner `None` on the nullable fields means "clear it".
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePayload {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub order: Option<i32>,
    pub tags: Option<Vec<String>>,
}

/// Deserializes a field that must distinguish "absent" from explicit null.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer).map(Some)
}

pub fn validate_create(input: &CreateTodoInput) -> Result<CreatePayload, Vec<FieldError>> {
    let mut errors = Vec::new();

    let title = input.title.trim().to_string();
    check_title(&title, &mut errors);

    let priority = match &input.priority {
        Some(raw) => parse_priority(raw, &mut errors).unwrap_or(TodoPriority::Medium),
        None => TodoPriority::Medium,
    };

    let due_date = match &input.due_date {
        Some(raw) => parse_due_date(raw, &mut errors),
        None => None,
    };

    let tags = match &input.tags {
        Some(names) => check_tags(names, &mut errors),
        None => Vec::new(),
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(CreatePayload {
        title,
        description: input
            .description
            .as_ref()
            .map(|description| description.trim().to_string()),
        priority,
        due_date,
        tags,
    })
}

pub fn validate_update(input: &UpdateTodoInput) -> Result<UpdatePayload, Vec<FieldError>> {
    let mut errors = Vec::new();

    let title = input.title.as_ref().map(|raw| raw.trim().to_string());
    if let Some(title) = &title {
        check_title(title, &mut errors);
    }

    let status = match &input.status {
        Some(raw) => parse_status(raw, &mut errors),
        None => None,
    };

    let priority = match &input.priority {
        Some(raw) => parse_priority(raw, &mut errors),
        None => None,
    };

    let due_date = match &input.due_date {
        Some(Some(raw)) => parse_due_date(raw, &mut errors).map(|date| Some(Some(date))),
        Some(None) => Some(Some(None)),
        None => Some(None),
    };

    let tags = input.tags.as_ref().map(|names| check_tags(names, &mut errors));

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(UpdatePayload {
        title,
        description: input
            .description
            .clone()
            .map(|description| description.map(|text| text.trim().to_string())),
        status,
        priority,
        due_date: due_date.flatten(),
        order: input.order,
        tags,
    })
}

fn check_title(title: &str, errors: &mut Vec<FieldError>) {
    if title.is_empty() {
        errors.push(FieldError::new("title", "title must not be empty"));
    } else if title.chars().count() > TITLE_MAX_CHARS {
        errors.push(FieldError::new(
            "title",
            format!("title must be at most {} characters", TITLE_MAX_CHARS),
        ));
    }
}

fn check_tags(names: &[String], errors: &mut Vec<FieldError>) -> Vec<String> {
    let mut tags = Vec::with_capacity(names.len());
    for (index, raw) in names.iter().enumerate() {
        let name = raw.trim().to_string();
        if name.is_empty() {
            errors.push(FieldError::new(
                format!("tags[{}]", index),
                "tag name must not be empty",
            ));
        } else if name.chars().count() > TAG_MAX_CHARS {
            errors.push(FieldError::new(
                format!("tags[{}]", index),
                format!("tag name must be at most {} characters", TAG_MAX_CHARS),
            ));
        }
        tags.push(name);
    }
    tags
}

fn parse_status(raw: &str, errors: &mut Vec<FieldError>) -> Option<TodoStatus> {
    match raw {
        "pending" => Some(TodoStatus::Pending),
        "completed" => Some(TodoStatus::Completed),
        _ => {
            errors.push(FieldError::new(
                "status",
                "status must be one of pending, completed",
            ));
            None
        }
    }
}

fn parse_priority(raw: &str, errors: &mut Vec<FieldError>) -> Option<TodoPriority> {
    match raw {
        "low" => Some(TodoPriority::Low),
        "medium" => Some(TodoPriority::Medium),
        "high" => Some(TodoPriority::High),
        _ => {
            errors.push(FieldError::new(
                "priority",
                "priority must be one of low, medium, high",
            ));
            None
        }
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp, keeping the date part.
fn parse_due_date(raw: &str, errors: &mut Vec<FieldError>) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.date_naive());
    }
    errors.push(FieldError::new(
        "dueDate",
        "dueDate must be a YYYY-MM-DD date or an RFC 3339 timestamp",
    ));
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input(title: &str) -> CreateTodoInput {
        CreateTodoInput {
            title: title.to_string(),
            description: None,
            priority: None,
            due_date: None,
            tags: None,
        }
    }

    #[test]
    fn create_defaults_priority_to_medium() {
        let payload = validate_create(&create_input("Buy milk")).unwrap();
        assert_eq!(payload.priority, TodoPriority::Medium);
        assert_eq!(payload.due_date, None);
        assert!(payload.tags.is_empty());
    }

    #[test]
    fn create_rejects_empty_title() {
        let errors = validate_create(&create_input("   ")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "title");
    }

    #[test]
    fn create_rejects_overlong_title() {
        let errors = validate_create(&create_input(&"x".repeat(256))).unwrap_err();
        assert_eq!(errors[0].field, "title");
    }

    #[test]
    fn create_accepts_title_at_length_bound() {
        assert!(validate_create(&create_input(&"x".repeat(255))).is_ok());
    }

    #[test]
    fn create_rejects_unknown_priority() {
        let mut input = create_input("Buy milk");
        input.priority = Some("urgent".to_string());
        let errors = validate_create(&input).unwrap_err();
        assert_eq!(errors[0].field, "priority");
    }

    #[test]
    fn create_parses_plain_and_rfc3339_due_dates() {
        let mut input = create_input("Buy milk");
        input.due_date = Some("2026-08-30".to_string());
        let payload = validate_create(&input).unwrap();
        assert_eq!(
            payload.due_date,
            Some(NaiveDate::from_ymd_opt(2026, 8, 30).unwrap())
        );

        input.due_date = Some("2026-08-30T10:15:00Z".to_string());
        let payload = validate_create(&input).unwrap();
        assert_eq!(
            payload.due_date,
            Some(NaiveDate::from_ymd_opt(2026, 8, 30).unwrap())
        );
    }

    #[test]
    fn create_rejects_malformed_due_date() {
        let mut input = create_input("Buy milk");
        input.due_date = Some("next tuesday".to_string());
        let errors = validate_create(&input).unwrap_err();
        assert_eq!(errors[0].field, "dueDate");
    }

    #[test]
    fn create_reports_each_bad_tag_with_its_index() {
        let mut input = create_input("Buy milk");
        input.tags = Some(vec![
            "work".to_string(),
            "".to_string(),
            "y".repeat(51),
        ]);
        let errors = validate_create(&input).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "tags[1]");
        assert_eq!(errors[1].field, "tags[2]");
    }

    #[test]
    fn create_keeps_duplicate_tag_names() {
        let mut input = create_input("Buy milk");
        input.tags = Some(vec!["work".to_string(), "work".to_string()]);
        let payload = validate_create(&input).unwrap();
        assert_eq!(payload.tags, vec!["work", "work"]);
    }

    #[test]
    fn update_distinguishes_absent_from_explicit_null() {
        let absent: UpdateTodoInput = serde_json::from_str("{}").unwrap();
        let payload = validate_update(&absent).unwrap();
        assert_eq!(payload.due_date, None);
        assert_eq!(payload.description, None);

        let cleared: UpdateTodoInput =
            serde_json::from_str(r#"{"dueDate": null, "description": null}"#).unwrap();
        let payload = validate_update(&cleared).unwrap();
        assert_eq!(payload.due_date, Some(None));
        assert_eq!(payload.description, Some(None));
    }

    #[test]
    fn update_rejects_unknown_status() {
        let input: UpdateTodoInput = serde_json::from_str(r#"{"status": "done"}"#).unwrap();
        let errors = validate_update(&input).unwrap_err();
        assert_eq!(errors[0].field, "status");
    }

    #[test]
    fn update_accepts_empty_tag_list() {
        let input: UpdateTodoInput = serde_json::from_str(r#"{"tags": []}"#).unwrap();
        let payload = validate_update(&input).unwrap();
        assert_eq!(payload.tags, Some(Vec::new()));
    }
}
