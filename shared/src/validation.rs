//! Field validation for task and account payloads.
//!
//! The server runs [`TaskChanges::from_json`] on every request body, and the
//! terminal client runs [`validate_title`] before submitting a form, so both
//! sides reject the same titles with the same messages.

use std::collections::BTreeMap;

use serde_json::Value;

pub const TITLE_MAX_CHARS: usize = 200;
pub const USERNAME_MAX_CHARS: usize = 150;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NOT_A_STRING: &str = "Not a valid string.";
pub const NOT_A_BOOLEAN: &str = "Must be a valid boolean.";
pub const NOT_AN_OBJECT: &str = "Expected a JSON object.";

/// Field name to message, ordered so responses are deterministic.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// `POST` and `PUT`: `title` must be present.
    Full,
    /// `PATCH`: every member is optional.
    Partial,
}

/// Validated members of a task body. Unknown members are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

impl TaskChanges {
    pub fn from_json(body: &Value, mode: ValidationMode) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        let Some(object) = body.as_object() else {
            errors.insert("non_field_errors".to_string(), NOT_AN_OBJECT.to_string());
            return Err(errors);
        };

        let title = match object.get("title") {
            None if mode == ValidationMode::Full => {
                errors.insert("title".to_string(), REQUIRED.to_string());
                None
            }
            None => None,
            Some(Value::String(raw)) => match validate_title(raw) {
                Ok(title) => Some(title),
                Err(message) => {
                    errors.insert("title".to_string(), message.to_string());
                    None
                }
            },
            Some(Value::Null) => {
                errors.insert("title".to_string(), "This field may not be null.".to_string());
                None
            }
            Some(_) => {
                errors.insert("title".to_string(), NOT_A_STRING.to_string());
                None
            }
        };

        let completed = match object.get("completed") {
            None => None,
            Some(Value::Bool(flag)) => Some(*flag),
            Some(_) => {
                errors.insert("completed".to_string(), NOT_A_BOOLEAN.to_string());
                None
            }
        };

        if errors.is_empty() {
            Ok(Self { title, completed })
        } else {
            Err(errors)
        }
    }
}

/// Trims `raw` and checks it is a usable title.
pub fn validate_title(raw: &str) -> Result<String, &'static str> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(BLANK);
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err("Ensure this field has no more than 200 characters.");
    }
    Ok(title.to_string())
}

/// Usernames are 1..=150 letters, digits or `@ . + - _`.
pub fn validate_username(raw: &str) -> Result<String, &'static str> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(BLANK);
    }
    if username.chars().count() > USERNAME_MAX_CHARS {
        return Err("Ensure this field has no more than 150 characters.");
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err("Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters.");
    }
    Ok(username.to_string())
}
