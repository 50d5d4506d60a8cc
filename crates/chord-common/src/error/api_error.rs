//! Decoded REST error bodies
//!
//! The service answers failed requests with
//! `{"code": 50035, "message": "Invalid Form Body", "errors": {...}}` where
//! `errors` nests per-field `_errors` arrays.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// One flattened field error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path to the offending field (`options.0.name`)
    pub path: String,
    /// Messages for that field joined with spaces
    pub message: String,
}

/// Structured error returned by the REST API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub status: u16,
    /// Service error code, 0 when the body carried none
    pub code: u32,
    pub message: String,
    /// Field errors ordered by path
    pub errors: Vec<FieldError>,
}

impl ApiError {
    /// Decode a response body; non-JSON bodies become the message verbatim
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => {
                let code = map
                    .get("code")
                    .and_then(Value::as_u64)
                    .map_or(0, |c| u32::try_from(c).unwrap_or(u32::MAX));
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let mut errors = Vec::new();
                if let Some(nested) = map.get("errors") {
                    flatten_errors(nested, String::new(), &mut errors);
                }
                errors.sort_by(|a, b| a.path.cmp(&b.path));
                Self {
                    status,
                    code,
                    message,
                    errors,
                }
            }
            _ => Self {
                status,
                code: 0,
                message: body.trim().to_string(),
                errors: Vec::new(),
            },
        }
    }

    /// Message followed by the flattened field errors, one per line
    #[must_use]
    pub fn text(&self) -> String {
        if self.errors.is_empty() {
            return self.message.clone();
        }
        let mut lines = Vec::with_capacity(self.errors.len() + 1);
        if !self.message.is_empty() {
            lines.push(self.message.clone());
        }
        for field in &self.errors {
            lines.push(format!("In {}: {}", field.path, field.message));
        }
        lines.join("\n")
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (error code: {})", self.status, self.code)?;
        let text = self.text();
        if !text.is_empty() {
            write!(f, ": {text}")?;
        }
        Ok(())
    }
}

fn flatten_errors(value: &Value, path: String, out: &mut Vec<FieldError>) {
    let Value::Object(map) = value else {
        return;
    };

    if let Some(Value::Array(items)) = map.get("_errors") {
        let message = items
            .iter()
            .filter_map(|item| item.get("message").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        out.push(FieldError {
            path: path.clone(),
            message,
        });
    }

    for (key, child) in map {
        if key == "_errors" {
            continue;
        }
        let child_path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        flatten_errors(child, child_path, out);
    }
}
