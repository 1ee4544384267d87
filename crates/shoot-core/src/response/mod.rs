//! Validation and rendering of a coordinator's final answer.
//!
//! The model's text is parsed into JSON by explicit extraction (a fenced
//! `json` block or the whole reply), validated against the agent's response
//! schema, and rendered either as canonical JSON or as markdown prose.
//! Nothing is invented: a reply that does not satisfy the schema is an error
//! naming the offending fields.

mod extract;
mod human;
mod schema;

use serde_json::Value;
use thiserror::Error;

pub use extract::extract_structured;
pub use human::{render_human, title_case};
pub use schema::{RenderMode, ResponseSchema};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("Response is not structured JSON: {0}")]
    NotStructured(String),

    #[error(
        "Response does not satisfy schema '{schema}' (missing: [{}], malformed: [{}])",
        .missing.join(", "),
        .malformed.join(", ")
    )]
    Invalid {
        schema: String,
        missing: Vec<String>,
        malformed: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormattedResponse {
    pub content_type: &'static str,
    pub body: String,
    /// The validated document, when a schema was applied.
    pub structured: Option<Value>,
}

impl FormattedResponse {
    fn plain(body: impl Into<String>) -> Self {
        Self {
            content_type: CONTENT_TYPE_TEXT,
            body: body.into(),
            structured: None,
        }
    }

    pub fn is_json(&self) -> bool {
        self.content_type == CONTENT_TYPE_JSON
    }

    /// The value placed in a JSON envelope: the object for machine output,
    /// the rendered text otherwise.
    pub fn envelope_value(&self) -> Value {
        match (&self.structured, self.is_json()) {
            (Some(value), true) => value.clone(),
            _ => Value::String(self.body.clone()),
        }
    }
}

/// Formats `raw` according to `schema`. Without a schema the text passes
/// through untouched as plain text.
pub fn format_response(
    raw: &str,
    schema: Option<&ResponseSchema>,
) -> Result<FormattedResponse, FormatError> {
    let Some(schema) = schema else {
        return Ok(FormattedResponse::plain(raw.trim()));
    };

    let value = extract_structured(raw)?;
    schema.validate(&value)?;

    let formatted = match schema.mode {
        RenderMode::Machine => FormattedResponse {
            content_type: CONTENT_TYPE_JSON,
            body: serde_json::to_string_pretty(&value)
                .map_err(|error| FormatError::NotStructured(error.to_string()))?,
            structured: Some(value),
        },
        RenderMode::Human => FormattedResponse {
            content_type: CONTENT_TYPE_TEXT,
            body: render_human(&value, Some(schema)),
            structured: Some(value),
        },
    };

    log::debug!(
        "Formatted response with schema '{}' as {}",
        schema.id,
        formatted.content_type
    );
    Ok(formatted)
}

/// Parses a body produced in machine mode back into its document.
pub fn parse_machine_body(body: &str) -> Result<Value, FormatError> {
    serde_json::from_str(body).map_err(|error| FormatError::NotStructured(error.to_string()))
}
