use std::collections::BTreeSet;
use std::sync::Arc;

use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::FormatError;

/// How a validated response is rendered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[serde(rename = "json", alias = "machine")]
    Machine,
    #[default]
    Human,
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Machine => "json",
            RenderMode::Human => "human",
        }
    }
}

/// A named output contract: the raw schema document plus its compiled validator.
#[derive(Clone)]
pub struct ResponseSchema {
    pub id: String,
    pub description: Option<String>,
    pub mode: RenderMode,
    pub document: Value,
    validator: Arc<JSONSchema>,
}

impl std::fmt::Debug for ResponseSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSchema")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl ResponseSchema {
    /// Compiles `document` as a draft-7 JSON Schema.
    pub fn compile(
        id: impl Into<String>,
        document: Value,
        description: Option<String>,
        mode: RenderMode,
    ) -> Result<Self, String> {
        if !document.is_object() {
            return Err("schema document must be a JSON object".to_string());
        }

        let validator = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&document)
            .map_err(|error| format!("invalid JSON Schema: {error}"))?;

        Ok(Self {
            id: id.into(),
            description,
            mode,
            document,
            validator: Arc::new(validator),
        })
    }

    pub fn required_fields(&self) -> Vec<String> {
        self.document
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Required fields in declared order, then the remaining properties sorted.
    pub fn property_names(&self) -> Vec<String> {
        let mut names = self.required_fields();
        let rest: BTreeSet<String> = self
            .document
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default();
        for name in rest {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn validate(&self, value: &Value) -> Result<(), FormatError> {
        let errors: Vec<(String, String)> = match self.validator.validate(value) {
            Ok(()) => return Ok(()),
            Err(errors) => errors
                .map(|error| (error.instance_path.to_string(), error.to_string()))
                .collect(),
        };

        let missing: Vec<String> = match value.as_object() {
            Some(map) => self
                .required_fields()
                .into_iter()
                .filter(|field| !map.contains_key(field))
                .collect(),
            None => self.required_fields(),
        };

        let mut malformed: Vec<String> = errors
            .iter()
            .filter(|(path, _)| !path.is_empty())
            .map(|(path, message)| format!("{path}: {message}"))
            .collect();
        if missing.is_empty() && malformed.is_empty() {
            malformed = errors.into_iter().map(|(_, message)| message).collect();
        }

        Err(FormatError::Invalid {
            schema: self.id.clone(),
            missing,
            malformed,
        })
    }
}
