use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_yaml::Value;

use crate::error::ValidationError;

static ENV_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid env pattern")
});

/// Inline prompt text uses `${name}` for template variables, not env vars.
const TEMPLATE_KEY: &str = "system_prompt";

/// Expands `${VAR}` and `${VAR:-default}` in one string.
///
/// Unset variables without a default are reported by name; the surrounding
/// text is never included in the error.
pub fn expand_str<F>(input: &str, lookup: &F) -> Result<String, Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = Vec::new();
    let expanded = ENV_PATTERN.replace_all(input, |caps: &Captures<'_>| {
        let name = &caps[1];
        match (lookup(name), caps.get(2)) {
            (Some(value), _) => value,
            (None, Some(default)) => default.as_str().to_string(),
            (None, None) => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(expanded.into_owned())
    } else {
        Err(missing)
    }
}

/// Expands every string scalar in a YAML tree in place.
pub fn interpolate<F>(value: &mut Value, lookup: &F) -> Vec<ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();
    walk(value, String::new(), lookup, &mut errors);
    errors
}

fn walk<F>(value: &mut Value, path: String, lookup: &F, errors: &mut Vec<ValidationError>)
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(text) => {
            if !text.contains("${") {
                return;
            }
            match expand_str(text, lookup) {
                Ok(expanded) => *text = expanded,
                Err(missing) => {
                    for name in missing {
                        errors.push(ValidationError::new(
                            path.clone(),
                            format!("environment variable ${{{name}}} is not set"),
                        ));
                    }
                }
            }
        }
        Value::Sequence(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                walk(item, format!("{path}[{index}]"), lookup, errors);
            }
        }
        Value::Mapping(mapping) => {
            for (key, item) in mapping.iter_mut() {
                let key = key.as_str().map(str::to_string).unwrap_or_else(|| "?".to_string());
                if key == TEMPLATE_KEY {
                    continue;
                }
                let child = if path.is_empty() {
                    key
                } else {
                    format!("{path}.{key}")
                };
                walk(item, child, lookup, errors);
            }
        }
        Value::Tagged(tagged) => walk(&mut tagged.value, path, lookup, errors),
        _ => {}
    }
}

/// Reads variables from the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
