use serde_json::Value;

use super::ResponseSchema;

/// Renders a validated document as markdown, one bolded field per block.
pub fn render_human(value: &Value, schema: Option<&ResponseSchema>) -> String {
    let Value::Object(map) = value else {
        return scalar(value);
    };

    let mut order: Vec<String> = schema
        .map(|schema| schema.property_names())
        .unwrap_or_default();
    let mut extra: Vec<&String> = map.keys().filter(|key| !order.contains(key)).collect();
    extra.sort();
    order.extend(extra.into_iter().cloned());

    let mut blocks = Vec::new();
    for field in order {
        let Some(field_value) = map.get(&field) else {
            continue;
        };
        let label = title_case(&field);

        let block = match field_value {
            Value::Array(items) => {
                let mut lines = vec![format!("**{label}**:")];
                lines.extend(items.iter().map(|item| format!("  - {}", scalar(item))));
                lines.join("\n")
            }
            Value::Object(entries) => {
                let mut lines = vec![format!("**{label}**:")];
                lines.extend(
                    entries
                        .iter()
                        .map(|(key, item)| format!("  - {}: {}", title_case(key), scalar(item))),
                );
                lines.join("\n")
            }
            other => format!("**{label}**: {}", scalar(other)),
        };
        blocks.push(block);
    }

    blocks.join("\n\n")
}

/// `likely_cause` -> `Likely Cause`.
pub fn title_case(field: &str) -> String {
    field
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
