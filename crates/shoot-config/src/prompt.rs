use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("valid placeholder pattern")
});

/// Instruction text with `$name` / `${name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
}

impl PromptTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Substitutes known variables. Unknown placeholders are left as written
    /// and `$$` becomes a literal `$`.
    pub fn render(&self, variables: &BTreeMap<String, String>) -> String {
        PLACEHOLDER
            .replace_all(&self.source, |caps: &Captures<'_>| {
                if caps.get(1).is_some() {
                    return "$".to_string();
                }
                let name = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                variables
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Placeholder names referenced by the template.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = PLACEHOLDER
            .captures_iter(&self.source)
            .filter_map(|caps| caps.get(2).or_else(|| caps.get(3)))
            .map(|m| m.as_str().to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Combines static prompt variables with the request-supplied ones the agent
/// declared. Returns the merged map and the names that were ignored.
pub fn merge_variables(
    static_variables: &BTreeMap<String, String>,
    declared: &[String],
    supplied: &HashMap<String, String>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let mut merged = static_variables.clone();
    let mut ignored = Vec::new();

    for (name, value) in supplied {
        if declared.iter().any(|allowed| allowed == name) {
            merged.insert(name.clone(), value.clone());
        } else {
            ignored.push(name.clone());
        }
    }

    ignored.sort();
    (merged, ignored)
}
