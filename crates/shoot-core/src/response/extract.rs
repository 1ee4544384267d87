use serde_json::Value;

use super::FormatError;

/// Pulls the JSON document out of a model reply.
///
/// Accepts a fenced block (```` ```json ```` preferred over a bare fence) or a
/// reply that is itself a JSON object. Anything else is rejected.
pub fn extract_structured(raw: &str) -> Result<Value, FormatError> {
    let trimmed = raw.trim();
    let candidate = fenced_block(trimmed, "```json")
        .or_else(|| fenced_block(trimmed, "```"))
        .unwrap_or(trimmed);

    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(FormatError::NotStructured(
            "expected a JSON object".to_string(),
        )),
        Err(error) => Err(FormatError::NotStructured(error.to_string())),
    }
}

fn fenced_block<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    let close = rest.find("```")?;
    // A newline before the closing fence ends the label; without one the
    // fence sits on a single line and has no label.
    match rest[..close].find('\n') {
        Some(newline) => Some(rest[newline + 1..close].trim()),
        None => Some(rest[..close].trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_json_fence() {
        let raw = "```text\nignored\n```\n```json\n{\"a\": 1}\n```";
        assert_eq!(extract_structured(raw).unwrap()["a"], 1);
    }

    #[test]
    fn accepts_bare_fence() {
        let raw = "Result:\n```\n{\"a\": [1, 2]}\n```\nThanks";
        assert_eq!(extract_structured(raw).unwrap()["a"][1], 2);
    }

    #[test]
    fn accepts_single_line_fence_followed_by_text() {
        let raw = "```{\"a\":1}```\nmore";
        assert_eq!(extract_structured(raw).unwrap()["a"], 1);
    }

    #[test]
    fn accepts_whole_reply() {
        assert!(extract_structured("  {\"ok\": true}  ").is_ok());
    }

    #[test]
    fn rejects_arrays() {
        assert!(matches!(
            extract_structured("[1, 2]"),
            Err(FormatError::NotStructured(_))
        ));
    }

    #[test]
    fn rejects_unterminated_fence() {
        assert!(extract_structured("```json\n{\"a\": 1}").is_err());
    }
}
