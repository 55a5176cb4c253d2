//! JSON extraction from model replies
//!
//! Models rarely return bare JSON: replies arrive wrapped in markdown
//! fences or surrounded by prose. These helpers pull out the first thing
//! that deserializes into the target type.

use serde::de::DeserializeOwned;

/// Parse a typed value from a model reply.
///
/// Tries, in order: a markdown code fence, the whole trimmed reply, and
/// each balanced top-level JSON object found in the text.
pub(crate) fn parse_json_reply<T: DeserializeOwned>(content: &str) -> Option<T> {
    let content = content.trim();
    if content.is_empty() {
        return None;
    }

    if let Some(fenced) = extract_json_from_markdown(content) {
        if let Ok(value) = serde_json::from_str(fenced) {
            return Some(value);
        }
    }

    if let Ok(value) = serde_json::from_str(content) {
        return Some(value);
    }

    for candidate in balanced_json_objects(content) {
        if let Ok(value) = serde_json::from_str(candidate) {
            return Some(value);
        }
    }

    None
}

/// Extract JSON content from a markdown code fence
fn extract_json_from_markdown(content: &str) -> Option<&str> {
    let patterns = ["```json\n", "```JSON\n", "```\n"];

    for pattern in patterns {
        if let Some(start) = content.find(pattern) {
            let json_start = start + pattern.len();
            if let Some(end) = content[json_start..].find("```") {
                return Some(content[json_start..json_start + end].trim());
            }
        }
    }

    None
}

/// Balanced top-level `{...}` slices, in order of appearance
fn balanced_json_objects(content: &str) -> Vec<&str> {
    let mut slices = Vec::new();
    let mut depth = 0usize;
    let mut start = None;

    for (i, c) in content.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            slices.push(&content[s..=i]);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        name: String,
    }

    #[test]
    fn test_parse_raw_json() {
        let parsed: Probe = parse_json_reply(r#"{"name": "glob"}"#).unwrap();
        assert_eq!(parsed.name, "glob");
    }

    #[test]
    fn test_parse_markdown_fence() {
        let content = "```json\n{\"name\": \"read\"}\n```";
        let parsed: Probe = parse_json_reply(content).unwrap();
        assert_eq!(parsed.name, "read");
    }

    #[test]
    fn test_parse_embedded_in_prose() {
        let content = "Here is my plan:\n{\"name\": \"shell\"}\nLet me know.";
        let parsed: Probe = parse_json_reply(content).unwrap();
        assert_eq!(parsed.name, "shell");
    }

    #[test]
    fn test_parse_skips_non_matching_objects() {
        let content = r#"{"other": 1} then {"name": "second"}"#;
        let parsed: Probe = parse_json_reply(content).unwrap();
        assert_eq!(parsed.name, "second");
    }

    #[test]
    fn test_parse_nested_braces() {
        #[derive(Debug, Deserialize)]
        struct Outer {
            inner: Probe,
        }
        let content = r#"text {"inner": {"name": "deep"}} more text"#;
        let parsed: Outer = parse_json_reply(content).unwrap();
        assert_eq!(parsed.inner.name, "deep");
    }

    #[test]
    fn test_parse_no_json() {
        assert!(parse_json_reply::<Probe>("just a plain sentence").is_none());
        assert!(parse_json_reply::<Probe>("").is_none());
    }

    #[test]
    fn test_extract_json_from_markdown() {
        let content = "```json\n{\"test\": true}\n```";
        assert_eq!(extract_json_from_markdown(content).unwrap(), "{\"test\": true}");
    }
}
