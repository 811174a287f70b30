//! JSON extraction from reasoning-service responses.
//!
//! The reasoning service is asked to end its final message with a JSON
//! object, but responses may wrap it in markdown code fences or surround it
//! with explanatory text. Extraction tries, in order:
//!
//! 1. The whole trimmed content, when it is itself a JSON object
//! 2. The contents of a ```json (or generic) code fence
//! 3. The last brace-balanced object found anywhere in the content

/// Extracts a JSON object from mixed response content.
///
/// Returns the extracted text only if it parses as a JSON object; callers
/// deserialize it into their own shape.
pub fn extract_json_object(content: &str) -> Option<String> {
    let trimmed = content.trim();

    if trimmed.starts_with('{') && parses_as_object(trimmed) {
        return Some(trimmed.to_string());
    }

    if let Some(fenced) = extract_from_code_fence(trimmed) {
        if parses_as_object(&fenced) {
            return Some(fenced);
        }
    }

    extract_last_balanced_object(trimmed)
}

fn parses_as_object(candidate: &str) -> bool {
    matches!(
        serde_json::from_str::<serde_json::Value>(candidate),
        Ok(serde_json::Value::Object(_))
    )
}

/// Pulls the body out of the first ``` fence, tolerating a language tag.
fn extract_from_code_fence(content: &str) -> Option<String> {
    let start = content.find("```")?;
    let after_fence = &content[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

/// Scans for the last brace-balanced `{...}` span that parses as an object.
///
/// String literals and escapes are tracked so braces inside quoted values do
/// not unbalance the scan.
fn extract_last_balanced_object(content: &str) -> Option<String> {
    let bytes = content.as_bytes();
    let mut best: Option<String> = None;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = find_matching_brace(content, i) {
                let candidate = &content[i..=end];
                if parses_as_object(candidate) {
                    best = Some(candidate.to_string());
                    i = end + 1;
                    continue;
                }
            }
        }
        i += 1;
    }

    best
}

fn find_matching_brace(content: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in content[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_direct_object() {
        let json = extract_json_object(r#"{"passed": true, "details": "ok"}"#).unwrap();
        assert!(json.contains("passed"));
    }

    #[test]
    fn extracts_from_markdown_fence() {
        let content = "Here you go:\n```json\n{\"passed\": false, \"details\": \"bad\"}\n```\n";
        let json = extract_json_object(content).unwrap();
        assert!(json.starts_with('{'));
        assert!(json.contains("bad"));
    }

    #[test]
    fn extracts_object_embedded_in_prose() {
        let content = r#"The check is done. {"passed": true, "details": "fine"} Thanks!"#;
        let json = extract_json_object(content).unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&json).unwrap()["details"],
            "fine"
        );
    }

    #[test]
    fn prefers_last_object_when_several_present() {
        let content = r#"{"passed": false, "details": "draft"} final: {"passed": true, "details": "real"}"#;
        let json = extract_json_object(content).unwrap();
        assert!(json.contains("real"));
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_scan() {
        let content = r#"note {"details": "use {braces} carefully", "passed": true} done"#;
        let json = extract_json_object(content).unwrap();
        assert!(json.contains("{braces}"));
    }

    #[test]
    fn returns_none_for_plain_text() {
        assert!(extract_json_object("no json here at all").is_none());
    }

    #[test]
    fn returns_none_for_truncated_object() {
        assert!(extract_json_object(r#"{"passed": true, "details": "cut"#).is_none());
    }
}
