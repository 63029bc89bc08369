use serde_json::Value;

/// 1) Trim whitespace + strip outer quotes, repeatedly, until neither applies.
pub fn clean_str(raw: &str) -> String {
    let mut s = raw.trim();
    while s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s = s[1..s.len() - 1].trim();
    }
    s.to_string()
}

/// 2) Render one JSON value as a single table cell.
///
/// Strings verbatim, `null` empty, other scalars via `to_string`, nested
/// arrays/objects as compact JSON so the recoverer can still find them.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// 3) Strip a surrounding Markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the info string ("json", "JSON", ...) on the opening line
    match body.find('\n') {
        Some(idx) if !body[..idx].trim().contains(['[', '{']) => body[idx + 1..].trim(),
        _ => body.trim(),
    }
}

/// 4) Fold a column name for loose matching: lowercase, no whitespace/`_`/`-`.
pub fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clean_str_trims_and_unquotes() {
        assert_eq!(clean_str("  BCS205 "), "BCS205");
        assert_eq!(clean_str("\"BCS205\""), "BCS205");
        assert_eq!(clean_str(" \" \"BCS205\" \" "), "BCS205");
        assert_eq!(clean_str("\""), "\"");
    }

    #[test]
    fn render_cell_by_kind() {
        assert_eq!(render_cell(&json!("Room 4")), "Room 4");
        assert_eq!(render_cell(&json!(null)), "");
        assert_eq!(render_cell(&json!(3)), "3");
        assert_eq!(render_cell(&json!(true)), "true");
        assert_eq!(
            render_cell(&json!([{"Course": "BCS205"}])),
            r#"[{"Course":"BCS205"}]"#
        );
    }

    #[test]
    fn strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```[1]```"), "[1]");
        assert_eq!(strip_code_fence("  [1]  "), "[1]");
        assert_eq!(strip_code_fence("```json [1]"), "```json [1]");
    }

    #[test]
    fn fold_key_ignores_case_and_separators() {
        assert_eq!(fold_key("Course Name"), "coursename");
        assert_eq!(fold_key("course_name"), "coursename");
        assert_eq!(fold_key("MAX-ENROLLMENT"), "maxenrollment");
    }
}
