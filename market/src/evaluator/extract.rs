// market/src/evaluator/extract.rs

//! Extraction of a JSON object from free-form model output.
//!
//! Models frequently wrap the JSON they were asked for in surrounding
//! prose or markdown code fences. Rather than scattering ad hoc string
//! surgery around the adapter, the heuristic lives in this one function:
//! find the first balanced `{…}` span, tracking string literals and escape
//! sequences so braces inside strings do not unbalance the scan.

/// Returns the first well-formed JSON object span in `text`, if any.
///
/// "Well-formed" here means brace-balanced; the caller still runs a real
/// JSON parse on the returned slice, so a balanced-but-invalid span simply
/// fails at that stage.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
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
    fn extracts_bare_object() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn extracts_object_from_code_fence() {
        let text = "Sure! Here is the JSON:\n```json\n{\"score\": 92}\n```\nHope that helps.";
        assert_eq!(extract_json_object(text), Some("{\"score\": 92}"));
    }

    #[test]
    fn extracts_nested_objects_as_one_span() {
        let text = r#"prefix {"outer": {"inner": [1, 2]}} suffix"#;
        assert_eq!(extract_json_object(text), Some(r#"{"outer": {"inner": [1, 2]}}"#));
    }

    #[test]
    fn braces_inside_strings_do_not_unbalance() {
        let text = r#"{"feedback": "use {braces} \" and escapes"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn unbalanced_input_yields_none() {
        assert_eq!(extract_json_object(r#"{"a": 1"#), None);
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn extracted_span_parses_with_serde_json() {
        let text = "noise {\"score\": 90.5, \"feedback\": \"ok\", \"approved\": true} noise";
        let span = extract_json_object(text).expect("span found");
        let value: serde_json::Value = serde_json::from_str(span).expect("span parses");
        assert_eq!(value["score"], 90.5);
    }
}
