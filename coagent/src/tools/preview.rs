//! Human-readable previews for approval prompts.
//!
//! Templates keyed by tool name with a generic fallback. Previews describe
//! the mutation in business terms; the raw input still travels alongside in
//! the prompt details.

use serde_json::Value;

fn pretty(value: Option<&Value>) -> String {
    match value {
        Some(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
        None => "{}".to_string(),
    }
}

fn str_field<'a>(input: &'a Value, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or("?")
}

/// Builds the preview shown in a `ui_prompt` frame.
pub fn preview_for(tool_name: &str, input: &Value) -> String {
    match tool_name {
        "create_doc" => format!(
            "Create new {}: {}",
            str_field(input, "doctype"),
            pretty(input.get("data"))
        ),
        "update_doc" => format!(
            "Update {} {}: {}",
            str_field(input, "doctype"),
            str_field(input, "name"),
            pretty(input.get("data"))
        ),
        "submit_doc" => format!(
            "Submit {} {}",
            str_field(input, "doctype"),
            str_field(input, "name")
        ),
        "cancel_doc" => format!(
            "Cancel {} {}",
            str_field(input, "doctype"),
            str_field(input, "name")
        ),
        "bulk_update" => {
            let count = input
                .get("updates")
                .and_then(Value::as_array)
                .map(|a| a.len())
                .unwrap_or(0);
            format!("Bulk update {} {} documents", count, str_field(input, "doctype"))
        }
        other => format!("Run {} with input: {}", other, pretty(Some(input))),
    }
}
