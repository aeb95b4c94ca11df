//! Defensive parsing of free-form model output.
//!
//! Model replies are untrusted text. [`extract_structured`] tries a strict
//! JSON decode first, then the outermost `{...}` span, and otherwise hands
//! the raw text back to the caller so it can degrade gracefully.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Fields decoded from a JSON object reply.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredReply {
    fields: Map<String, Value>,
}

impl StructuredReply {
    /// Field value as text, exactly as decoded. Non-string values are
    /// rendered as JSON; `null` and absent fields are `None`.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Field value as text, or `None` when absent or blank.
    pub fn non_empty(&self, field: &str) -> Option<String> {
        self.text(field).filter(|s| !s.trim().is_empty())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

/// The untouched model reply, returned when no JSON object could be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawText(pub String);

/// Decode a JSON object reply, keeping only `fields`.
pub fn extract_structured(text: &str, fields: &[&str]) -> Result<StructuredReply, RawText> {
    let trimmed = text.trim();

    let decoded = serde_json::from_str::<Value>(trimmed).ok().or_else(|| {
        outermost_braces()
            .find(trimmed)
            .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
    });

    match decoded {
        Some(Value::Object(mut object)) => {
            object.retain(|key, _| fields.contains(&key.as_str()));
            Ok(StructuredReply { fields: object })
        }
        _ => Err(RawText(text.to_string())),
    }
}

fn outermost_braces() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"))
}

/// Body of the first `<tag>...</tag>` block, trimmed.
pub fn extract_tagged_code(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim().to_string())
}

/// Wrap `code` in `<tag>` markers unless it already carries them.
/// A surrounding markdown fence is dropped first.
pub fn ensure_tagged_code(code: &str, tag: &str) -> String {
    let code = code.trim();
    if code.is_empty() || extract_tagged_code(code, tag).is_some() {
        return code.to_string();
    }
    format!("<{tag}>\n{}\n</{tag}>", strip_code_fence(code))
}

/// Drop a surrounding markdown code fence, if present.
pub fn strip_code_fence(code: &str) -> &str {
    let code = code.trim();
    let Some(rest) = code.strip_prefix("```") else {
        return code;
    };
    // Skip the language hint on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
