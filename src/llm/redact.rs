use serde_json::Value;
use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 300;
const REDACTED: &str = "[REDACTED]";

/// Token prefixes that are redacted up to the end of the token.
const SECRET_PREFIXES: [&str; 6] = ["sk-or-", "sk-", "ghp_", "hf_", "xoxb-", "AIza"];

/// Markers whose following value is redacted.
const SECRET_MARKERS: [&str; 6] = [
    "Bearer ",
    "bearer ",
    "api_key=",
    "access_token=",
    "\"api_key\":\"",
    "\"access_token\":\"",
];

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '/' | '=')
}

fn redact_after(scrubbed: &mut String, marker: &str, keep_marker: bool) {
    let mut search_from = 0;
    while let Some(rel) = scrubbed[search_from..].find(marker) {
        let start = search_from + rel;
        let value_start = start + marker.len();

        // Bare prefixes only count at the start of a word ("task-id" is not a key).
        if !keep_marker
            && scrubbed[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric())
        {
            search_from = value_start;
            continue;
        }
        let value_end = scrubbed[value_start..]
            .char_indices()
            .find(|(_, c)| !is_secret_char(*c))
            .map_or(scrubbed.len(), |(i, _)| value_start + i);

        if value_end == value_start {
            search_from = value_start;
            continue;
        }

        let replace_from = if keep_marker { value_start } else { start };
        scrubbed.replace_range(replace_from..value_end, REDACTED);
        search_from = replace_from + REDACTED.len();
    }
}

/// Redact provider keys and bearer tokens from text headed for logs or errors.
pub fn scrub_secrets(input: &str) -> Cow<'_, str> {
    let suspicious = SECRET_PREFIXES
        .iter()
        .chain(SECRET_MARKERS.iter())
        .any(|pattern| input.contains(pattern));
    if !suspicious {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for prefix in SECRET_PREFIXES {
        redact_after(&mut scrubbed, prefix, false);
    }
    for marker in SECRET_MARKERS {
        redact_after(&mut scrubbed, marker, true);
    }
    Cow::Owned(scrubbed)
}

fn truncate_chars(text: &str, max_chars: usize) -> Option<&str> {
    text.char_indices().nth(max_chars).map(|(end, _)| &text[..end])
}

/// Scrub and cap a provider error body before it lands in an error message.
pub fn sanitize_error_body(body: &str) -> String {
    let scrubbed = scrub_secrets(body.trim());
    match truncate_chars(&scrubbed, MAX_API_ERROR_CHARS) {
        Some(head) => format!("{head}..."),
        None => scrubbed.into_owned(),
    }
}

/// Shorten every string in `value` longer than `max_chars`, recording the
/// original length. Keeps inline images and files out of debug logs.
pub fn truncate_large_fields(value: &mut Value, max_chars: usize) {
    match value {
        Value::String(text) => {
            if let Some(head) = truncate_chars(text, max_chars) {
                let total = text.chars().count();
                *text = format!("{head}...[{total} chars]");
            }
        }
        Value::Array(items) => {
            for item in items {
                truncate_large_fields(item, max_chars);
            }
        }
        Value::Object(fields) => {
            for field in fields.values_mut() {
                truncate_large_fields(field, max_chars);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
