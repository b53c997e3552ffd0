//! Recover a structured payload from free-form model output.

use std::sync::LazyLock;

use regex::Regex;

use super::types::ResultShape;

/// Fenced block labelled `json`; the interior match is non-greedy.
static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap());

/// Interior of the first ```` ```json ```` fence, or the whole text when there is none.
pub fn extract_json_block(raw: &str) -> &str {
    JSON_FENCE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or_else(|| raw.trim())
}

/// Replace typographic quotation marks with their ASCII equivalents.
pub fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect()
}

/// Fenced-block extraction followed by quote normalization.
pub fn prepare_payload(raw: &str) -> String {
    normalize_quotes(extract_json_block(raw))
}

/// Parse `raw` model output into `T`.
///
/// On failure the prepared content is returned alongside the parse error so
/// the caller can report exactly what was attempted.
pub fn parse_structured<T: ResultShape>(raw: &str) -> Result<T, (String, serde_json::Error)> {
    let content = prepare_payload(raw);
    serde_json::from_str(&content).map_err(|e| (content, e))
}
