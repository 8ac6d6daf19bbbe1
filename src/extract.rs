//! Structured extraction from raw model text.
//!
//! Models wrap JSON in code fences, add commentary before and after it, get
//! cut off at the token limit, or break a single field. [`extract`] recovers
//! as much as possible:
//!
//! 1. Strip `<think>` blocks and markdown fence markers
//! 2. Slice from the first `{` to the last `}` and parse strictly
//! 3. If that fails, run one regex per field so a broken field cannot block
//!    recovery of the others
//!
//! Extraction never fails. When nothing is recoverable the result is
//! [`Extraction::Empty`].

use crate::invoker::RawModelOutput;
use crate::types::{ExtractedFields, ACTION_COUNT};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

static RE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_-]*").unwrap());
static RE_STARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""predicted_stars"\s*:\s*(-?\d+(?:\.\d+)?)"#).unwrap()
});
static RE_EXPLANATION: LazyLock<Regex> = LazyLock::new(|| string_field("explanation"));
static RE_SUMMARY: LazyLock<Regex> = LazyLock::new(|| string_field("summary"));
static RE_SENTIMENT: LazyLock<Regex> = LazyLock::new(|| string_field("sentiment"));
static RE_ACTIONS_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""actions"\s*:\s*\["#).unwrap());
static RE_LEADING_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)^"((?:[^"\\]|\\.)*)""#).unwrap());

fn string_field(key: &str) -> Regex {
    Regex::new(&format!(r#"(?s)"{}"\s*:\s*"((?:[^"\\]|\\.)*)""#, key)).unwrap()
}

/// Which path recovered the fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStrategy {
    /// The first-`{`-to-last-`}` slice parsed as strict JSON.
    Json,
    /// Per-field regex recovery after strict parsing failed.
    RegexFallback,
}

impl ExtractStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractStrategy::Json => "json",
            ExtractStrategy::RegexFallback => "regex_fallback",
        }
    }
}

/// Outcome of extracting one model response.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// At least one field was recovered.
    Parsed {
        fields: ExtractedFields,
        strategy: ExtractStrategy,
    },
    /// Failure marker, blank output, or nothing recognizable.
    Empty,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        matches!(self, Extraction::Empty)
    }

    pub fn strategy(&self) -> Option<ExtractStrategy> {
        match self {
            Extraction::Parsed { strategy, .. } => Some(*strategy),
            Extraction::Empty => None,
        }
    }

    /// The recovered fields; all absent for [`Extraction::Empty`].
    pub fn into_fields(self) -> ExtractedFields {
        match self {
            Extraction::Parsed { fields, .. } => fields,
            Extraction::Empty => ExtractedFields::default(),
        }
    }

    fn from_fields(fields: ExtractedFields, strategy: ExtractStrategy) -> Self {
        if fields.is_empty() {
            Extraction::Empty
        } else {
            Extraction::Parsed { fields, strategy }
        }
    }
}

/// Extract typed fields from a model invocation result.
pub fn extract(raw: &RawModelOutput) -> Extraction {
    match raw {
        RawModelOutput::Text(text) => extract_text(text),
        RawModelOutput::Failed(_) => Extraction::Empty,
    }
}

/// Extract typed fields from raw model text.
///
/// # Example
///
/// ```
/// use review_insight::extract::{extract_text, ExtractStrategy};
///
/// let raw = "Sure!\n```json\n{\"predicted_stars\": 4, \"explanation\": \"Tasty\"}\n```";
/// let extraction = extract_text(raw);
/// assert_eq!(extraction.strategy(), Some(ExtractStrategy::Json));
/// assert_eq!(extraction.into_fields().predicted_stars, Some(4));
/// ```
pub fn extract_text(text: &str) -> Extraction {
    let cleaned = strip_code_fences(&strip_think_tags(text));
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Extraction::Empty;
    }

    if let Some(map) = parse_object_slice(cleaned) {
        let extraction = Extraction::from_fields(fields_from_map(&map), ExtractStrategy::Json);
        debug!(strategy = "json", empty = extraction.is_empty(), "extracted model output");
        return extraction;
    }

    let extraction = Extraction::from_fields(fields_from_regex(cleaned), ExtractStrategy::RegexFallback);
    debug!(
        strategy = "regex_fallback",
        empty = extraction.is_empty(),
        "strict JSON parse failed, used per-field recovery"
    );
    extraction
}

/// Strip all `<think>...</think>` and `<thinking>...</thinking>` blocks.
///
/// An unclosed block is stripped to the end of the text.
///
/// ```
/// use review_insight::extract::strip_think_tags;
///
/// assert_eq!(strip_think_tags("<think>reasoning</think>result"), "result");
/// assert_eq!(strip_think_tags("<think>no closing tag"), "");
/// ```
pub fn strip_think_tags(text: &str) -> String {
    let result = strip_tag_variant(text, "<think>", "</think>");
    strip_tag_variant(&result, "<thinking>", "</thinking>")
}

fn strip_tag_variant(text: &str, open: &str, close: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find(open) {
        if let Some(end_offset) = result[start..].find(close) {
            let end = start + end_offset + close.len();
            result = format!("{}{}", &result[..start], &result[end..]);
        } else {
            result.truncate(start);
            break;
        }
    }
    result
}

/// Remove markdown fence markers (```` ``` ```` with an optional language tag).
pub fn strip_code_fences(text: &str) -> String {
    RE_FENCE.replace_all(text, "").into_owned()
}

/// Parse the slice between the first `{` and the last `}` as a JSON object.
fn parse_object_slice(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Map recognized keys; a value of the wrong type leaves its field absent.
fn fields_from_map(map: &Map<String, Value>) -> ExtractedFields {
    let string = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

    ExtractedFields {
        predicted_stars: map.get("predicted_stars").and_then(|v| {
            v.as_i64().or_else(|| v.as_f64().and_then(whole_number))
        }),
        explanation: string("explanation"),
        summary: string("summary"),
        actions: map.get("actions").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        }),
        sentiment: string("sentiment"),
    }
}

/// Recover each field independently from text that is not valid JSON.
fn fields_from_regex(text: &str) -> ExtractedFields {
    let quoted = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| unescape(m.as_str()))
    };

    let predicted_stars = RE_STARS
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .and_then(whole_number);

    let actions = actions_from_text(text);

    ExtractedFields {
        predicted_stars,
        explanation: quoted(&RE_EXPLANATION),
        summary: quoted(&RE_SUMMARY),
        actions,
        sentiment: quoted(&RE_SENTIMENT),
    }
}

/// `4.0` is a rating of 4; `4.5` is no rating.
fn whole_number(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() <= i64::MAX as f64)
        .then_some(value as i64)
}

/// Quoted elements of the `actions` list, read up to the first unquoted `]`
/// or the end of a truncated list.
fn actions_from_text(text: &str) -> Option<Vec<String>> {
    let open = RE_ACTIONS_OPEN.find(text)?;
    let mut rest = &text[open.end()..];
    let mut actions = Vec::new();

    while actions.len() < ACTION_COUNT {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() || rest.starts_with(']') {
            break;
        }
        if rest.starts_with('"') {
            let Some(caps) = RE_LEADING_QUOTED.captures(rest) else {
                break;
            };
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            actions.push(unescape(inner.as_str()));
            rest = &rest[whole.end()..];
        } else {
            // Skip a non-string element.
            match rest.find([',', ']']) {
                Some(idx) => rest = &rest[idx..],
                None => break,
            }
        }
    }
    Some(actions)
}

/// Decode JSON string escapes, keeping the raw text if they are malformed.
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::{FailureKind, InvocationFailure};

    const FULL: &str = r#"{"predicted_stars": 4, "explanation": "Mostly positive", "summary": "Customer loved the pasta but the check was slow.", "actions": ["Speed up billing", "Keep the pasta recipe", "Add staff at peak"], "sentiment": "Positive"}"#;

    fn fields(text: &str) -> ExtractedFields {
        extract_text(text).into_fields()
    }

    #[test]
    fn test_well_formed_recovers_every_field() {
        let extraction = extract_text(FULL);
        assert_eq!(extraction.strategy(), Some(ExtractStrategy::Json));
        let f = extraction.into_fields();
        assert_eq!(f.predicted_stars, Some(4));
        assert_eq!(f.explanation.as_deref(), Some("Mostly positive"));
        assert_eq!(
            f.summary.as_deref(),
            Some("Customer loved the pasta but the check was slow.")
        );
        assert_eq!(
            f.actions,
            Some(vec![
                "Speed up billing".to_string(),
                "Keep the pasta recipe".to_string(),
                "Add staff at peak".to_string(),
            ])
        );
        assert_eq!(f.sentiment.as_deref(), Some("Positive"));
    }

    #[test]
    fn test_code_fence_wrapping() {
        let text = format!("```json\n{}\n```", FULL);
        assert_eq!(fields(&text), fields(FULL));
    }

    #[test]
    fn test_leading_and_trailing_prose() {
        let text = format!("Here is my analysis:\n{}\nLet me know if you need more!", FULL);
        let extraction = extract_text(&text);
        assert_eq!(extraction.strategy(), Some(ExtractStrategy::Json));
        assert_eq!(extraction.into_fields(), fields(FULL));
    }

    #[test]
    fn test_think_block_is_ignored() {
        let text = format!("<think>the {{user}} seems happy</think>{}", FULL);
        assert_eq!(fields(&text), fields(FULL));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let f = fields(r#"{"predicted_stars": 2, "confidence": "high"}"#);
        assert_eq!(f.predicted_stars, Some(2));
        assert!(f.explanation.is_none());
    }

    #[test]
    fn test_type_mismatch_leaves_field_absent() {
        let f = fields(r#"{"predicted_stars": "4", "explanation": 12, "summary": "A fine enough meal overall.", "actions": "none"}"#);
        assert!(f.predicted_stars.is_none());
        assert!(f.explanation.is_none());
        assert!(f.actions.is_none());
        assert_eq!(f.summary.as_deref(), Some("A fine enough meal overall."));
    }

    #[test]
    fn test_truncated_json_recovers_complete_fields() {
        let text = r#"{"predicted_stars": 4, "explanation": "Good food", "summary": "The customer loved the pasta and service.", "actions": ["Keep quality", "Add seating", "Hire more"#;
        let extraction = extract_text(text);
        assert_eq!(extraction.strategy(), Some(ExtractStrategy::RegexFallback));
        let f = extraction.into_fields();
        assert_eq!(f.predicted_stars, Some(4));
        assert_eq!(f.explanation.as_deref(), Some("Good food"));
        assert_eq!(
            f.summary.as_deref(),
            Some("The customer loved the pasta and service.")
        );
        assert_eq!(
            f.actions,
            Some(vec!["Keep quality".to_string(), "Add seating".to_string()])
        );
        assert!(f.sentiment.is_none());
    }

    #[test]
    fn test_one_malformed_field_does_not_block_others() {
        let text = r#"{"predicted_stars": four, "explanation": "Tasty but \"pricey\"", "sentiment": "Mixed"}"#;
        let f = fields(text);
        assert!(f.predicted_stars.is_none());
        assert_eq!(f.explanation.as_deref(), Some("Tasty but \"pricey\""));
        assert_eq!(f.sentiment.as_deref(), Some("Mixed"));
        assert!(f.summary.is_none());
    }

    #[test]
    fn test_trailing_commentary_with_braces() {
        let text = r#"{"predicted_stars": 5, "explanation": "Raves"} Note: {not json}"#;
        let extraction = extract_text(text);
        assert_eq!(extraction.strategy(), Some(ExtractStrategy::RegexFallback));
        let f = extraction.into_fields();
        assert_eq!(f.predicted_stars, Some(5));
        assert_eq!(f.explanation.as_deref(), Some("Raves"));
    }

    #[test]
    fn test_fallback_caps_actions_at_three() {
        let text = r#"{"actions": ["a", "b", "c", "d", "e"], "summary": broken}"#;
        let f = fields(text);
        assert_eq!(
            f.actions,
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_fractional_stars_in_fallback_are_absent() {
        let f = fields(r#"{"predicted_stars": 4.5, "explanation": "ok", oops}"#);
        assert!(f.predicted_stars.is_none());
        assert_eq!(f.explanation.as_deref(), Some("ok"));
    }

    #[test]
    fn test_integral_float_stars_accepted() {
        let extraction = extract_text(r#"{"predicted_stars": 4.0, "explanation": "x"}"#);
        assert_eq!(extraction.strategy(), Some(ExtractStrategy::Json));
        assert_eq!(extraction.into_fields().predicted_stars, Some(4));

        let f = fields(r#"{"predicted_stars": 2.0, "explanation": "cold", oops}"#);
        assert_eq!(f.predicted_stars, Some(2));
        assert_eq!(f.explanation.as_deref(), Some("cold"));
    }

    #[test]
    fn test_fractional_stars_in_json_are_absent() {
        let f = fields(r#"{"predicted_stars": 4.5, "explanation": "x"}"#);
        assert!(f.predicted_stars.is_none());
    }

    #[test]
    fn test_fallback_actions_keep_brackets_inside_quotes() {
        let f = fields(r#"{"actions": ["Fix [urgent] issue", "b", "c"], "summary": oops}"#);
        assert_eq!(
            f.actions,
            Some(vec![
                "Fix [urgent] issue".to_string(),
                "b".to_string(),
                "c".to_string()
            ])
        );
    }

    #[test]
    fn test_fallback_actions_skip_non_strings() {
        let f = fields(r#"{"actions": [1, "Reheat plates", null, "Add staff \"now\""], oops"#);
        assert_eq!(
            f.actions,
            Some(vec!["Reheat plates".to_string(), "Add staff \"now\"".to_string()])
        );
    }

    #[test]
    fn test_empty_actions_list_is_not_empty_extraction() {
        let extraction = extract_text(r#"{"actions": []}"#);
        assert!(!extraction.is_empty());
        assert_eq!(extraction.into_fields().actions, Some(vec![]));
    }

    #[test]
    fn test_error_text_is_empty() {
        assert!(extract_text("ERROR: connection reset").is_empty());
    }

    #[test]
    fn test_blank_and_unrecognized_are_empty() {
        assert!(extract_text("").is_empty());
        assert!(extract_text("   \n ").is_empty());
        assert!(extract_text(r#"{"rating": 4}"#).is_empty());
        assert!(extract_text("I cannot help with that.").is_empty());
    }

    #[test]
    fn test_failure_marker_is_empty() {
        let raw = RawModelOutput::Failed(InvocationFailure {
            kind: FailureKind::Exhausted,
            message: "HTTP 429: rate limit".into(),
            attempts: 3,
        });
        assert_eq!(extract(&raw), Extraction::Empty);
        assert_eq!(extract(&raw).into_fields(), ExtractedFields::default());
    }

    #[test]
    fn test_strip_think_tags_variants() {
        assert_eq!(strip_think_tags("<thinking>also works</thinking>done"), "done");
        assert_eq!(strip_think_tags("a<think>x</think>b<think>y</think>c"), "abc");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "\n{}\n");
    }
}
