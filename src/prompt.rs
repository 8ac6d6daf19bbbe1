//! Prompt templates for rating prediction, insights and replies.
//!
//! Templates use `{input}` for the review text and `{key}` for context
//! variables; `{{` and `}}` produce literal braces so JSON examples can be
//! embedded. Rendering is pure and deterministic.

use crate::types::Stars;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Sentinel that should never appear in real templates.
const ESCAPE_SENTINEL: &str = "\x00LBRACE\x00";
/// Sentinel for escaped closing brace.
const ESCAPE_SENTINEL_CLOSE: &str = "\x00RBRACE\x00";

const BASELINE_TEMPLATE: &str = r#"Classify this Yelp review on a scale of 1-5 stars.

Review: "{input}"

Respond with valid JSON only:
{{"predicted_stars": <1-5>, "explanation": "<brief reason>"}}"#;

const CRITERIA_TEMPLATE: &str = r#"Rate this Yelp review (1-5):

1★ very negative; major failures; strong dissatisfaction
2★ mostly negative; significant issues; few positives
3★ mixed; clear positives + negatives; neutral tone
4★ mostly positive; minor issues only; satisfied
5★ very positive; enthusiastic praise; no real complaints

EXAMPLES:
1★ → "Food was cold, long wait, rude server." → {{"predicted_stars": 1, "explanation": "Severe complaints"}}
3★ → "Decent burger, soggy fries, friendly service." → {{"predicted_stars": 3, "explanation": "Mixed"}}
4★ → "Loved the pasta, slow check." → {{"predicted_stars": 4, "explanation": "Mostly positive"}}

Review: "{input}"

Respond with valid JSON only:
{{"predicted_stars": <1-5>, "explanation": "<brief reason>"}}"#;

const CHAIN_OF_THOUGHT_TEMPLATE: &str = r#"Rate this Yelp review (1-5 stars) by analyzing it systematically.

Review: "{input}"

Think through:
1. What specific positive aspects are mentioned?
2. What specific negative aspects are mentioned?
3. What's the overall emotional tone?
4. Are there any strong keywords (love, hate, terrible, amazing)?

Respond with valid JSON only:
{{"predicted_stars": <1-5>, "explanation": "<brief reason>"}}"#;

const INSIGHTS_TEMPLATE: &str = r#"Analyze this restaurant review and provide actionable insights.

Review: "{input}"
User Rating: {user_rating} stars
AI Predicted: {predicted_rating} stars

Provide a JSON response with:
1. A brief 2-sentence summary of the customer's experience
2. Exactly 3 specific, actionable recommendations for the restaurant owner
3. Overall sentiment (must be exactly one of: Positive, Negative, or Mixed)

Example format:
{{
  "summary": "Customer enjoyed the food quality and ambiance. Service speed could be improved.",
  "actions": [
    "Train staff on faster order processing",
    "Maintain current food quality standards",
    "Improve table turnover during peak hours"
  ],
  "sentiment": "Positive"
}}

Respond ONLY with valid JSON matching this format:"#;

const REPLY_TEMPLATE: &str = r#"Generate a friendly, empathetic 2-sentence response to this customer review.

Review: "{input}"
Rating: {rating} stars

Be genuine and acknowledge their specific feedback. Respond naturally, not in JSON."#;

/// Rating-prompt strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PromptVariant {
    /// Direct ask.
    Baseline,
    /// Star rubric with calibration examples.
    CriteriaBased,
    /// Guided step-by-step analysis.
    #[default]
    ChainOfThought,
}

impl PromptVariant {
    pub const ALL: [PromptVariant; 3] = [
        PromptVariant::Baseline,
        PromptVariant::CriteriaBased,
        PromptVariant::ChainOfThought,
    ];

    /// Short version tag used by the API and evaluation records.
    pub fn version(self) -> &'static str {
        match self {
            PromptVariant::Baseline => "v1",
            PromptVariant::CriteriaBased => "v2",
            PromptVariant::ChainOfThought => "v3",
        }
    }

    /// Resolve a name or version tag; unknown names select chain-of-thought.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    fn template(self) -> &'static str {
        match self {
            PromptVariant::Baseline => BASELINE_TEMPLATE,
            PromptVariant::CriteriaBased => CRITERIA_TEMPLATE,
            PromptVariant::ChainOfThought => CHAIN_OF_THOUGHT_TEMPLATE,
        }
    }
}

impl FromStr for PromptVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" | "v1" => Ok(PromptVariant::Baseline),
            "criteria-based" | "criteria" | "v2" => Ok(PromptVariant::CriteriaBased),
            "chain-of-thought" | "cot" | "v3" => Ok(PromptVariant::ChainOfThought),
            other => Err(format!("unknown prompt variant '{}'", other)),
        }
    }
}

impl fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PromptVariant::Baseline => "baseline",
            PromptVariant::CriteriaBased => "criteria-based",
            PromptVariant::ChainOfThought => "chain-of-thought",
        };
        f.write_str(name)
    }
}

/// Context for the insights prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewContext {
    pub user_rating: Option<Stars>,
    pub predicted_rating: Option<Stars>,
}

/// Named values substituted into `{key}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    data: BTreeMap<String, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|s| s.as_str())
    }
}

/// Build a prompt string with variable substitution.
///
/// Replaces `{key}` placeholders in the template with values from `vars`.
/// The special `{input}` placeholder is replaced by the `input` parameter.
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
///
/// # Example
///
/// ```
/// use review_insight::prompt::{render, PromptVars};
///
/// let vars = PromptVars::new().insert("rating", "4");
/// let result = render("{input} got {rating}: {{\"ok\": true}}", "Pizza", &vars);
/// assert_eq!(result, r#"Pizza got 4: {"ok": true}"#);
/// ```
pub fn render(template: &str, input: &str, vars: &PromptVars) -> String {
    // Pass 1: protect escaped braces
    let mut rendered = template.replace("{{", ESCAPE_SENTINEL);
    rendered = rendered.replace("}}", ESCAPE_SENTINEL_CLOSE);

    // Pass 2: substitute context first so review text is never re-scanned
    for (key, value) in &vars.data {
        let placeholder = format!("{{{}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }
    rendered = rendered.replace("{input}", input);

    // Pass 3: restore escaped braces
    rendered = rendered.replace(ESCAPE_SENTINEL, "{");
    rendered = rendered.replace(ESCAPE_SENTINEL_CLOSE, "}");
    rendered
}

/// Render the prompt for a review.
///
/// Without context this is the rating prompt of `variant`. With context it is
/// the insights prompt (summary, three actions, sentiment), which does not
/// vary by strategy.
pub fn build(variant: PromptVariant, review_text: &str, context: Option<&ReviewContext>) -> String {
    match context {
        None => render(variant.template(), review_text, &PromptVars::new()),
        Some(ctx) => render(INSIGHTS_TEMPLATE, review_text, &insight_vars(ctx)),
    }
}

/// Render the prompt asking for a plain-text reply to the customer.
pub fn build_reply(review_text: &str, rating: Stars) -> String {
    let vars = PromptVars::new().insert("rating", rating.to_string());
    render(REPLY_TEMPLATE, review_text, &vars)
}

fn insight_vars(ctx: &ReviewContext) -> PromptVars {
    let show = |s: Option<Stars>| s.map(|s| s.to_string()).unwrap_or_else(|| "unknown".into());
    PromptVars::new()
        .insert("user_rating", show(ctx.user_rating))
        .insert("predicted_rating", show(ctx.predicted_rating))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic() {
        let vars = PromptVars::new().insert("name", "Alice");
        let result = render("Hello {name}, process {input}", "data", &vars);
        assert_eq!(result, "Hello Alice, process data");
    }

    #[test]
    fn test_render_escaped_braces() {
        let vars = PromptVars::new();
        let result = render("Output format: {{\"result\": {{\"value\": 42}}}}", "data", &vars);
        assert_eq!(result, r#"Output format: {"result": {"value": 42}}"#);
    }

    #[test]
    fn test_render_does_not_expand_placeholders_inside_input() {
        let vars = PromptVars::new().insert("rating", "5");
        let result = render("{input} / {rating}", "I typed {rating} here", &vars);
        assert_eq!(result, "I typed {rating} here / 5");
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("v1".parse::<PromptVariant>(), Ok(PromptVariant::Baseline));
        assert_eq!("Criteria-Based".parse::<PromptVariant>(), Ok(PromptVariant::CriteriaBased));
        assert_eq!("cot".parse::<PromptVariant>(), Ok(PromptVariant::ChainOfThought));
        assert!("v9".parse::<PromptVariant>().is_err());
    }

    #[test]
    fn test_unknown_variant_falls_back_to_chain_of_thought() {
        assert_eq!(PromptVariant::from_name("v9"), PromptVariant::ChainOfThought);
        assert_eq!(PromptVariant::from_name(""), PromptVariant::ChainOfThought);
    }

    #[test]
    fn test_rating_prompts_demand_strict_json() {
        for variant in PromptVariant::ALL {
            let prompt = build(variant, "The soup was cold.", None);
            assert!(prompt.contains("\"The soup was cold.\""));
            assert!(prompt.contains(r#"{"predicted_stars": <1-5>, "explanation": "<brief reason>"}"#));
            assert!(!prompt.contains("{{"));
        }
    }

    #[test]
    fn test_criteria_prompt_embeds_examples() {
        let prompt = build(PromptVariant::CriteriaBased, "ok", None);
        assert!(prompt.contains("EXAMPLES:"));
        assert!(prompt.contains(r#"{"predicted_stars": 1, "explanation": "Severe complaints"}"#));
        assert!(!build(PromptVariant::Baseline, "ok", None).contains("EXAMPLES:"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = build(PromptVariant::ChainOfThought, "Nice place", None);
        let b = build(PromptVariant::ChainOfThought, "Nice place", None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_insights_prompt_uses_context() {
        let ctx = ReviewContext {
            user_rating: Stars::new(2),
            predicted_rating: Stars::new(3),
        };
        let prompt = build(PromptVariant::Baseline, "Rude staff.", Some(&ctx));
        assert!(prompt.contains("User Rating: 2 stars"));
        assert!(prompt.contains("AI Predicted: 3 stars"));
        assert!(prompt.contains("\"sentiment\": \"Positive\""));
        assert!(prompt.contains("Positive, Negative, or Mixed"));
    }

    #[test]
    fn test_insights_prompt_unknown_prediction() {
        let ctx = ReviewContext {
            user_rating: Stars::new(4),
            predicted_rating: None,
        };
        let prompt = build(PromptVariant::default(), "Fine.", Some(&ctx));
        assert!(prompt.contains("AI Predicted: unknown stars"));
    }

    #[test]
    fn test_reply_prompt() {
        let prompt = build_reply("Loved it", Stars::new(5).unwrap());
        assert!(prompt.contains("Rating: 5 stars"));
        assert!(prompt.contains("not in JSON"));
    }
}
