//! Repair extracted fields into the caller-facing contract.
//!
//! Everything except the predicted rating has a safe synthetic default
//! conditioned on the user's rating. A missing or out-of-range predicted
//! rating is [`ReviewError::RatingUnavailable`]; it is never invented.

use crate::error::{Result, ReviewError};
use crate::types::{
    AnalysisResult, ExtractedFields, Insights, Sentiment, Stars, ACTION_COUNT, MIN_SUMMARY_CHARS,
};

/// Explanation used when the model gave a rating without one.
pub const NEUTRAL_EXPLANATION: &str = "The model did not explain its rating.";

/// Last-resort recommendation once the canned ones are used up.
pub const FILLER_ACTION: &str = "Gather additional customer feedback for continuous improvement";

const POSITIVE_ACTIONS: [&str; ACTION_COUNT] = [
    "Continue maintaining the high standards that earned this positive review",
    "Share this positive feedback with the team to boost morale",
    "Identify and replicate the successful elements mentioned",
];

const NEGATIVE_ACTIONS: [&str; ACTION_COUNT] = [
    "Investigate the specific issues mentioned in this review immediately",
    "Follow up with the customer to address their concerns",
    "Implement corrective measures to prevent similar issues",
];

const MIXED_ACTIONS: [&str; ACTION_COUNT] = [
    "Analyze the mixed feedback to identify improvement areas",
    "Strengthen the positive aspects mentioned in the review",
    "Address the concerns raised to enhance customer satisfaction",
];

/// The three canned recommendations for a rating band.
pub fn canned_actions(band: Sentiment) -> [&'static str; ACTION_COUNT] {
    match band {
        Sentiment::Positive => POSITIVE_ACTIONS,
        Sentiment::Negative => NEGATIVE_ACTIONS,
        Sentiment::Mixed => MIXED_ACTIONS,
    }
}

/// Summary used when the model's is missing or too short.
pub fn fallback_summary(rating: Stars) -> String {
    match rating.band() {
        Sentiment::Positive => format!(
            "Customer had a positive {}-star experience with the restaurant. They appreciated various aspects of their visit.",
            rating
        ),
        Sentiment::Negative => format!(
            "Customer had a disappointing {}-star experience. Several issues affected their satisfaction.",
            rating
        ),
        Sentiment::Mixed => format!(
            "Customer had a mixed {}-star experience with both positive and negative aspects noted.",
            rating
        ),
    }
}

/// Normalize a full analysis.
///
/// Fails only when the predicted rating is missing or outside 1..=5.
///
/// # Example
///
/// ```
/// use review_insight::normalize::normalize;
/// use review_insight::types::{ExtractedFields, Sentiment, Stars};
///
/// let fields = ExtractedFields {
///     predicted_stars: Some(5),
///     sentiment: Some("Great!".into()),
///     actions: Some(vec!["a".into()]),
///     ..Default::default()
/// };
/// let result = normalize(&fields, Stars::new(5).unwrap()).unwrap();
/// assert_eq!(result.sentiment, Sentiment::Positive);
/// assert_eq!(result.actions[0], "a");
/// ```
pub fn normalize(extracted: &ExtractedFields, user_rating: Stars) -> Result<AnalysisResult> {
    let predicted_stars = extracted
        .predicted_stars
        .and_then(Stars::new)
        .ok_or_else(|| match extracted.predicted_stars {
            Some(out_of_range) => ReviewError::RatingUnavailable(format!(
                "model predicted {} stars, outside 1-5",
                out_of_range
            )),
            None => ReviewError::RatingUnavailable("model output contained no rating".into()),
        })?;

    let Insights {
        summary,
        actions,
        sentiment,
    } = normalize_insights(extracted, user_rating);

    Ok(AnalysisResult {
        predicted_stars,
        explanation: normalize_explanation(extracted.explanation.as_deref()),
        summary,
        actions,
        sentiment,
    })
}

/// Normalize the summary, actions and sentiment. Never fails.
pub fn normalize_insights(extracted: &ExtractedFields, user_rating: Stars) -> Insights {
    Insights {
        summary: normalize_summary(extracted.summary.as_deref(), user_rating),
        actions: normalize_actions(extracted.actions.as_deref().unwrap_or_default(), user_rating),
        sentiment: normalize_sentiment(extracted.sentiment.as_deref(), user_rating),
    }
}

/// A canonical sentiment passes; anything else is derived from the rating.
pub fn normalize_sentiment(raw: Option<&str>, user_rating: Stars) -> Sentiment {
    raw.and_then(Sentiment::parse_canonical)
        .unwrap_or_else(|| user_rating.band())
}

pub fn normalize_summary(raw: Option<&str>, user_rating: Stars) -> String {
    match raw.map(str::trim) {
        Some(summary) if summary.chars().count() >= MIN_SUMMARY_CHARS => summary.to_string(),
        _ => fallback_summary(user_rating),
    }
}

/// Exactly [`ACTION_COUNT`] actions, extracted ones first in their order.
pub fn normalize_actions(raw: &[String], user_rating: Stars) -> [String; ACTION_COUNT] {
    let mut actions: Vec<String> = raw
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .take(ACTION_COUNT)
        .map(str::to_string)
        .collect();

    for canned in canned_actions(user_rating.band()) {
        if actions.len() == ACTION_COUNT {
            break;
        }
        if !actions.iter().any(|a| a == canned) {
            actions.push(canned.to_string());
        }
    }
    actions.resize(ACTION_COUNT, FILLER_ACTION.to_string());

    let mut out: [String; ACTION_COUNT] = Default::default();
    for (slot, action) in out.iter_mut().zip(actions) {
        *slot = action;
    }
    out
}

/// Trimmed explanation, or [`NEUTRAL_EXPLANATION`] when blank.
pub fn normalize_explanation(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(explanation) if !explanation.is_empty() => explanation.to_string(),
        _ => NEUTRAL_EXPLANATION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_text;

    fn stars(n: i64) -> Stars {
        Stars::new(n).unwrap()
    }

    #[test]
    fn test_invalid_sentiment_derived_and_actions_padded() {
        let fields = ExtractedFields {
            predicted_stars: Some(5),
            sentiment: Some("Great!".into()),
            actions: Some(vec!["a".into()]),
            ..Default::default()
        };
        let result = normalize(&fields, stars(5)).unwrap();
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert_eq!(result.actions[0], "a");
        assert_eq!(result.actions[1], POSITIVE_ACTIONS[0]);
        assert_eq!(result.actions[2], POSITIVE_ACTIONS[1]);
        assert_eq!(result.explanation, NEUTRAL_EXPLANATION);
        assert!(result.summary.contains("5-star"));
    }

    #[test]
    fn test_error_output_yields_negative_defaults() {
        let fields = extract_text("ERROR: connection reset").into_fields();
        let insights = normalize_insights(&fields, stars(2));
        assert_eq!(insights.sentiment, Sentiment::Negative);
        assert_eq!(
            insights.summary,
            "Customer had a disappointing 2-star experience. Several issues affected their satisfaction."
        );
        assert_eq!(insights.actions, NEGATIVE_ACTIONS.map(String::from));
    }

    #[test]
    fn test_missing_rating_is_unavailable() {
        let fields = ExtractedFields {
            summary: Some("The customer had a wonderful evening.".into()),
            ..Default::default()
        };
        let err = normalize(&fields, stars(4)).unwrap_err();
        assert!(matches!(err, ReviewError::RatingUnavailable(_)));
    }

    #[test]
    fn test_out_of_range_rating_is_unavailable() {
        for bad in [0, 6, -1, 42] {
            let fields = ExtractedFields {
                predicted_stars: Some(bad),
                ..Default::default()
            };
            assert!(matches!(
                normalize(&fields, stars(3)),
                Err(ReviewError::RatingUnavailable(_))
            ));
        }
    }

    #[test]
    fn test_canonical_sentiment_passes_case_insensitive() {
        assert_eq!(normalize_sentiment(Some("Negative"), stars(5)), Sentiment::Negative);
        assert_eq!(normalize_sentiment(Some(" mixed"), stars(5)), Sentiment::Mixed);
        assert_eq!(normalize_sentiment(None, stars(3)), Sentiment::Mixed);
        assert_eq!(normalize_sentiment(Some(""), stars(1)), Sentiment::Negative);
    }

    #[test]
    fn test_short_summary_replaced() {
        assert_eq!(normalize_summary(Some("Too short"), stars(3)), fallback_summary(stars(3)));
        assert_eq!(
            normalize_summary(Some("  Loved the pasta, slow check.  "), stars(4)),
            "Loved the pasta, slow check."
        );
    }

    #[test]
    fn test_actions_always_three() {
        for n in 0..7 {
            let raw: Vec<String> = (0..n).map(|i| format!("action {}", i)).collect();
            let actions = normalize_actions(&raw, stars(3));
            assert_eq!(actions.len(), ACTION_COUNT);
            for (i, action) in raw.iter().take(ACTION_COUNT).enumerate() {
                assert_eq!(&actions[i], action);
            }
        }
    }

    #[test]
    fn test_actions_drop_blanks_and_skip_duplicates() {
        let raw = vec![
            "  ".to_string(),
            MIXED_ACTIONS[0].to_string(),
            String::new(),
        ];
        let actions = normalize_actions(&raw, stars(3));
        assert_eq!(
            actions,
            [
                MIXED_ACTIONS[0].to_string(),
                MIXED_ACTIONS[1].to_string(),
                MIXED_ACTIONS[2].to_string(),
            ]
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let fields = ExtractedFields {
            predicted_stars: Some(2),
            explanation: Some("Cold food".into()),
            summary: None,
            actions: Some(vec!["Reheat plates".into(), "Reheat plates".into()]),
            sentiment: Some("angry".into()),
        };
        let once = normalize(&fields, stars(2)).unwrap();
        let twice = normalize(&ExtractedFields::from(&once), stars(2)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_all_bands_have_distinct_canned_actions() {
        for band in [Sentiment::Positive, Sentiment::Negative, Sentiment::Mixed] {
            let canned = canned_actions(band);
            assert_ne!(canned[0], canned[1]);
            assert_ne!(canned[1], canned[2]);
            assert!(!canned.contains(&FILLER_ACTION));
        }
    }
}
