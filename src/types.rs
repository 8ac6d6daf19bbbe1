//! Domain types shared by the extraction pipeline, the service and the API.

use crate::error::{Result, ReviewError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum review length in characters, after trimming.
pub const MIN_REVIEW_CHARS: usize = 10;
/// Maximum review length in characters, after trimming.
pub const MAX_REVIEW_CHARS: usize = 1000;
/// Number of recommended actions in every normalized result.
pub const ACTION_COUNT: usize = 3;
/// Shortest summary accepted from the model.
pub const MIN_SUMMARY_CHARS: usize = 20;

/// A star rating, guaranteed to be within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Stars(u8);

impl Stars {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Validate a raw rating.
    pub fn new(value: i64) -> Option<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// The sentiment band a rating falls into: ≥4 positive, ≤2 negative.
    pub fn band(self) -> Sentiment {
        match self.0 {
            4..=5 => Sentiment::Positive,
            1..=2 => Sentiment::Negative,
            _ => Sentiment::Mixed,
        }
    }
}

impl TryFrom<i64> for Stars {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        Stars::new(value).ok_or_else(|| format!("rating {} outside 1-5", value))
    }
}

impl From<Stars> for u8 {
    fn from(stars: Stars) -> Self {
        stars.0
    }
}

impl fmt::Display for Stars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Three-way sentiment band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Mixed,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Mixed => "Mixed",
        }
    }

    /// Match one of the canonical names, ignoring case and surrounding space.
    pub fn parse_canonical(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        [Sentiment::Positive, Sentiment::Negative, Sentiment::Mixed]
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields recovered from one model response.
///
/// Every field is optional because extraction may fail partially. Nothing in
/// here is synthesized: it holds exactly what the response contained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub predicted_stars: Option<i64>,
    pub explanation: Option<String>,
    pub summary: Option<String>,
    pub actions: Option<Vec<String>>,
    pub sentiment: Option<String>,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.predicted_stars.is_none()
            && self.explanation.is_none()
            && self.summary.is_none()
            && self.actions.is_none()
            && self.sentiment.is_none()
    }

    /// Combine the rating fields of one call with the insight fields of another.
    pub fn with_rating_from(mut self, rating: &ExtractedFields) -> Self {
        self.predicted_stars = rating.predicted_stars;
        self.explanation = rating.explanation.clone();
        self
    }
}

impl From<&AnalysisResult> for ExtractedFields {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            predicted_stars: Some(result.predicted_stars.get() as i64),
            explanation: Some(result.explanation.clone()),
            summary: Some(result.summary.clone()),
            actions: Some(result.actions.to_vec()),
            sentiment: Some(result.sentiment.as_str().to_string()),
        }
    }
}

/// Summary, recommended actions and sentiment after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub summary: String,
    pub actions: [String; ACTION_COUNT],
    pub sentiment: Sentiment,
}

/// The fully normalized, caller-facing analysis of a review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub predicted_stars: Stars,
    pub explanation: String,
    pub summary: String,
    pub actions: [String; ACTION_COUNT],
    pub sentiment: Sentiment,
}

/// A rating prediction from one prompt variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPrediction {
    pub predicted_stars: Stars,
    pub explanation: String,
    /// Raw fields the prediction came from, for combining with insights.
    #[serde(skip)]
    pub fields: ExtractedFields,
}

/// A review as submitted by a user, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSubmission {
    pub rating: i64,
    pub review_text: String,
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidReview {
    pub rating: Stars,
    pub review_text: String,
}

impl ReviewSubmission {
    /// Trim the text and enforce rating and length bounds.
    pub fn validate(&self) -> Result<ValidReview> {
        let rating = Stars::new(self.rating).ok_or_else(|| {
            ReviewError::InvalidInput(format!("rating must be 1-5, got {}", self.rating))
        })?;
        let review_text = validate_review_text(&self.review_text)?;
        Ok(ValidReview {
            rating,
            review_text,
        })
    }
}

/// Trim review text and enforce the length bounds.
pub fn validate_review_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if len < MIN_REVIEW_CHARS {
        return Err(ReviewError::InvalidInput(format!(
            "review text must be at least {} characters, got {}",
            MIN_REVIEW_CHARS, len
        )));
    }
    if len > MAX_REVIEW_CHARS {
        return Err(ReviewError::InvalidInput(format!(
            "review text must be at most {} characters, got {}",
            MAX_REVIEW_CHARS, len
        )));
    }
    Ok(trimmed.to_string())
}
