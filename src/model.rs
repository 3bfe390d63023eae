// src/model.rs
//! Review blobs and the two derived record types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AnalyzerError;
use crate::normalize::normalize;
use crate::sentiment::SentimentLabel;
use crate::store::{AttrValue, Record, RecordKey};

// Record attribute names.
pub const CUSTOMER_ID: &str = "customerId";
pub const REVIEW_ID: &str = "reviewId";
pub const IS_UNPOLITE: &str = "isUnpolite";
pub const SENTIMENT: &str = "sentiment";
pub const SENTIMENT_LABEL: &str = "sentimentLabel";
pub const UNPOLITE_COUNT: &str = "unpoliteCount";
pub const BANNED: &str = "banned";

/// Stats attribute marking one review as already counted.
pub fn counted_marker(review_id: &str) -> String {
    format!("counted#{review_id}")
}

/// Raw review as produced upstream. Unknown fields are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "customerId", alias = "reviewerID", default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(rename = "reviewId", default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "reviewText", default, skip_serializing_if = "Option::is_none")]
    pub review_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Identity of a review inside the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReviewKey {
    pub customer_id: String,
    pub review_id: String,
}

impl ReviewKey {
    pub fn record_key(&self) -> RecordKey {
        RecordKey::composite(&self.customer_id, &self.review_id)
    }
}

impl Review {
    pub fn new(customer_id: &str, review_id: &str, summary: &str, review_text: &str) -> Self {
        Self {
            customer_id: Some(customer_id.to_string()),
            review_id: Some(review_id.to_string()),
            summary: Some(summary.to_string()),
            review_text: Some(review_text.to_string()),
            ..Self::default()
        }
    }

    /// Check the required fields; returns the record-store identity.
    pub fn validate(&self) -> Result<ReviewKey, AnalyzerError> {
        let customer_id = non_empty(&self.customer_id)
            .ok_or_else(|| AnalyzerError::MalformedReview("missing customerId".into()))?;
        let review_id = non_empty(&self.review_id)
            .ok_or_else(|| AnalyzerError::MalformedReview("missing reviewId".into()))?;
        if self.summary.is_none() && self.review_text.is_none() {
            return Err(AnalyzerError::MalformedReview(
                "neither summary nor reviewText present".into(),
            ));
        }
        Ok(ReviewKey {
            customer_id: customer_id.to_string(),
            review_id: review_id.to_string(),
        })
    }

    /// Parse a JSON blob; anything that is not a review object is malformed.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AnalyzerError> {
        serde_json::from_slice(bytes)
            .map_err(|e| AnalyzerError::MalformedReview(format!("invalid review JSON: {e}")))
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Review plus the Normalizer's token sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReview {
    #[serde(flatten)]
    pub review: Review,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_clean: Option<Vec<String>>,
    #[serde(rename = "reviewText_clean", default, skip_serializing_if = "Option::is_none")]
    pub review_text_clean: Option<Vec<String>>,
}

impl NormalizedReview {
    /// Normalize every text field that is present.
    pub fn from_review(review: Review) -> Self {
        let summary_clean = review.summary.as_deref().map(normalize);
        let review_text_clean = review.review_text.as_deref().map(normalize);
        Self {
            review,
            summary_clean,
            review_text_clean,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AnalyzerError> {
        serde_json::from_slice(bytes)
            .map_err(|e| AnalyzerError::MalformedReview(format!("invalid review JSON: {e}")))
    }
}

/// Per-review analysis results. Fields stay `None` until their stage has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMetadata {
    pub customer_id: String,
    pub review_id: String,
    pub is_unpolite: Option<bool>,
    pub sentiment: Option<f64>,
    pub sentiment_label: Option<SentimentLabel>,
}

impl ReviewMetadata {
    pub fn from_record(key: &ReviewKey, rec: &Record) -> Self {
        let sentiment_label = rec.get_str(SENTIMENT_LABEL).and_then(|s| match s {
            "positive" => Some(SentimentLabel::Positive),
            "neutral" => Some(SentimentLabel::Neutral),
            "negative" => Some(SentimentLabel::Negative),
            _ => None,
        });
        Self {
            customer_id: key.customer_id.clone(),
            review_id: key.review_id.clone(),
            is_unpolite: rec.get_bool(IS_UNPOLITE),
            sentiment: rec.get_float(SENTIMENT),
            sentiment_label,
        }
    }

    /// Both stages have written their fields.
    pub fn is_fully_processed(&self) -> bool {
        self.is_unpolite.is_some() && self.sentiment.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub customer_id: String,
    pub unpolite_count: u64,
    pub banned: bool,
}

impl CustomerStats {
    pub fn from_record(customer_id: &str, rec: &Record) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            unpolite_count: rec.get_int(UNPOLITE_COUNT).unwrap_or(0).max(0) as u64,
            banned: rec.get_bool(BANNED).unwrap_or(false),
        }
    }
}

pub(crate) fn str_attr(s: &str) -> AttrValue {
    AttrValue::Str(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_ids_and_some_text() {
        let ok = Review::new("c1", "r1", "Nice", "Works well");
        assert_eq!(ok.validate().unwrap().review_id, "r1");

        let mut no_id = ok.clone();
        no_id.review_id = Some("  ".into());
        assert!(matches!(no_id.validate(), Err(AnalyzerError::MalformedReview(_))));

        let mut no_text = ok.clone();
        no_text.summary = None;
        no_text.review_text = None;
        assert!(no_text.validate().is_err());
    }

    #[test]
    fn legacy_reviewer_id_and_extra_fields_survive() {
        let raw = br#"{"reviewerID":"A1","reviewId":"r9","reviewText":"ok","asin":"B00X"}"#;
        let r = Review::from_slice(raw).unwrap();
        assert_eq!(r.customer_id.as_deref(), Some("A1"));
        assert_eq!(r.extra.get("asin"), Some(&Value::from("B00X")));
    }

    #[test]
    fn normalized_review_serializes_clean_fields() {
        let n = NormalizedReview::from_review(Review::new("c", "r", "Great!", "It works."));
        let v: Value = serde_json::to_value(&n).unwrap();
        assert_eq!(v["summary_clean"], serde_json::json!(["great"]));
        assert_eq!(v["reviewText_clean"], serde_json::json!(["work"]));
        assert_eq!(v["customerId"], "c");
    }

    #[test]
    fn non_object_blob_is_malformed() {
        assert!(matches!(
            Review::from_slice(b"[1,2,3]"),
            Err(AnalyzerError::MalformedReview(_))
        ));
    }
}
