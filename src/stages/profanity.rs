// src/stages/profanity.rs
use async_trait::async_trait;
use tracing::debug;

use super::{text_fingerprint, RecordOutcome, Stage, StageContext};
use crate::error::AnalyzerError;
use crate::model::NormalizedReview;
use crate::profanity::ProfanityDetector;
use crate::reputation::ProfanityOutcome;

/// Flags a normalized review and feeds the customer's reputation counter.
pub struct ProfanityStage {
    ctx: StageContext,
}

impl ProfanityStage {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }
}

/// A review is profane if either text field matches. Cleaned tokens are used
/// when present; a blob without them falls back to the raw field.
pub fn review_is_profane(detector: &ProfanityDetector, review: &NormalizedReview) -> bool {
    let field = |clean: &Option<Vec<String>>, raw: &Option<String>| match (clean, raw) {
        (Some(tokens), _) => detector.is_profane(tokens),
        (None, Some(text)) => detector.is_profane_raw(text),
        (None, None) => false,
    };
    field(&review.summary_clean, &review.review.summary)
        || field(&review.review_text_clean, &review.review.review_text)
}

#[async_trait]
impl Stage for ProfanityStage {
    fn name(&self) -> &'static str {
        "profanity"
    }

    async fn process(&self, object_key: &str) -> Result<RecordOutcome, AnalyzerError> {
        let bytes = self
            .ctx
            .blobs
            .get(&self.ctx.names.processed_bucket, object_key)
            .await?;
        let review = NormalizedReview::from_slice(&bytes)?;
        let key = review.review.validate()?;

        let is_profane = review_is_profane(&self.ctx.profanity, &review);
        if is_profane {
            let text = review.review.review_text.as_deref().unwrap_or_default();
            debug!(
                stage = self.name(),
                object_key,
                customer_id = %key.customer_id,
                text = %text_fingerprint(text),
                "profane review"
            );
        }

        match self
            .ctx
            .aggregator
            .record_profanity(&key.customer_id, &key.review_id, is_profane)
            .await?
        {
            ProfanityOutcome::Duplicate => Ok(RecordOutcome::Duplicate),
            ProfanityOutcome::Recorded { .. } => Ok(RecordOutcome::Processed),
        }
    }
}
