// src/stages/preprocess.rs
use async_trait::async_trait;
use tracing::debug;

use super::{RecordOutcome, Stage, StageContext, JSON_CONTENT_TYPE};
use crate::error::AnalyzerError;
use crate::model::{NormalizedReview, Review};

/// Reads a raw review from the input bucket and writes the normalized copy,
/// under the same key, to the processed bucket.
pub struct PreprocessStage {
    ctx: StageContext,
}

impl PreprocessStage {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Stage for PreprocessStage {
    fn name(&self) -> &'static str {
        "preprocess"
    }

    async fn process(&self, object_key: &str) -> Result<RecordOutcome, AnalyzerError> {
        let names = &self.ctx.names;
        let bytes = self.ctx.blobs.get(&names.input_bucket, object_key).await?;
        let review = Review::from_slice(&bytes)?;
        let key = review.validate()?;

        let normalized = NormalizedReview::from_review(review);
        debug!(
            stage = self.name(),
            object_key,
            customer_id = %key.customer_id,
            review_id = %key.review_id,
            summary_tokens = normalized.summary_clean.as_ref().map_or(0, Vec::len),
            text_tokens = normalized.review_text_clean.as_ref().map_or(0, Vec::len),
            "normalized"
        );
        let body = serde_json::to_vec(&normalized)?;
        // Same input, same output: a redelivered event just rewrites identical bytes.
        self.ctx
            .blobs
            .put(&names.processed_bucket, object_key, body, JSON_CONTENT_TYPE)
            .await?;
        Ok(RecordOutcome::Processed)
    }
}
