// src/stages/sentiment.rs
use async_trait::async_trait;
use tracing::debug;

use super::{RecordOutcome, Stage, StageContext};
use crate::error::AnalyzerError;
use crate::model::NormalizedReview;
use crate::reputation::SentimentOutcome;

pub struct SentimentStage {
    ctx: StageContext,
}

impl SentimentStage {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Stage for SentimentStage {
    fn name(&self) -> &'static str {
        "sentiment"
    }

    async fn process(&self, object_key: &str) -> Result<RecordOutcome, AnalyzerError> {
        let bytes = self
            .ctx
            .blobs
            .get(&self.ctx.names.processed_bucket, object_key)
            .await?;
        let review = NormalizedReview::from_slice(&bytes)?;
        let key = review.review.validate()?;

        // validate() guarantees at least one of the two
        let text = review
            .review
            .review_text
            .as_deref()
            .or(review.review.summary.as_deref())
            .unwrap_or_default();
        let score = self.ctx.sentiment.score_text(text);

        match self
            .ctx
            .aggregator
            .record_sentiment(&key.customer_id, &key.review_id, score)
            .await?
        {
            SentimentOutcome::Duplicate => Ok(RecordOutcome::Duplicate),
            SentimentOutcome::Recorded { score, label } => {
                debug!(
                    stage = self.name(),
                    object_key,
                    customer_id = %key.customer_id,
                    score,
                    label = label.as_str(),
                    "sentiment recorded"
                );
                Ok(RecordOutcome::Processed)
            }
        }
    }
}
