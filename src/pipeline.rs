// src/pipeline.rs
//! In-process event routing: stands in for the bucket notifications that drive
//! the stages in a deployed system.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{AnalyzerConfig, ResourceNames};
use crate::error::AnalyzerError;
use crate::model::{CustomerStats, Review, ReviewMetadata};
use crate::reputation::ReputationAggregator;
use crate::sentiment::SentimentAnalyzer;
use crate::stages::{
    run_batch, BatchReport, EventBatch, PreprocessStage, ProfanityStage, SentimentStage, Stage,
    StageContext, JSON_CONTENT_TYPE,
};
use crate::store::{BlobStore, MemoryBlobStore, MemoryRecordStore, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Preprocess,
    Profanity,
    Sentiment,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Preprocess => "preprocess",
            StageKind::Profanity => "profanity",
            StageKind::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preprocess" => Ok(StageKind::Preprocess),
            "profanity" => Ok(StageKind::Profanity),
            "sentiment" => Ok(StageKind::Sentiment),
            other => Err(format!("unknown stage '{other}'")),
        }
    }
}

/// Result of pushing one review through every stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub object_key: String,
    pub reports: Vec<BatchReport>,
    pub metadata: Option<ReviewMetadata>,
    pub customer: Option<CustomerStats>,
}

pub struct LocalPipeline {
    blobs: Arc<dyn BlobStore>,
    names: ResourceNames,
    aggregator: Arc<ReputationAggregator>,
    budget: Duration,
    preprocess: PreprocessStage,
    profanity: ProfanityStage,
    sentiment: SentimentStage,
}

impl LocalPipeline {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        cfg: &AnalyzerConfig,
    ) -> Self {
        let names = ResourceNames::resolve(cfg);
        let aggregator = Arc::new(ReputationAggregator::new(records, &names, cfg));
        let ctx = StageContext {
            blobs: blobs.clone(),
            names: names.clone(),
            aggregator: aggregator.clone(),
            profanity: Arc::new(cfg.profanity_detector()),
            sentiment: SentimentAnalyzer::new(),
        };
        Self {
            blobs,
            names,
            aggregator,
            budget: cfg.invocation_timeout(),
            preprocess: PreprocessStage::new(ctx.clone()),
            profanity: ProfanityStage::new(ctx.clone()),
            sentiment: SentimentStage::new(ctx),
        }
    }

    /// Both stores in memory.
    pub fn in_memory(cfg: &AnalyzerConfig) -> Self {
        Self::new(
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryRecordStore::new()),
            cfg,
        )
    }

    pub fn names(&self) -> &ResourceNames {
        &self.names
    }

    pub fn aggregator(&self) -> &ReputationAggregator {
        &self.aggregator
    }

    fn stage(&self, kind: StageKind) -> &dyn Stage {
        match kind {
            StageKind::Preprocess => &self.preprocess,
            StageKind::Profanity => &self.profanity,
            StageKind::Sentiment => &self.sentiment,
        }
    }

    /// Run one stage invocation over an event batch.
    pub async fn dispatch(&self, kind: StageKind, batch: &EventBatch) -> BatchReport {
        run_batch(self.stage(kind), batch, self.budget).await
    }

    /// Upload a review under a fresh `review_<uuid>.json` key and drive it through
    /// preprocess, then profanity and sentiment concurrently.
    pub async fn submit(&self, review: &Review) -> Result<Submission, AnalyzerError> {
        let object_key = format!("review_{}.json", uuid::Uuid::new_v4());
        let body = serde_json::to_vec(review)?;
        self.blobs
            .put(&self.names.input_bucket, &object_key, body, JSON_CONTENT_TYPE)
            .await?;

        let batch = EventBatch::from_keys([object_key.clone()]);
        let pre = self.dispatch(StageKind::Preprocess, &batch).await;
        let mut reports = vec![pre];
        if !reports[0].processed.is_empty() {
            let (prof, sent) = tokio::join!(
                self.dispatch(StageKind::Profanity, &batch),
                self.dispatch(StageKind::Sentiment, &batch)
            );
            reports.push(prof);
            reports.push(sent);
        }

        let (metadata, customer) = match review.validate() {
            Ok(key) => (
                self.aggregator
                    .review_metadata(&key.customer_id, &key.review_id)
                    .await?,
                self.aggregator.customer_stats(&key.customer_id).await?,
            ),
            Err(_) => (None, None),
        };
        info!(object_key = %object_key, stages = reports.len(), "review submitted");
        Ok(Submission {
            object_key,
            reports,
            metadata,
            customer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_parse() {
        assert_eq!("Profanity".parse::<StageKind>(), Ok(StageKind::Profanity));
        assert_eq!(StageKind::Sentiment.to_string(), "sentiment");
        assert!("ner".parse::<StageKind>().is_err());
    }

    #[tokio::test]
    async fn submit_runs_every_stage() {
        let p = LocalPipeline::in_memory(&AnalyzerConfig::default());
        let review = Review::new("c1", "r1", "Love it", "I really love this product.");
        let s = p.submit(&review).await.unwrap();
        assert!(s.object_key.starts_with("review_") && s.object_key.ends_with(".json"));
        assert_eq!(s.reports.len(), 3);
        let meta = s.metadata.unwrap();
        assert_eq!(meta.is_unpolite, Some(false));
        assert!(meta.sentiment.unwrap() > 0.0);
        assert!(meta.is_fully_processed());
        assert!(s.customer.is_none());
    }

    #[tokio::test]
    async fn malformed_review_stops_after_preprocess() {
        let p = LocalPipeline::in_memory(&AnalyzerConfig::default());
        let mut review = Review::new("c1", "r1", "x", "y");
        review.customer_id = None;
        let s = p.submit(&review).await.unwrap();
        assert_eq!(s.reports.len(), 1);
        assert_eq!(s.reports[0].skipped.len(), 1);
        assert!(s.metadata.is_none());
    }
}
