// src/stages/mod.rs
//! Stage entry points. Each invocation receives a batch of object keys, handles
//! them one after another and reports every record's fate under its key.

pub mod preprocess;
pub mod profanity;
pub mod sentiment;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::ResourceNames;
use crate::error::AnalyzerError;
use crate::metrics::{record_batch_duration, record_outcome};
use crate::profanity::ProfanityDetector;
use crate::reputation::ReputationAggregator;
use crate::sentiment::SentimentAnalyzer;
use crate::store::BlobStore;

pub use preprocess::PreprocessStage;
pub use profanity::ProfanityStage;
pub use sentiment::SentimentStage;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Trigger payload: `{"records":[{"objectKey":"..."}]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub object_key: String,
}

impl EventBatch {
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: keys
                .into_iter()
                .map(|k| EventRecord {
                    object_key: k.into(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Processed,
    /// The idempotency guard matched; nothing was written.
    Duplicate,
}

/// Collaborators shared by all stages of one deployment.
#[derive(Clone)]
pub struct StageContext {
    pub blobs: Arc<dyn BlobStore>,
    pub names: ResourceNames,
    pub aggregator: Arc<ReputationAggregator>,
    pub profanity: Arc<ProfanityDetector>,
    pub sentiment: SentimentAnalyzer,
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Handle one object key.
    async fn process(&self, object_key: &str) -> Result<RecordOutcome, AnalyzerError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
    pub object_key: String,
    pub kind: &'static str,
    pub retryable: bool,
    pub message: String,
}

impl RecordFailure {
    fn new(object_key: &str, err: &AnalyzerError) -> Self {
        Self {
            object_key: object_key.to_string(),
            kind: err.kind(),
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

/// Per-key result of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub stage: &'static str,
    pub processed: Vec<String>,
    pub duplicates: Vec<String>,
    /// Malformed reviews, logged and dropped.
    pub skipped: Vec<String>,
    pub failures: Vec<RecordFailure>,
}

impl BatchReport {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Self::default()
        }
    }

    /// True when some record should be redelivered.
    pub fn needs_redelivery(&self) -> bool {
        self.failures.iter().any(|f| f.retryable)
    }
}

/// Run a batch sequentially within `budget`. One record's failure never stops
/// the rest; once the budget is spent, the in-flight and remaining records are
/// reported as timeouts and writes already made stand.
pub async fn run_batch(stage: &dyn Stage, batch: &EventBatch, budget: Duration) -> BatchReport {
    let stage_name = stage.name();
    let started = Instant::now();
    let deadline = tokio::time::Instant::now() + budget;
    let mut report = BatchReport::new(stage_name);

    let mut records = batch.records.iter();
    while let Some(rec) = records.next() {
        let key = rec.object_key.as_str();
        match tokio::time::timeout_at(deadline, stage.process(key)).await {
            Ok(Ok(RecordOutcome::Processed)) => {
                debug!(stage = stage_name, object_key = key, "processed");
                record_outcome(stage_name, "processed");
                report.processed.push(key.to_string());
            }
            Ok(Ok(RecordOutcome::Duplicate)) => {
                debug!(stage = stage_name, object_key = key, "duplicate delivery");
                record_outcome(stage_name, "duplicate");
                report.duplicates.push(key.to_string());
            }
            Ok(Err(AnalyzerError::MalformedReview(reason))) => {
                warn!(stage = stage_name, object_key = key, %reason, "skipping malformed review");
                record_outcome(stage_name, "skipped");
                report.skipped.push(key.to_string());
            }
            Ok(Err(e)) => {
                error!(
                    stage = stage_name,
                    object_key = key,
                    kind = e.kind(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "record failed"
                );
                record_outcome(stage_name, e.kind());
                report.failures.push(RecordFailure::new(key, &e));
            }
            Err(_elapsed) => {
                let timeout = AnalyzerError::Timeout;
                let remaining: Vec<&str> = std::iter::once(key)
                    .chain(records.by_ref().map(|r| r.object_key.as_str()))
                    .collect();
                warn!(
                    stage = stage_name,
                    object_key = key,
                    unprocessed = remaining.len(),
                    "invocation budget elapsed"
                );
                for k in remaining {
                    record_outcome(stage_name, timeout.kind());
                    report.failures.push(RecordFailure::new(k, &timeout));
                }
                break;
            }
        }
    }

    let elapsed = started.elapsed();
    record_batch_duration(stage_name, elapsed);
    info!(
        stage = stage_name,
        records = batch.records.len(),
        processed = report.processed.len(),
        duplicates = report.duplicates.len(),
        skipped = report.skipped.len(),
        failed = report.failures.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "batch complete"
    );
    report
}

/// Short anonymized identifier for a text, safe to log.
pub(crate) fn text_fingerprint(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted stage: outcome chosen by key prefix.
    struct Scripted {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Stage for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn process(&self, object_key: &str) -> Result<RecordOutcome, AnalyzerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match object_key.split('_').next() {
                Some("dup") => Ok(RecordOutcome::Duplicate),
                Some("bad") => Err(AnalyzerError::MalformedReview("no ids".into())),
                Some("gone") => Err(AnalyzerError::BlobNotFound {
                    bucket: "in".into(),
                    key: object_key.into(),
                }),
                Some("slow") => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(RecordOutcome::Processed)
                }
                _ => Ok(RecordOutcome::Processed),
            }
        }
    }

    #[tokio::test]
    async fn one_bad_record_does_not_abort_the_batch() {
        let stage = Scripted {
            calls: AtomicUsize::new(0),
        };
        let batch = EventBatch::from_keys(["ok_1", "bad_1", "gone_1", "dup_1", "ok_2"]);
        let report = run_batch(&stage, &batch, Duration::from_secs(5)).await;
        assert_eq!(report.processed, vec!["ok_1", "ok_2"]);
        assert_eq!(report.duplicates, vec!["dup_1"]);
        assert_eq!(report.skipped, vec!["bad_1"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].object_key, "gone_1");
        assert_eq!(report.failures[0].kind, "blob_not_found");
        assert!(!report.needs_redelivery());
        assert_eq!(stage.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_fails_the_rest_as_timeouts() {
        let stage = Scripted {
            calls: AtomicUsize::new(0),
        };
        let batch = EventBatch::from_keys(["ok_1", "slow_1", "ok_2", "ok_3"]);
        let report = run_batch(&stage, &batch, Duration::from_secs(1)).await;
        assert_eq!(report.processed, vec!["ok_1"]);
        let timed_out: Vec<&str> = report
            .failures
            .iter()
            .map(|f| f.object_key.as_str())
            .collect();
        assert_eq!(timed_out, vec!["slow_1", "ok_2", "ok_3"]);
        assert!(report.failures.iter().all(|f| f.kind == "timeout" && f.retryable));
        assert!(report.needs_redelivery());
        assert_eq!(stage.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn event_batch_wire_format() {
        let b: EventBatch =
            serde_json::from_str(r#"{"records":[{"objectKey":"review_1.json"}]}"#).unwrap();
        assert_eq!(b, EventBatch::from_keys(["review_1.json"]));
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        let a = text_fingerprint("this product sucks");
        assert_eq!(a.len(), 12);
        assert_eq!(a, text_fingerprint("this product sucks"));
        assert_ne!(a, text_fingerprint("this product rocks"));
    }
}
