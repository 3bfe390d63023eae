// src/retry.rs
//! Bounded exponential backoff for record-store write conflicts.
//!
//! Only `StoreError::Conflict` is retried here. Unavailability is left to the
//! trigger's redelivery, and every other error is returned on first sight.

use backoff::ExponentialBackoffBuilder;
use metrics::counter;
use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::error::{AnalyzerError, StoreError};
use crate::metrics::CONFLICT_RETRIES_TOTAL;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 25,
            max_backoff_ms: 1_000,
        }
    }
}

/// Run `op`, retrying conflicts with jittered exponential backoff.
/// Exhausting the budget surfaces `AnalyzerError::RecordStoreConflict`.
pub async fn retry_on_conflict<T, F, Fut>(
    cfg: &RetryConfig,
    what: &str,
    op: F,
) -> Result<T, AnalyzerError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(cfg.initial_backoff_ms.max(1)))
        .with_max_interval(Duration::from_millis(cfg.max_backoff_ms.max(1)))
        .with_max_elapsed_time(None)
        .build();

    let attempts = AtomicU32::new(0);
    let max_retries = cfg.max_retries;
    let attempts_ref = &attempts;
    let op_ref = &op;

    let result = backoff::future::retry(policy, move || async move {
        let n = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
        match op_ref().await {
            Ok(v) => Ok(v),
            Err(StoreError::Conflict(detail)) if n <= max_retries => {
                counter!(CONFLICT_RETRIES_TOTAL).increment(1);
                debug!(what, attempt = n, %detail, "record store conflict, backing off");
                Err(backoff::Error::transient(StoreError::Conflict(detail)))
            }
            Err(e) => Err(backoff::Error::permanent(e)),
        }
    })
    .await;

    result.map_err(|e| match e {
        StoreError::Conflict(detail) => AnalyzerError::RecordStoreConflict {
            attempts: attempts.load(Ordering::SeqCst),
            detail,
        },
        other => other.into(),
    })
}
