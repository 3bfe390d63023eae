// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod profanity;
pub mod report;
pub mod reputation;
pub mod retry;
pub mod sentiment;
pub mod stages;
pub mod store;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub use crate::config::{AnalyzerConfig, CounterStrategy, ResourceNames};
pub use crate::error::{AnalyzerError, StoreError};
pub use crate::normalize::normalize;
pub use crate::pipeline::{LocalPipeline, StageKind};
pub use crate::profanity::{is_profane, ProfanityDetector};
pub use crate::reputation::ReputationAggregator;
pub use crate::sentiment::score;

pub const ENV_DATA_DIR: &str = "REVIEW_ANALYZER_DATA_DIR";

/// Pipeline over an in-memory record store; blobs on disk under
/// `$REVIEW_ANALYZER_DATA_DIR` when set, otherwise in memory.
pub fn pipeline_from_env(cfg: &AnalyzerConfig) -> LocalPipeline {
    let records = Arc::new(store::MemoryRecordStore::new());
    match std::env::var(ENV_DATA_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let root = PathBuf::from(dir);
            info!(root = %root.display(), "file-system blob store");
            LocalPipeline::new(Arc::new(store::FsBlobStore::new(root)), records, cfg)
        }
        _ => LocalPipeline::new(Arc::new(store::MemoryBlobStore::new()), records, cfg),
    }
}

/// Full application router: config lookup, stores, metrics.
pub async fn app() -> Result<axum::Router> {
    let cfg = config::load_config_default()?;
    let metrics = metrics::Metrics::init()?;
    let state = api::AppState::new(pipeline_from_env(&cfg));
    Ok(api::router(state, Some(&metrics)))
}
