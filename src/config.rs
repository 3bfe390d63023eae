// src/config.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::profanity::ProfanityDetector;
use crate::retry::RetryConfig;

pub const ENV_CONFIG_PATH: &str = "REVIEW_ANALYZER_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/analyzer.toml";
pub const DEFAULT_JSON_PATH: &str = "config/analyzer.json";

// Logical resource names resolved through `parameters`.
pub const PARAM_INPUT_BUCKET: &str = "bucket/input";
pub const PARAM_PROCESSED_BUCKET: &str = "bucket/processed";
pub const PARAM_REVIEW_TABLE: &str = "table/review_metadata";
pub const PARAM_STATS_TABLE: &str = "table/customer_stats";

/// How `CustomerStats.unpoliteCount` is incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterStrategy {
    /// Store-side add-and-return.
    #[default]
    Atomic,
    /// Read, then write conditioned on the unchanged version; retried on conflict.
    Optimistic,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// A customer is banned once their profane count exceeds this.
    pub ban_threshold: u32,
    pub invocation_timeout_ms: u64,
    pub counter_strategy: CounterStrategy,
    pub retry: RetryConfig,
    pub parameters: BTreeMap<String, String>,
    pub extra_blocklist: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            ban_threshold: 3,
            invocation_timeout_ms: 30_000,
            counter_strategy: CounterStrategy::Atomic,
            retry: RetryConfig::default(),
            parameters: BTreeMap::new(),
            extra_blocklist: Vec::new(),
        }
    }
}

impl AnalyzerConfig {
    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_millis(self.invocation_timeout_ms)
    }

    /// Profanity detector over the built-in list plus `extra_blocklist`.
    pub fn profanity_detector(&self) -> ProfanityDetector {
        ProfanityDetector::with_extra_terms(&self.extra_blocklist)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.invocation_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "invocation_timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::Invalid {
                field: "retry.initial_backoff_ms",
                reason: format!(
                    "{} exceeds retry.max_backoff_ms {}",
                    self.retry.initial_backoff_ms, self.retry.max_backoff_ms
                ),
            });
        }
        Ok(self)
    }
}

/// Load configuration from an explicit path. TOML or JSON, chosen by extension.
pub fn load_config_from(path: &Path) -> Result<AnalyzerConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading analyzer config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg: AnalyzerConfig = match ext.as_str() {
        "toml" => toml::from_str(&content)
            .with_context(|| format!("parsing TOML config {}", path.display()))?,
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("parsing JSON config {}", path.display()))?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string()).into()),
    };
    Ok(cfg.validate()?)
}

/// Load configuration using env var + fallbacks:
/// 1) $REVIEW_ANALYZER_CONFIG
/// 2) config/analyzer.toml
/// 3) config/analyzer.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<AnalyzerConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(&p);
        if !pb.exists() {
            return Err(ConfigError::MissingPath(p).into());
        }
        return load_config_from(&pb);
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return load_config_from(&pb);
        }
    }
    Ok(AnalyzerConfig::default())
}

/// Physical bucket / table names for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub input_bucket: String,
    pub processed_bucket: String,
    pub review_table: String,
    pub stats_table: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            input_bucket: "reviews-input".into(),
            processed_bucket: "reviews-processed".into(),
            review_table: "review-metadata".into(),
            stats_table: "customer-stats".into(),
        }
    }
}

impl ResourceNames {
    /// Constant lookup of the logical names in `cfg.parameters`; unknown names keep defaults.
    pub fn resolve(cfg: &AnalyzerConfig) -> Self {
        let d = Self::default();
        let lookup = |name: &str, fallback: String| {
            cfg.parameters
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or(fallback)
        };
        Self {
            input_bucket: lookup(PARAM_INPUT_BUCKET, d.input_bucket),
            processed_bucket: lookup(PARAM_PROCESSED_BUCKET, d.processed_bucket),
            review_table: lookup(PARAM_REVIEW_TABLE, d.review_table),
            stats_table: lookup(PARAM_STATS_TABLE, d.stats_table),
        }
    }
}
