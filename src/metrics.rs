// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;

pub const STAGE_RECORDS_TOTAL: &str = "review_stage_records_total";
pub const PROFANE_TOTAL: &str = "review_profane_total";
pub const BANS_TOTAL: &str = "customer_bans_total";
pub const CONFLICT_RETRIES_TOTAL: &str = "record_store_conflict_retries_total";
pub const STAGE_BATCH_MS: &str = "review_stage_batch_ms";

const BATCH_MS_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1_000.0, 5_000.0, 30_000.0];

// A process has one global recorder; every router built after the first reuses it.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
static DESCRIBED: OnceCell<()> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and register descriptions.
    pub fn init() -> Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| -> Result<PrometheusHandle> {
                PrometheusBuilder::new()
                    .set_buckets_for_metric(
                        Matcher::Full(STAGE_BATCH_MS.to_string()),
                        BATCH_MS_BUCKETS,
                    )
                    .context("prometheus: histogram buckets")?
                    .install_recorder()
                    .context("prometheus: install recorder")
            })?
            .clone();
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

pub fn ensure_metrics_described() {
    DESCRIBED.get_or_init(|| {
        describe_counter!(
            STAGE_RECORDS_TOTAL,
            Unit::Count,
            "Records handled per stage, labelled by outcome"
        );
        describe_counter!(PROFANE_TOTAL, Unit::Count, "Reviews flagged profane on first write");
        describe_counter!(BANS_TOTAL, Unit::Count, "Customers banned");
        describe_counter!(
            CONFLICT_RETRIES_TOTAL,
            Unit::Count,
            "Record store write conflicts that were retried"
        );
        describe_histogram!(
            STAGE_BATCH_MS,
            Unit::Milliseconds,
            "Wall-clock time of one stage batch"
        );
    });
}

pub fn record_outcome(stage: &'static str, outcome: &'static str) {
    counter!(STAGE_RECORDS_TOTAL, "stage" => stage, "outcome" => outcome).increment(1);
}

pub fn record_batch_duration(stage: &'static str, elapsed: Duration) {
    histogram!(STAGE_BATCH_MS, "stage" => stage).record(elapsed.as_secs_f64() * 1_000.0);
}
