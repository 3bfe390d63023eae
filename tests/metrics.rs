// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::Request;
use http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use review_analyzer::api::{self, AppState};
use review_analyzer::config::AnalyzerConfig;
use review_analyzer::metrics::Metrics;
use review_analyzer::pipeline::LocalPipeline;

#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let metrics = Metrics::init().expect("install recorder");
    // second init reuses the process-wide recorder
    Metrics::init().expect("reuse recorder");
    let state = AppState::new(LocalPipeline::in_memory(&AnalyzerConfig::default()));
    let app = api::router(state, Some(&metrics));

    let review = json!({"customerId":"m1","reviewId":"r1","reviewText":"this sucks"});
    let resp = app
        .clone()
        .oneshot(
            Request::post("/reviews")
                .header("content-type", "application/json")
                .body(Body::from(review.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "review_stage_records_total",
        "review_profane_total",
        "review_stage_batch_ms_bucket",
    ] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }
}
