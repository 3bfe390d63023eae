//! Review analyzer: binary entrypoint.
//! Serves the local HTTP surface over the in-process pipeline.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::info;

const ENV_ADDR: &str = "REVIEW_ANALYZER_ADDR";
const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    review_analyzer::logging::init_tracing();

    let addr: SocketAddr = std::env::var(ENV_ADDR)
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .with_context(|| format!("parsing {ENV_ADDR}"))?;

    let router = review_analyzer::app().await?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "review analyzer listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serving http")?;
    Ok(())
}
