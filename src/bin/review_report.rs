//! Offline report over a JSON-lines review dump.
//!
//! Usage: `review-report <input.jsonl> [output.json]`

use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::info;

use review_analyzer::config::load_config_default;
use review_analyzer::report::{analyze_reviews, load_reviews_jsonl, render_summary, write_report_json};

const DEFAULT_OUTPUT: &str = "data/analysis_results.json";

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    review_analyzer::logging::init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        bail!("usage: review-report <input.jsonl> [output.json]");
    };
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let cfg = load_config_default()?;
    let parsed = load_reviews_jsonl(&input)?;
    info!(
        reviews = parsed.reviews.len(),
        malformed = parsed.malformed_lines,
        "loaded reviews"
    );

    let report = analyze_reviews(&parsed.reviews, &cfg.profanity_detector(), cfg.ban_threshold);
    print!("{}", render_summary(&report));
    write_report_json(&output, &input, parsed.malformed_lines, &report)?;
    println!("\nResults written to {}", output.display());
    Ok(())
}
