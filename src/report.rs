// src/report.rs
//! Offline analysis of a JSON-lines review dump: sentiment distribution,
//! profanity counts and the customers that would end up banned.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::model::Review;
use crate::normalize::normalize;
use crate::profanity::ProfanityDetector;
use crate::sentiment::{classify, SentimentAnalyzer, SentimentLabel};

pub const TOP_CUSTOMERS: usize = 5;
const UNKNOWN_CUSTOMER: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentCounts {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

impl SentimentCounts {
    fn bump(&mut self, label: SentimentLabel) {
        match label {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Neutral => self.neutral += 1,
            SentimentLabel::Negative => self.negative += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_reviews: u64,
    pub sentiment_counts: SentimentCounts,
    pub profane_reviews: u64,
    pub banned_customers_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub summary: ReportSummary,
    /// Sorted ascending.
    pub banned_customers: Vec<String>,
    pub customer_profanity_counts: BTreeMap<String, u64>,
    /// Highest profane counts first, ties by customer id.
    pub top_customers: Vec<(String, u64)>,
}

/// Parsed lines plus the number of non-blank lines that were not reviews.
#[derive(Debug, Clone, Default)]
pub struct ParsedReviews {
    pub reviews: Vec<Review>,
    pub malformed_lines: usize,
}

pub fn parse_reviews_jsonl(content: &str) -> ParsedReviews {
    let mut out = ParsedReviews::default();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Review>(line) {
            Ok(r) => out.reviews.push(r),
            Err(e) => {
                warn!(line = idx + 1, error = %e, "skipping malformed review line");
                out.malformed_lines += 1;
            }
        }
    }
    out
}

pub fn load_reviews_jsonl(path: &Path) -> Result<ParsedReviews> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading reviews from {}", path.display()))?;
    Ok(parse_reviews_jsonl(&content))
}

/// Score and flag every review, counting profane reviews per customer.
/// A customer is banned once the count exceeds `ban_threshold`.
pub fn analyze_reviews(
    reviews: &[Review],
    detector: &ProfanityDetector,
    ban_threshold: u32,
) -> AnalysisReport {
    let analyzer = SentimentAnalyzer::new();
    let mut report = AnalysisReport::default();

    for review in reviews {
        report.summary.total_reviews += 1;
        let text = review.review_text.as_deref().unwrap_or_default();
        let summary = review.summary.as_deref().unwrap_or_default();

        let scored = if text.trim().is_empty() { summary } else { text };
        report
            .summary
            .sentiment_counts
            .bump(classify(analyzer.score_text(scored)));

        if detector.is_profane(&normalize(text)) || detector.is_profane(&normalize(summary)) {
            report.summary.profane_reviews += 1;
            let customer = review
                .customer_id
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(UNKNOWN_CUSTOMER);
            *report
                .customer_profanity_counts
                .entry(customer.to_string())
                .or_insert(0) += 1;
        }
    }

    report.banned_customers = report
        .customer_profanity_counts
        .iter()
        .filter(|(_, n)| **n > u64::from(ban_threshold))
        .map(|(c, _)| c.clone())
        .collect();
    report.summary.banned_customers_count = report.banned_customers.len();

    let mut ranked: Vec<(String, u64)> = report
        .customer_profanity_counts
        .iter()
        .map(|(c, n)| (c.clone(), *n))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(TOP_CUSTOMERS);
    report.top_customers = ranked;
    report
}

/// On-disk form of a report.
#[derive(Debug, Serialize)]
pub struct ReportFile<'a> {
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub malformed_lines: usize,
    #[serde(flatten)]
    pub report: &'a AnalysisReport,
}

pub fn write_report_json(
    path: &Path,
    source: &Path,
    malformed_lines: usize,
    report: &AnalysisReport,
) -> Result<()> {
    let file = ReportFile {
        generated_at: Utc::now(),
        source: source.display().to_string(),
        malformed_lines,
        report,
    };
    let body = serde_json::to_string_pretty(&file).context("serializing report")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, body).with_context(|| format!("writing report to {}", path.display()))
}

fn pct(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Human-readable summary.
pub fn render_summary(report: &AnalysisReport) -> String {
    let s = &report.summary;
    let total = s.total_reviews;
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "REVIEW ANALYSIS REPORT");
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "\nSentiment");
    let _ = writeln!(out, "  Total reviews: {total}");
    for (name, n) in [
        ("Positive", s.sentiment_counts.positive),
        ("Neutral", s.sentiment_counts.neutral),
        ("Negative", s.sentiment_counts.negative),
    ] {
        let _ = writeln!(out, "  {name:<9} {n} ({:.1}%)", pct(n, total));
    }
    let _ = writeln!(out, "\nProfanity");
    let _ = writeln!(
        out,
        "  Profane reviews: {} ({:.2}%)",
        s.profane_reviews,
        pct(s.profane_reviews, total)
    );
    let _ = writeln!(out, "\nCustomers");
    let _ = writeln!(
        out,
        "  With profane reviews: {}",
        report.customer_profanity_counts.len()
    );
    let _ = writeln!(out, "  Banned: {}", s.banned_customers_count);
    for c in &report.banned_customers {
        let n = report.customer_profanity_counts.get(c).copied().unwrap_or(0);
        let _ = writeln!(out, "    - {c} ({n} profane reviews)");
    }
    if !report.top_customers.is_empty() {
        let _ = writeln!(out, "\nTop customers by profane reviews");
        for (c, n) in &report.top_customers {
            let status = if report.banned_customers.binary_search(c).is_ok() {
                "BANNED"
            } else {
                "active"
            };
            let _ = writeln!(out, "    - {c}: {n} ({status})");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_broken_lines_are_skipped() {
        let parsed = parse_reviews_jsonl(
            "{\"reviewerID\":\"A\",\"reviewText\":\"good\"}\n\n not json\n[1]\n",
        );
        assert_eq!(parsed.reviews.len(), 1);
        assert_eq!(parsed.malformed_lines, 2);
    }

    #[test]
    fn empty_corpus_renders() {
        let report = analyze_reviews(&[], &ProfanityDetector::new(), 3);
        assert_eq!(report.summary.total_reviews, 0);
        assert!(render_summary(&report).contains("Total reviews: 0"));
    }
}
