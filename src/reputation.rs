// src/reputation.rs
//! Review metadata writes and the per-customer profanity counter.
//!
//! Both stages write disjoint fields of the same review record behind a
//! first-write guard, so redelivery is a no-op and stage order does not matter.
//! The counter is only ever moved by a store-side add or a version-checked write.

use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AnalyzerConfig, CounterStrategy, ResourceNames};
use crate::error::{AnalyzerError, StoreError};
use crate::metrics::{BANS_TOTAL, PROFANE_TOTAL};
use crate::model::{
    counted_marker, str_attr, CustomerStats, ReviewKey, ReviewMetadata, BANNED, CUSTOMER_ID,
    IS_UNPOLITE, REVIEW_ID, SENTIMENT, SENTIMENT_LABEL, UNPOLITE_COUNT,
};
use crate::retry::{retry_on_conflict, RetryConfig};
use crate::sentiment::{classify, SentimentLabel};
use crate::store::{AttrValue, Condition, Record, RecordKey, RecordStore, Update};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ProfanityOutcome {
    /// `isUnpolite` was already set; at most an unfinished count or ban was completed.
    Duplicate,
    #[serde(rename_all = "camelCase")]
    Recorded {
        is_profane: bool,
        /// Post-increment stats; `None` for clean reviews.
        stats: Option<CustomerStats>,
        newly_banned: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SentimentOutcome {
    Duplicate,
    Recorded { score: f64, label: SentimentLabel },
}

pub struct ReputationAggregator {
    store: Arc<dyn RecordStore>,
    review_table: String,
    stats_table: String,
    ban_threshold: u32,
    strategy: CounterStrategy,
    retry: RetryConfig,
}

impl ReputationAggregator {
    pub fn new(store: Arc<dyn RecordStore>, names: &ResourceNames, cfg: &AnalyzerConfig) -> Self {
        Self {
            store,
            review_table: names.review_table.clone(),
            stats_table: names.stats_table.clone(),
            ban_threshold: cfg.ban_threshold,
            strategy: cfg.counter_strategy,
            retry: cfg.retry.clone(),
        }
    }

    pub fn ban_threshold(&self) -> u32 {
        self.ban_threshold
    }

    /// Set `isUnpolite` once; for a profane review count it against the customer
    /// exactly once and ban past the threshold.
    ///
    /// The count carries its own per-review marker on the stats record, so a
    /// redelivery after a failed or interrupted increment finishes the count
    /// instead of losing it.
    pub async fn record_profanity(
        &self,
        customer_id: &str,
        review_id: &str,
        is_profane: bool,
    ) -> Result<ProfanityOutcome, AnalyzerError> {
        let key = review_key(customer_id, review_id);
        let update = review_update(&key)
            .set(IS_UNPOLITE, AttrValue::Bool(is_profane))
            .when(Condition::AttributeNotExists(IS_UNPOLITE.to_string()));

        let Some(_) = self.guarded_review_write(&key, &update, "isUnpolite").await? else {
            self.finish_after_duplicate(&key).await?;
            return Ok(ProfanityOutcome::Duplicate);
        };

        if !is_profane {
            return Ok(ProfanityOutcome::Recorded {
                is_profane: false,
                stats: None,
                newly_banned: false,
            });
        }
        counter!(PROFANE_TOTAL).increment(1);

        let counted = self.count_and_ban(customer_id, review_id).await?;
        Ok(ProfanityOutcome::Recorded {
            is_profane: true,
            stats: Some(counted.stats),
            newly_banned: counted.newly_banned,
        })
    }

    /// Set `sentiment` (and its label) once; never touches `CustomerStats`.
    pub async fn record_sentiment(
        &self,
        customer_id: &str,
        review_id: &str,
        score: f64,
    ) -> Result<SentimentOutcome, AnalyzerError> {
        let score = if score.is_finite() { score.clamp(-1.0, 1.0) } else { 0.0 };
        let label = classify(score);
        let key = review_key(customer_id, review_id);
        let update = review_update(&key)
            .set(SENTIMENT, AttrValue::Float(score))
            .set(SENTIMENT_LABEL, str_attr(label.as_str()))
            .when(Condition::AttributeNotExists(SENTIMENT.to_string()));

        match self.guarded_review_write(&key, &update, "sentiment").await? {
            Some(_) => Ok(SentimentOutcome::Recorded { score, label }),
            None => Ok(SentimentOutcome::Duplicate),
        }
    }

    pub async fn customer_stats(
        &self,
        customer_id: &str,
    ) -> Result<Option<CustomerStats>, AnalyzerError> {
        let rec = self
            .store
            .get_item(&self.stats_table, &RecordKey::simple(customer_id))
            .await?;
        Ok(rec.map(|r| CustomerStats::from_record(customer_id, &r)))
    }

    pub async fn review_metadata(
        &self,
        customer_id: &str,
        review_id: &str,
    ) -> Result<Option<ReviewMetadata>, AnalyzerError> {
        let key = review_key(customer_id, review_id);
        let rec = self
            .store
            .get_item(&self.review_table, &key.record_key())
            .await?;
        Ok(rec.map(|r| ReviewMetadata::from_record(&key, &r)))
    }

    /// Guarded upsert of the review record. `Ok(None)` when the guard already failed.
    async fn guarded_review_write(
        &self,
        key: &ReviewKey,
        update: &Update,
        field: &'static str,
    ) -> Result<Option<Record>, AnalyzerError> {
        let store = &self.store;
        let table = self.review_table.as_str();
        let rk = key.record_key();
        let rk = &rk;
        let written = retry_on_conflict(&self.retry, field, move || async move {
            match store.update_item(table, rk, update.clone()).await {
                Ok(rec) => Ok(Some(rec)),
                Err(StoreError::ConditionFailed) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await?;
        if written.is_none() {
            debug!(
                customer_id = %key.customer_id,
                review_id = %key.review_id,
                field,
                "field already set, skipping redelivery"
            );
        }
        Ok(written)
    }

    /// Count one profane review (no-op if its marker is already on the stats
    /// record), then make sure a customer over the threshold is banned.
    async fn count_and_ban(
        &self,
        customer_id: &str,
        review_id: &str,
    ) -> Result<Counted, AnalyzerError> {
        let (rec, counted_now) = match self.strategy {
            CounterStrategy::Atomic => self.increment_atomic(customer_id, review_id).await?,
            CounterStrategy::Optimistic => {
                self.increment_optimistic(customer_id, review_id).await?
            }
        };
        let mut stats = CustomerStats::from_record(customer_id, &rec);
        if counted_now {
            debug!(
                customer_id,
                review_id,
                count = stats.unpolite_count,
                "unpolite count incremented"
            );
        }

        // Exactly one writer counts the review that lifts the total to threshold + 1.
        let newly_banned =
            counted_now && stats.unpolite_count == u64::from(self.ban_threshold) + 1;
        if self.over_threshold(stats.unpolite_count) && !stats.banned {
            self.ban(customer_id).await?;
            stats.banned = true;
            if !counted_now {
                warn!(
                    customer_id,
                    count = stats.unpolite_count,
                    "count over threshold without ban, ban applied"
                );
                counter!(BANS_TOTAL).increment(1);
            }
        }
        if newly_banned {
            counter!(BANS_TOTAL).increment(1);
            info!(customer_id, count = stats.unpolite_count, "customer banned");
        }
        Ok(Counted {
            stats,
            counted_now,
            newly_banned,
        })
    }

    /// Store-side add-and-return, guarded by the review's counted marker.
    /// Returns the stats record and whether this call did the increment.
    async fn increment_atomic(
        &self,
        customer_id: &str,
        review_id: &str,
    ) -> Result<(Record, bool), AnalyzerError> {
        let store = &self.store;
        let table = self.stats_table.as_str();
        let key = RecordKey::simple(customer_id);
        let key = &key;
        let marker = counted_marker(review_id);
        let update = stats_update(customer_id)
            .add(UNPOLITE_COUNT, 1)
            .set(&marker, AttrValue::Bool(true))
            .when(Condition::AttributeNotExists(marker.clone()));
        let update = &update;
        retry_on_conflict(&self.retry, "unpoliteCount", move || async move {
            match store.update_item(table, key, update.clone()).await {
                Ok(rec) => Ok((rec, true)),
                Err(StoreError::ConditionFailed) => {
                    let rec = store.get_item(table, key).await?.unwrap_or_default();
                    Ok((rec, false))
                }
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Read the count, write count + 1 and the marker only if the record is still
    /// at the read version.
    async fn increment_optimistic(
        &self,
        customer_id: &str,
        review_id: &str,
    ) -> Result<(Record, bool), AnalyzerError> {
        let store = &self.store;
        let table = self.stats_table.as_str();
        let key = RecordKey::simple(customer_id);
        let key = &key;
        let marker = counted_marker(review_id);
        let marker = marker.as_str();
        retry_on_conflict(&self.retry, "unpoliteCount", move || async move {
            let current = store.get_item(table, key).await?;
            if let Some(rec) = current.as_ref().filter(|r| r.has(marker)) {
                return Ok((rec.clone(), false));
            }
            let (version, count) = current
                .as_ref()
                .map_or((0, 0), |r| (r.version, r.get_int(UNPOLITE_COUNT).unwrap_or(0)));
            let next = count.checked_add(1).ok_or_else(|| {
                StoreError::InvalidUpdate(format!("{UNPOLITE_COUNT} overflows for {key}"))
            })?;
            let update = stats_update(customer_id)
                .set(UNPOLITE_COUNT, AttrValue::Int(next))
                .set(marker, AttrValue::Bool(true))
                .when(Condition::VersionEquals(version));
            match store.update_item(table, key, update).await {
                Ok(rec) => Ok((rec, true)),
                Err(StoreError::ConditionFailed) => Err(StoreError::Conflict(format!(
                    "{table}/{key} moved past version {version}"
                ))),
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Sets `banned`; never clears it.
    async fn ban(&self, customer_id: &str) -> Result<(), AnalyzerError> {
        let store = &self.store;
        let table = self.stats_table.as_str();
        let key = RecordKey::simple(customer_id);
        let key = &key;
        retry_on_conflict(&self.retry, "banned", move || async move {
            store
                .update_item(table, key, Update::new().set(BANNED, AttrValue::Bool(true)))
                .await
        })
        .await?;
        Ok(())
    }

    /// A redelivered profane review may follow a failure anywhere after the flag
    /// was written; finish the count and the ban it left behind.
    async fn finish_after_duplicate(&self, key: &ReviewKey) -> Result<(), AnalyzerError> {
        let review = self
            .store
            .get_item(&self.review_table, &key.record_key())
            .await?;
        if review.and_then(|r| r.get_bool(IS_UNPOLITE)) != Some(true) {
            return Ok(());
        }
        let counted = self.count_and_ban(&key.customer_id, &key.review_id).await?;
        if counted.counted_now {
            warn!(
                customer_id = %key.customer_id,
                review_id = %key.review_id,
                count = counted.stats.unpolite_count,
                "finished unpolite count left by an earlier delivery"
            );
        }
        Ok(())
    }

    fn over_threshold(&self, count: u64) -> bool {
        count > u64::from(self.ban_threshold)
    }
}

struct Counted {
    stats: CustomerStats,
    counted_now: bool,
    newly_banned: bool,
}

fn review_key(customer_id: &str, review_id: &str) -> ReviewKey {
    ReviewKey {
        customer_id: customer_id.to_string(),
        review_id: review_id.to_string(),
    }
}

// Creates the minimal record when the sibling stage has not written yet.
fn review_update(key: &ReviewKey) -> Update {
    Update::new()
        .set_if_absent(CUSTOMER_ID, str_attr(&key.customer_id))
        .set_if_absent(REVIEW_ID, str_attr(&key.review_id))
}

fn stats_update(customer_id: &str) -> Update {
    Update::new()
        .set_if_absent(CUSTOMER_ID, str_attr(customer_id))
        .set_if_absent(BANNED, AttrValue::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;

    fn aggregator(store: Arc<MemoryRecordStore>, strategy: CounterStrategy) -> ReputationAggregator {
        let cfg = AnalyzerConfig {
            counter_strategy: strategy,
            retry: RetryConfig {
                max_retries: 5,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
            },
            ..AnalyzerConfig::default()
        };
        ReputationAggregator::new(store, &ResourceNames::default(), &cfg)
    }

    #[tokio::test]
    async fn fourth_profane_review_bans() {
        let agg = aggregator(Arc::new(MemoryRecordStore::new()), CounterStrategy::Atomic);
        for i in 1..=3 {
            agg.record_profanity("c1", &format!("r{i}"), true).await.unwrap();
        }
        let stats = agg.customer_stats("c1").await.unwrap().unwrap();
        assert_eq!(stats.unpolite_count, 3);
        assert!(!stats.banned);

        let out = agg.record_profanity("c1", "r4", true).await.unwrap();
        match out {
            ProfanityOutcome::Recorded {
                stats: Some(s),
                newly_banned,
                ..
            } => {
                assert_eq!(s.unpolite_count, 4);
                assert!(s.banned);
                assert!(newly_banned);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn redelivery_does_not_double_count() {
        let agg = aggregator(Arc::new(MemoryRecordStore::new()), CounterStrategy::Optimistic);
        agg.record_profanity("c1", "r1", true).await.unwrap();
        let again = agg.record_profanity("c1", "r1", true).await.unwrap();
        assert_eq!(again, ProfanityOutcome::Duplicate);
        // A contradicting redelivery does not flip the stored flag either.
        agg.record_profanity("c1", "r1", false).await.unwrap();
        let stats = agg.customer_stats("c1").await.unwrap().unwrap();
        assert_eq!(stats.unpolite_count, 1);
        let meta = agg.review_metadata("c1", "r1").await.unwrap().unwrap();
        assert_eq!(meta.is_unpolite, Some(true));
    }

    #[tokio::test]
    async fn clean_review_creates_no_stats() {
        let agg = aggregator(Arc::new(MemoryRecordStore::new()), CounterStrategy::Atomic);
        agg.record_profanity("c1", "r1", false).await.unwrap();
        assert!(agg.customer_stats("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sentiment_is_written_once_and_labelled() {
        let agg = aggregator(Arc::new(MemoryRecordStore::new()), CounterStrategy::Atomic);
        let first = agg.record_sentiment("c1", "r1", 0.6).await.unwrap();
        assert_eq!(
            first,
            SentimentOutcome::Recorded {
                score: 0.6,
                label: SentimentLabel::Positive
            }
        );
        assert_eq!(
            agg.record_sentiment("c1", "r1", -0.9).await.unwrap(),
            SentimentOutcome::Duplicate
        );
        let meta = agg.review_metadata("c1", "r1").await.unwrap().unwrap();
        assert_eq!(meta.sentiment, Some(0.6));
        assert_eq!(meta.sentiment_label, Some(SentimentLabel::Positive));
        assert_eq!(meta.is_unpolite, None);
    }

    #[tokio::test]
    async fn transient_conflicts_are_absorbed() {
        let store = Arc::new(MemoryRecordStore::new());
        let agg = aggregator(store.clone(), CounterStrategy::Atomic);
        store.inject_conflicts(2);
        agg.record_profanity("c1", "r1", true).await.unwrap();
        let stats = agg.customer_stats("c1").await.unwrap().unwrap();
        assert_eq!(stats.unpolite_count, 1);
    }

    #[tokio::test]
    async fn duplicate_repairs_missing_ban() {
        let store = Arc::new(MemoryRecordStore::new());
        let agg = aggregator(store.clone(), CounterStrategy::Atomic);
        for i in 1..=4 {
            agg.record_profanity("c1", &format!("r{i}"), true).await.unwrap();
        }
        // Simulate a crash between the fourth increment and the ban.
        store
            .update_item(
                "customer-stats",
                &RecordKey::simple("c1"),
                Update::new().set(BANNED, AttrValue::Bool(false)),
            )
            .await
            .unwrap();
        assert_eq!(
            agg.record_profanity("c1", "r4", true).await.unwrap(),
            ProfanityOutcome::Duplicate
        );
        assert!(agg.customer_stats("c1").await.unwrap().unwrap().banned);
    }
}
