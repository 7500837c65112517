//! A/B test engine for two ad creatives.
//!
//! Tests start `running`, may be paused, and end `completed` once a winner is
//! declared. There is no transition from `paused` back to `running`.

use crate::stats::{evaluate_significance_with, winner_by_ctr, SignificanceResult, VariantStats};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use feedads_core::config::ExperimentConfig;
use feedads_core::error::{AdsError, AdsResult};
use feedads_core::types::{AbTest, AdContent, TestStatus, Variant};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Counter kinds tracked per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMetric {
    Impressions,
    Clicks,
    Engagements,
    Spent,
}

impl TestMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMetric::Impressions => "impressions",
            TestMetric::Clicks => "clicks",
            TestMetric::Engagements => "engagements",
            TestMetric::Spent => "spent",
        }
    }
}

impl fmt::Display for TestMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMetric {
    type Err = AdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "impressions" => Ok(TestMetric::Impressions),
            "clicks" => Ok(TestMetric::Clicks),
            "engagements" => Ok(TestMetric::Engagements),
            "spent" => Ok(TestMetric::Spent),
            other => Err(AdsError::Validation(format!("unknown test metric: {}", other))),
        }
    }
}

/// Request to start a new test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAbTest {
    pub campaign_id: String,
    #[serde(default)]
    pub ad_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub variant_a: AdContent,
    pub variant_b: AdContent,
    /// Share of traffic for variant A, 0-100.
    pub split_percent: u8,
    pub duration_days: u32,
}

/// Snapshot of a test's results.
#[derive(Debug, Clone, Serialize)]
pub struct TestEvaluation {
    pub test_id: Uuid,
    pub status: TestStatus,
    pub declared_winner: Option<Variant>,
    pub variant_a: VariantStats,
    pub variant_b: VariantStats,
    pub significance: SignificanceResult,
    /// Variant currently leading on CTR, `None` on a tie.
    pub auto_winner: Option<Variant>,
}

/// Registry of A/B tests. Metric updates lock only the test being updated.
pub struct AbTestEngine {
    tests: DashMap<Uuid, AbTest>,
    rng: Mutex<StdRng>,
    config: ExperimentConfig,
}

impl AbTestEngine {
    pub fn new(config: ExperimentConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(seeded = config.seed.is_some(), "A/B test engine initialized");
        Self {
            tests: DashMap::new(),
            rng: Mutex::new(rng),
            config,
        }
    }

    /// Engine with reproducible variant draws.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(ExperimentConfig {
            seed: Some(seed),
            ..Default::default()
        })
    }

    pub fn create_test(&self, req: NewAbTest, now: DateTime<Utc>) -> AdsResult<Uuid> {
        if req.campaign_id.trim().is_empty() {
            return Err(AdsError::Validation("campaign id is required".to_string()));
        }
        if req.variant_a.headline.trim().is_empty() || req.variant_b.headline.trim().is_empty() {
            return Err(AdsError::Validation(
                "both variants need a headline".to_string(),
            ));
        }

        let name = req
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Test: {}", req.campaign_id));
        let test = AbTest::new(
            req.campaign_id,
            req.ad_id,
            name,
            req.variant_a,
            req.variant_b,
            req.split_percent,
            req.duration_days,
            now,
        );
        let id = test.id;
        info!(
            test_id = %id,
            campaign_id = %test.campaign_id,
            split_percent = test.split_percent,
            duration_days = test.duration_days,
            "A/B test created"
        );
        self.tests.insert(id, test);
        Ok(id)
    }

    pub fn get_test(&self, id: &Uuid) -> Option<AbTest> {
        self.tests.get(id).map(|t| t.value().clone())
    }

    /// All tests, oldest first.
    pub fn list_tests(&self) -> Vec<AbTest> {
        let mut tests: Vec<AbTest> = self.tests.iter().map(|t| t.value().clone()).collect();
        tests.sort_by(|a, b| a.start_date.cmp(&b.start_date));
        tests
    }

    pub fn tests_for_campaign(&self, campaign_id: &str) -> Vec<AbTest> {
        self.list_tests()
            .into_iter()
            .filter(|t| t.campaign_id == campaign_id)
            .collect()
    }

    /// Random draw against the split. Not sticky: repeated calls may differ.
    /// Returns `None` unless the test is running.
    pub fn assign_variant(&self, id: &Uuid) -> Option<Variant> {
        let split = self.running_split(id)?;
        let draw: f64 = self.rng.lock().gen();
        let variant = if draw < f64::from(split) / 100.0 {
            Variant::A
        } else {
            Variant::B
        };
        metrics::counter!("feedads.abtest.assignments", "variant" => variant.to_string())
            .increment(1);
        Some(variant)
    }

    /// Deterministic assignment: the same member always lands in the same
    /// variant of a given test.
    pub fn assign_variant_for_user(&self, id: &Uuid, user_id: &str) -> Option<Variant> {
        let split = self.running_split(id)?;
        let hash = id
            .as_bytes()
            .iter()
            .chain(user_id.as_bytes())
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(*b)));
        let normalized = (mix64(hash) % 10_000) as f64 / 10_000.0;
        let variant = if normalized < f64::from(split) / 100.0 {
            Variant::A
        } else {
            Variant::B
        };
        metrics::counter!("feedads.abtest.assignments", "variant" => variant.to_string())
            .increment(1);
        Some(variant)
    }

    fn running_split(&self, id: &Uuid) -> Option<u8> {
        let test = self.tests.get(id)?;
        if !test.is_running() {
            debug!(test_id = %id, status = ?test.status, "No assignment for inactive test");
            return None;
        }
        Some(test.split_percent)
    }

    /// Add `delta` to one counter. Unknown tests, zero, negative or non-finite
    /// deltas, and fractional deltas on count metrics are ignored; returns
    /// whether anything changed. Counts saturate at `u64::MAX`.
    pub fn record_metric(&self, id: &Uuid, variant: Variant, metric: TestMetric, delta: f64) -> bool {
        if !delta.is_finite() || delta <= 0.0 {
            warn!(test_id = %id, %metric, delta, "Ignoring invalid metric delta");
            return false;
        }
        if metric != TestMetric::Spent && delta.fract() != 0.0 {
            warn!(test_id = %id, %metric, delta, "Ignoring fractional count delta");
            return false;
        }
        let Some(mut test) = self.tests.get_mut(id) else {
            debug!(test_id = %id, "Metric for unknown test ignored");
            return false;
        };

        // Float to int casts saturate, so huge deltas land on u64::MAX.
        let count = delta as u64;
        let bucket = test.metrics_mut(variant);
        match metric {
            TestMetric::Impressions => bucket.impressions = bucket.impressions.saturating_add(count),
            TestMetric::Clicks => bucket.clicks = bucket.clicks.saturating_add(count),
            TestMetric::Engagements => bucket.engagements = bucket.engagements.saturating_add(count),
            TestMetric::Spent => bucket.spent += delta,
        }
        true
    }

    /// Stop serving a running test. Completed tests are left untouched.
    pub fn pause(&self, id: &Uuid) -> bool {
        let Some(mut test) = self.tests.get_mut(id) else {
            return false;
        };
        match test.status {
            TestStatus::Completed => {
                debug!(test_id = %id, "Pause ignored for completed test");
                false
            }
            TestStatus::Paused => true,
            TestStatus::Running => {
                test.status = TestStatus::Paused;
                info!(test_id = %id, "A/B test paused");
                true
            }
        }
    }

    /// Record the winner and complete the test. Calling again overwrites the winner.
    pub fn declare_winner(&self, id: &Uuid, winner: Variant) -> bool {
        let Some(mut test) = self.tests.get_mut(id) else {
            return false;
        };
        test.winner = Some(winner);
        test.status = TestStatus::Completed;
        info!(test_id = %id, %winner, "A/B test completed");
        true
    }

    /// Current per-variant stats, significance and CTR leader. No side effects.
    pub fn evaluate(&self, id: &Uuid) -> Option<TestEvaluation> {
        let test = self.tests.get(id)?;
        Some(TestEvaluation {
            test_id: test.id,
            status: test.status,
            declared_winner: test.winner,
            variant_a: VariantStats::from(&test.metrics_a),
            variant_b: VariantStats::from(&test.metrics_b),
            significance: evaluate_significance_with(&test.metrics_a, &test.metrics_b, &self.config),
            auto_winner: winner_by_ctr(&test.metrics_a, &test.metrics_b),
        })
    }
}

/// Final avalanche step so members with near-identical ids spread evenly.
fn mix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^ (h >> 33)
}

impl Default for AbTestEngine {
    fn default() -> Self {
        Self::new(ExperimentConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn creative(headline: &str) -> AdContent {
        AdContent {
            headline: headline.to_string(),
            ..Default::default()
        }
    }

    fn new_test(split_percent: u8) -> NewAbTest {
        NewAbTest {
            campaign_id: "c1".to_string(),
            ad_id: Some("ad1".to_string()),
            name: None,
            variant_a: creative("Hire faster"),
            variant_b: creative("Find talent today"),
            split_percent,
            duration_days: 14,
        }
    }

    #[test]
    fn test_create_initializes_running_test() {
        let engine = AbTestEngine::with_seed(1);
        let now = Utc::now();
        let id = engine.create_test(new_test(50), now).unwrap();
        let test = engine.get_test(&id).unwrap();
        assert_eq!(test.status, TestStatus::Running);
        assert_eq!(test.name, "Test: c1");
        assert_eq!(test.end_date, now + chrono::Duration::days(14));
        assert_eq!(test.metrics_a.impressions, 0);
        assert_eq!(test.winner, None);
    }

    #[test]
    fn test_create_requires_both_headlines() {
        let engine = AbTestEngine::with_seed(1);
        let mut req = new_test(50);
        req.variant_b = creative("  ");
        assert!(matches!(
            engine.create_test(req, Utc::now()),
            Err(AdsError::Validation(_))
        ));

        let mut req = new_test(50);
        req.campaign_id = String::new();
        assert!(engine.create_test(req, Utc::now()).is_err());
    }

    #[test]
    fn test_assignment_respects_split() {
        let engine = AbTestEngine::with_seed(42);
        let id = engine.create_test(new_test(70), Utc::now()).unwrap();
        let draws = 10_000;
        let a_count = (0..draws)
            .filter(|_| engine.assign_variant(&id) == Some(Variant::A))
            .count();
        let share = a_count as f64 / draws as f64;
        assert!((share - 0.70).abs() < 0.02, "share of A = {}", share);
    }

    #[test]
    fn test_seeded_assignment_is_reproducible() {
        let first = AbTestEngine::with_seed(7);
        let second = AbTestEngine::with_seed(7);
        let id1 = first.create_test(new_test(50), Utc::now()).unwrap();
        let id2 = second.create_test(new_test(50), Utc::now()).unwrap();
        let seq1: Vec<_> = (0..50).map(|_| first.assign_variant(&id1)).collect();
        let seq2: Vec<_> = (0..50).map(|_| second.assign_variant(&id2)).collect();
        assert_eq!(seq1, seq2);
    }

    #[test]
    fn test_extreme_splits() {
        let engine = AbTestEngine::with_seed(3);
        let all_a = engine.create_test(new_test(100), Utc::now()).unwrap();
        let all_b = engine.create_test(new_test(0), Utc::now()).unwrap();
        for _ in 0..200 {
            assert_eq!(engine.assign_variant(&all_a), Some(Variant::A));
            assert_eq!(engine.assign_variant(&all_b), Some(Variant::B));
        }
    }

    #[test]
    fn test_sticky_assignment_per_user() {
        let engine = AbTestEngine::with_seed(5);
        let id = engine.create_test(new_test(50), Utc::now()).unwrap();
        let first = engine.assign_variant_for_user(&id, "u42");
        for _ in 0..20 {
            assert_eq!(engine.assign_variant_for_user(&id, "u42"), first);
        }
        let a_count = (0..2000)
            .filter(|i| engine.assign_variant_for_user(&id, &format!("user-{}", i)) == Some(Variant::A))
            .count();
        assert!(a_count > 700 && a_count < 1300, "A count = {}", a_count);
    }

    #[test]
    fn test_no_assignment_unless_running() {
        let engine = AbTestEngine::with_seed(9);
        let id = engine.create_test(new_test(50), Utc::now()).unwrap();
        assert!(engine.pause(&id));
        assert_eq!(engine.assign_variant(&id), None);
        assert_eq!(engine.assign_variant_for_user(&id, "u1"), None);
        assert_eq!(engine.assign_variant(&Uuid::new_v4()), None);
    }

    #[test]
    fn test_record_metric_updates_one_bucket() {
        let engine = AbTestEngine::with_seed(1);
        let id = engine.create_test(new_test(50), Utc::now()).unwrap();
        assert!(engine.record_metric(&id, Variant::A, TestMetric::Impressions, 1.0));
        assert!(engine.record_metric(&id, Variant::A, TestMetric::Clicks, 1.0));
        assert!(engine.record_metric(&id, Variant::B, TestMetric::Spent, 12.5));
        assert!(engine.record_metric(&id, Variant::B, TestMetric::Engagements, 3.0));

        let test = engine.get_test(&id).unwrap();
        assert_eq!(test.metrics_a.impressions, 1);
        assert_eq!(test.metrics_a.clicks, 1);
        assert_eq!(test.metrics_a.spent, 0.0);
        assert_eq!(test.metrics_b.spent, 12.5);
        assert_eq!(test.metrics_b.engagements, 3);
        assert_eq!(test.metrics_b.impressions, 0);
    }

    #[test]
    fn test_record_metric_ignores_bad_input() {
        let engine = AbTestEngine::with_seed(1);
        let id = engine.create_test(new_test(50), Utc::now()).unwrap();
        assert!(!engine.record_metric(&Uuid::new_v4(), Variant::A, TestMetric::Clicks, 1.0));
        assert!(!engine.record_metric(&id, Variant::A, TestMetric::Clicks, -1.0));
        assert!(!engine.record_metric(&id, Variant::A, TestMetric::Spent, f64::NAN));
        assert_eq!(engine.get_test(&id).unwrap().metrics_a.clicks, 0);
    }

    #[test]
    fn test_fractional_counts_are_rejected() {
        let engine = AbTestEngine::with_seed(1);
        let id = engine.create_test(new_test(50), Utc::now()).unwrap();
        assert!(!engine.record_metric(&id, Variant::A, TestMetric::Clicks, 0.5));
        assert!(!engine.record_metric(&id, Variant::A, TestMetric::Impressions, 2.25));
        assert!(!engine.record_metric(&id, Variant::A, TestMetric::Clicks, 0.0));
        assert!(engine.record_metric(&id, Variant::A, TestMetric::Spent, 0.5));

        let test = engine.get_test(&id).unwrap();
        assert_eq!(test.metrics_a.clicks, 0);
        assert_eq!(test.metrics_a.impressions, 0);
        assert_eq!(test.metrics_a.spent, 0.5);
    }

    #[test]
    fn test_huge_counts_saturate() {
        let engine = AbTestEngine::with_seed(1);
        let id = engine.create_test(new_test(50), Utc::now()).unwrap();
        assert!(engine.record_metric(&id, Variant::A, TestMetric::Impressions, 1e30));
        assert!(engine.record_metric(&id, Variant::A, TestMetric::Impressions, 1.0));
        assert!(engine.record_metric(&id, Variant::B, TestMetric::Engagements, u64::MAX as f64));
        assert!(engine.record_metric(&id, Variant::B, TestMetric::Engagements, 5.0));

        let test = engine.get_test(&id).unwrap();
        assert_eq!(test.metrics_a.impressions, u64::MAX);
        assert_eq!(test.metrics_b.engagements, u64::MAX);
    }

    #[test]
    fn test_concurrent_recording_loses_no_updates() {
        let engine = Arc::new(AbTestEngine::with_seed(1));
        let id = engine.create_test(new_test(50), Utc::now()).unwrap();

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let engine = Arc::clone(&engine);
                scope.spawn(move || {
                    let variant = if worker % 2 == 0 { Variant::A } else { Variant::B };
                    for _ in 0..500 {
                        engine.record_metric(&id, variant, TestMetric::Impressions, 1.0);
                    }
                });
            }
        });

        let test = engine.get_test(&id).unwrap();
        assert_eq!(test.metrics_a.impressions, 2000);
        assert_eq!(test.metrics_b.impressions, 2000);
    }

    #[test]
    fn test_declare_winner_is_terminal_and_overwritable() {
        let engine = AbTestEngine::with_seed(1);
        let id = engine.create_test(new_test(50), Utc::now()).unwrap();
        assert!(engine.declare_winner(&id, Variant::A));
        let test = engine.get_test(&id).unwrap();
        assert_eq!(test.status, TestStatus::Completed);
        assert_eq!(test.winner, Some(Variant::A));

        assert!(engine.declare_winner(&id, Variant::B));
        let test = engine.get_test(&id).unwrap();
        assert_eq!(test.status, TestStatus::Completed);
        assert_eq!(test.winner, Some(Variant::B));

        assert!(!engine.pause(&id));
        assert_eq!(engine.get_test(&id).unwrap().status, TestStatus::Completed);
        assert!(!engine.declare_winner(&Uuid::new_v4(), Variant::A));
    }

    #[test]
    fn test_paused_test_can_still_be_completed() {
        let engine = AbTestEngine::with_seed(1);
        let id = engine.create_test(new_test(50), Utc::now()).unwrap();
        assert!(engine.pause(&id));
        assert!(engine.pause(&id));
        assert!(engine.declare_winner(&id, Variant::B));
        assert_eq!(engine.get_test(&id).unwrap().status, TestStatus::Completed);
    }

    #[test]
    fn test_evaluate_reports_stats_and_leader() {
        let engine = AbTestEngine::with_seed(1);
        let id = engine.create_test(new_test(50), Utc::now()).unwrap();
        engine.record_metric(&id, Variant::A, TestMetric::Impressions, 100.0);
        engine.record_metric(&id, Variant::A, TestMetric::Clicks, 10.0);
        engine.record_metric(&id, Variant::B, TestMetric::Impressions, 100.0);
        engine.record_metric(&id, Variant::B, TestMetric::Clicks, 25.0);

        let eval = engine.evaluate(&id).unwrap();
        assert_eq!(eval.auto_winner, Some(Variant::B));
        assert!(eval.significance.significant);
        assert!((eval.variant_b.ctr_percent - 25.0).abs() < 1e-9);
        assert_eq!(eval.declared_winner, None);
        assert!(engine.evaluate(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_metric_names_parse() {
        assert_eq!("Clicks".parse::<TestMetric>().unwrap(), TestMetric::Clicks);
        assert_eq!("spent".parse::<TestMetric>().unwrap(), TestMetric::Spent);
        assert!("likes".parse::<TestMetric>().is_err());
    }

    #[test]
    fn test_new_test_request_from_json() {
        let req: NewAbTest = serde_json::from_str(
            r#"{
                "campaignId": "c7",
                "variantA": {"headline": "A"},
                "variantB": {"headline": "B", "ctaText": "Apply"},
                "splitPercent": 60,
                "durationDays": 7
            }"#,
        )
        .unwrap();
        assert_eq!(req.split_percent, 60);
        assert_eq!(req.variant_b.cta_text.as_deref(), Some("Apply"));
        assert!(req.ad_id.is_none());
    }
}
