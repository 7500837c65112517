//! Platform state container.
//!
//! Owns the catalog, member directory, event log and A/B test registry, and
//! is the only entry point the rendering and admin layers call into.

use crate::catalog::AdCatalog;
use crate::feed::{apply_variant, plan_feed_slots};
use crate::fixtures::PlatformFixtures;
use chrono::{DateTime, Utc};
use feedads_analytics::{AdFilter, CampaignReport, EventLog};
use feedads_core::config::AppConfig;
use feedads_core::error::AdsResult;
use feedads_core::types::{Ad, AdEvent, TestStatus, UserProfile, Variant};
use feedads_experimentation::{AbTestEngine, NewAbTest, TestEvaluation, TestMetric};
use feedads_targeting::{AdRanker, RankedAd, RankingContext};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct AdPlatform {
    config: AppConfig,
    catalog: AdCatalog,
    users: RwLock<HashMap<String, UserProfile>>,
    events: EventLog,
    ranker: AdRanker,
    tests: AbTestEngine,
}

impl AdPlatform {
    pub fn new(config: AppConfig) -> Self {
        Self::with_parts(config, AdCatalog::new(), HashMap::new(), Vec::new(), Vec::new())
    }

    pub fn from_fixtures(config: AppConfig, fixtures: PlatformFixtures) -> Self {
        let users = fixtures
            .users
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        Self::with_parts(
            config,
            AdCatalog::with_contents(fixtures.ads, fixtures.campaigns),
            users,
            fixtures.impressions,
            fixtures.clicks,
        )
    }

    fn with_parts(
        config: AppConfig,
        catalog: AdCatalog,
        users: HashMap<String, UserProfile>,
        impressions: Vec<AdEvent>,
        clicks: Vec<AdEvent>,
    ) -> Self {
        let events = EventLog::with_events(&config.events, impressions, clicks);
        let ranker = AdRanker::new(config.ranking.clone(), &config.frequency);
        let tests = AbTestEngine::new(config.experiments.clone());
        info!(users = users.len(), "Ad platform ready");
        Self {
            config,
            catalog,
            users: RwLock::new(users),
            events,
            ranker,
            tests,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &AdCatalog {
        &self.catalog
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn ab_tests(&self) -> &AbTestEngine {
        &self.tests
    }

    // ─── Members ───────────────────────────────────────────────────────────

    pub fn upsert_user(&self, user: UserProfile) {
        self.users.write().insert(user.id.clone(), user);
    }

    pub fn get_user(&self, id: &str) -> Option<UserProfile> {
        self.users.read().get(id).cloned()
    }

    // ─── Ranking ───────────────────────────────────────────────────────────

    /// Ranked ads for a member. The caller checks the ad-free entitlement.
    pub fn rank_ads_for_user(&self, user: &UserProfile) -> Vec<RankedAd> {
        self.rank_ads_for_user_at(user, Utc::now())
    }

    pub fn rank_ads_for_user_at(&self, user: &UserProfile, now: DateTime<Utc>) -> Vec<RankedAd> {
        let users = self.users.read();
        self.events.with_snapshot(|clicks, impressions| {
            let ctx = RankingContext {
                clicks,
                impressions,
                users_by_id: &users,
                now,
            };
            self.catalog.with_ads(|ads| self.ranker.rank(user, ads, &ctx))
        })
    }

    /// Unknown members get no ads.
    pub fn rank_ads_for_user_id(&self, user_id: &str) -> Vec<RankedAd> {
        match self.get_user(user_id) {
            Some(user) => self.rank_ads_for_user(&user),
            None => {
                debug!(user_id, "No profile for member, nothing ranked");
                Vec::new()
            }
        }
    }

    /// Ads for the member's feed slots with test creatives applied.
    /// Premium members see none.
    pub fn feed_ads(&self, user: &UserProfile) -> Vec<Ad> {
        self.feed_ads_at(user, Utc::now())
    }

    pub fn feed_ads_at(&self, user: &UserProfile, now: DateTime<Utc>) -> Vec<Ad> {
        if user.is_premium {
            debug!(user_id = %user.id, "Premium member, feed ads suppressed");
            return Vec::new();
        }
        let ranked = self.rank_ads_for_user_at(user, now);
        let mut slots = plan_feed_slots(&ranked);
        for ad in &mut slots {
            self.apply_test_creative(ad, &user.id);
        }
        slots
    }

    fn apply_test_creative(&self, ad: &mut Ad, user_id: &str) {
        let Some(test) = ad.ab_test_id.and_then(|id| self.tests.get_test(&id)) else {
            return;
        };
        let variant = match test.status {
            TestStatus::Running => ad
                .ab_variant
                .or_else(|| self.tests.assign_variant_for_user(&test.id, user_id)),
            TestStatus::Completed => test.winner,
            TestStatus::Paused => None,
        };
        if let Some(variant) = variant {
            apply_variant(ad, &test, variant);
        }
    }

    // ─── Events ────────────────────────────────────────────────────────────

    /// Log that `ad_id` was rendered for `user_id`. Returns false for unknown ads.
    pub fn record_impression(&self, ad_id: &str, user_id: &str) -> bool {
        self.record_impression_at(ad_id, user_id, Utc::now())
    }

    pub fn record_impression_at(&self, ad_id: &str, user_id: &str, now: DateTime<Utc>) -> bool {
        let Some(ad) = self.catalog.count_impression(ad_id) else {
            debug!(ad_id, "Impression for unknown ad ignored");
            return false;
        };
        self.events.record_impression(AdEvent::new(ad_id, user_id, now));
        self.forward_to_test(&ad, user_id, TestMetric::Impressions);
        true
    }

    /// Log a call-to-action click. Returns false for unknown ads.
    pub fn record_click(&self, ad_id: &str, user_id: &str) -> bool {
        self.record_click_at(ad_id, user_id, Utc::now())
    }

    pub fn record_click_at(&self, ad_id: &str, user_id: &str, now: DateTime<Utc>) -> bool {
        let Some(ad) = self.catalog.count_click(ad_id) else {
            debug!(ad_id, "Click for unknown ad ignored");
            return false;
        };
        self.events.record_click(AdEvent::new(ad_id, user_id, now));
        self.forward_to_test(&ad, user_id, TestMetric::Clicks);
        true
    }

    fn forward_to_test(&self, ad: &Ad, user_id: &str, metric: TestMetric) {
        let Some((test_id, variant)) = self.served_variant(ad, user_id) else {
            return;
        };
        self.tests.record_metric(&test_id, variant, metric, 1.0);
    }

    /// Test and variant the member saw for `ad`, when its test is running.
    fn served_variant(&self, ad: &Ad, user_id: &str) -> Option<(Uuid, Variant)> {
        let test_id = ad.ab_test_id?;
        let test = self.tests.get_test(&test_id)?;
        if !test.is_running() {
            return None;
        }
        let variant = ad
            .ab_variant
            .or_else(|| self.tests.assign_variant_for_user(&test_id, user_id))?;
        Some((test_id, variant))
    }

    /// Drop impressions past the retention window.
    pub fn compact_events(&self, now: DateTime<Utc>) -> usize {
        self.events.compact(now)
    }

    // ─── A/B tests ─────────────────────────────────────────────────────────

    /// Create a test and link it to its ad, when the request names one.
    pub fn create_ab_test(&self, req: NewAbTest) -> AdsResult<Uuid> {
        let ad_id = req.ad_id.clone();
        let id = self.tests.create_test(req, Utc::now())?;
        if let Some(ad_id) = ad_id {
            if !self.catalog.attach_ab_test(&ad_id, id, None) {
                warn!(test_id = %id, ad_id = %ad_id, "Test references an ad not in the catalog");
            }
        }
        Ok(id)
    }

    pub fn pause_ab_test(&self, id: &Uuid) -> bool {
        self.tests.pause(id)
    }

    pub fn declare_winner(&self, id: &Uuid, winner: Variant) -> bool {
        self.tests.declare_winner(id, winner)
    }

    pub fn evaluate_test(&self, id: &Uuid) -> Option<TestEvaluation> {
        self.tests.evaluate(id)
    }

    // ─── Reporting ─────────────────────────────────────────────────────────

    pub fn campaign_report(&self, filter: &AdFilter) -> CampaignReport {
        let campaigns = self.catalog.campaigns();
        self.catalog
            .with_ads(|ads| CampaignReport::build(ads, &campaigns, filter))
    }
}

impl Default for AdPlatform {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
