//! Ad ranker: filters the catalog for a member, blends relevance, bid and
//! historical CTR into a final score, and guarantees one video ad when any
//! eligible video exists.

use crate::frequency_capping::FrequencyCapper;
use crate::matcher::eligibility;
use crate::scorer::{score_breakdown, ScoreBreakdown};
use chrono::{DateTime, Utc};
use feedads_core::config::{FrequencyConfig, RankingConfig};
use feedads_core::types::{Ad, AdEvent, UserProfile};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Read-only inputs for a ranking call.
#[derive(Debug, Clone, Copy)]
pub struct RankingContext<'a> {
    pub clicks: &'a [AdEvent],
    pub impressions: &'a [AdEvent],
    pub users_by_id: &'a HashMap<String, UserProfile>,
    pub now: DateTime<Utc>,
}

/// An ad selected for a member, with the signals behind its position.
#[derive(Debug, Clone, Serialize)]
pub struct RankedAd {
    pub ad: Ad,
    pub relevance_score: u32,
    /// Remaining budget normalized to 0..=1.
    pub bid_amount: f64,
    /// Clicks over impressions, 0..=1.
    pub historical_ctr: f64,
    pub final_score: f64,
    pub breakdown: ScoreBreakdown,
    /// Pulled in by the video backfill rule rather than by score.
    pub backfilled: bool,
}

pub struct AdRanker {
    config: RankingConfig,
    capper: FrequencyCapper,
}

impl AdRanker {
    pub fn new(config: RankingConfig, frequency: &FrequencyConfig) -> Self {
        Self {
            config,
            capper: FrequencyCapper::new(frequency),
        }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Rank `ads` for `user`. Output is deterministic for identical inputs:
    /// ties keep catalog order.
    pub fn rank(&self, user: &UserProfile, ads: &[Ad], ctx: &RankingContext<'_>) -> Vec<RankedAd> {
        metrics::counter!("feedads.ranker.requests").increment(1);

        let mut scored: Vec<RankedAd> = ads
            .iter()
            .filter(|ad| self.survives(user, ad, ctx))
            .map(|ad| self.score(user, ad, ctx.users_by_id))
            .collect();

        // Vec::sort_by is stable, so equal scores keep catalog order.
        scored.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let best_video = scored.iter().position(|r| r.ad.is_video());
        let limit = self.config.max_results.min(scored.len());
        let has_video_in_top = best_video.is_some_and(|idx| idx < limit);

        if self.config.video_backfill && !has_video_in_top && limit > 0 {
            if let Some(video_idx) = best_video {
                // The video sits below the cut, so removing it leaves the top slots untouched.
                let mut video = scored.remove(video_idx);
                video.backfilled = true;
                scored.truncate(limit - 1);
                debug!(
                    user_id = %user.id,
                    ad_id = %video.ad.id,
                    "Video ad backfilled into last slot"
                );
                scored.push(video);
                return scored;
            }
        }

        scored.truncate(limit);
        scored
    }

    fn survives(&self, user: &UserProfile, ad: &Ad, ctx: &RankingContext<'_>) -> bool {
        if let Err(reason) = eligibility(user, ad, ctx.now) {
            debug!(user_id = %user.id, ad_id = %ad.id, %reason, "Ad filtered");
            return false;
        }
        if self
            .capper
            .is_capped(&user.id, &ad.id, ctx.clicks, ctx.impressions, ctx.now)
        {
            metrics::counter!("feedads.ranker.capped").increment(1);
            return false;
        }
        true
    }

    fn score(&self, user: &UserProfile, ad: &Ad, users_by_id: &HashMap<String, UserProfile>) -> RankedAd {
        let breakdown = score_breakdown(user, ad, users_by_id);
        let bid_amount = self.bid_amount(ad);
        let historical_ctr = historical_ctr(ad);
        let final_score = self.config.relevance_weight * f64::from(breakdown.total)
            + self.config.bid_weight * (bid_amount * 100.0)
            + self.config.ctr_weight * (historical_ctr * 100.0);

        RankedAd {
            ad: ad.clone(),
            relevance_score: breakdown.total,
            bid_amount,
            historical_ctr,
            final_score,
            breakdown,
            backfilled: false,
        }
    }

    /// Remaining budget as a 0..=1 willingness-to-pay proxy.
    pub fn bid_amount(&self, ad: &Ad) -> f64 {
        if self.config.bid_normalizer <= 0.0 {
            return 0.0;
        }
        (ad.remaining_budget() / self.config.bid_normalizer).min(1.0)
    }
}

impl Default for AdRanker {
    fn default() -> Self {
        Self::new(RankingConfig::default(), &FrequencyConfig::default())
    }
}

/// Cumulative clicks over impressions, clamped to 1. Zero before any impression.
pub fn historical_ctr(ad: &Ad) -> f64 {
    if ad.impressions == 0 {
        return 0.0;
    }
    (ad.clicks as f64 / ad.impressions as f64).min(1.0)
}
