//! Frequency capping: suppresses ads a member already clicked or has seen
//! too often today.

use chrono::{DateTime, Utc};
use feedads_core::config::FrequencyConfig;
use feedads_core::types::AdEvent;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FrequencyCapper {
    max_impressions_per_day: usize,
    suppress_after_click: bool,
}

impl FrequencyCapper {
    pub fn new(config: &FrequencyConfig) -> Self {
        Self {
            max_impressions_per_day: config.max_impressions_per_day,
            suppress_after_click: config.suppress_after_click,
        }
    }

    /// True when the ad must not be shown to this member again right now.
    ///
    /// A single click suppresses the ad for good. Otherwise impressions are
    /// counted over the UTC calendar day of `now`.
    pub fn is_capped(
        &self,
        user_id: &str,
        ad_id: &str,
        clicks: &[AdEvent],
        impressions: &[AdEvent],
        now: DateTime<Utc>,
    ) -> bool {
        if user_id.is_empty() || ad_id.is_empty() {
            return false;
        }

        if self.suppress_after_click && clicks.iter().any(|c| c.matches(user_id, ad_id)) {
            debug!(user_id, ad_id, "Ad suppressed after click");
            return true;
        }

        let seen_today = Self::impressions_today(user_id, ad_id, impressions, now);
        if seen_today >= self.max_impressions_per_day {
            debug!(user_id, ad_id, seen_today, "Daily impression cap reached");
            return true;
        }
        false
    }

    pub fn impressions_today(
        user_id: &str,
        ad_id: &str,
        impressions: &[AdEvent],
        now: DateTime<Utc>,
    ) -> usize {
        let today = now.date_naive();
        impressions
            .iter()
            .filter(|i| i.matches(user_id, ad_id) && i.occurred_on(today))
            .count()
    }
}

impl Default for FrequencyCapper {
    fn default() -> Self {
        Self::new(&FrequencyConfig::default())
    }
}
