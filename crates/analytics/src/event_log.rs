//! Append-only impression and click log.
//!
//! Clicks are kept forever so click suppression stays permanent. Impressions
//! older than the retention window can be compacted away; the window is at
//! least one day so the daily frequency cap never loses data.

use chrono::{DateTime, Duration, Utc};
use feedads_core::config::EventLogConfig;
use feedads_core::types::AdEvent;
use parking_lot::RwLock;
use tracing::{debug, info};

pub struct EventLog {
    impressions: RwLock<Vec<AdEvent>>,
    clicks: RwLock<Vec<AdEvent>>,
    retention_days: u32,
}

impl EventLog {
    pub fn new(config: &EventLogConfig) -> Self {
        info!(
            retention_days = config.impression_retention_days,
            "Event log initialized"
        );
        Self {
            impressions: RwLock::new(Vec::new()),
            clicks: RwLock::new(Vec::new()),
            retention_days: config.impression_retention_days,
        }
    }

    /// Seed the log with historical events, e.g. from fixtures.
    pub fn with_events(config: &EventLogConfig, impressions: Vec<AdEvent>, clicks: Vec<AdEvent>) -> Self {
        let log = Self::new(config);
        *log.impressions.write() = impressions;
        *log.clicks.write() = clicks;
        log
    }

    pub fn record_impression(&self, event: AdEvent) {
        debug!(ad_id = %event.ad_id, user_id = %event.user_id, "Impression recorded");
        metrics::counter!("feedads.impressions").increment(1);
        self.impressions.write().push(event);
    }

    pub fn record_click(&self, event: AdEvent) {
        debug!(ad_id = %event.ad_id, user_id = %event.user_id, "Click recorded");
        metrics::counter!("feedads.clicks").increment(1);
        self.clicks.write().push(event);
    }

    /// Run `f` over (clicks, impressions) without copying either log.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&[AdEvent], &[AdEvent]) -> R) -> R {
        // Always clicks before impressions, so readers never deadlock with compaction.
        let clicks = self.clicks.read();
        let impressions = self.impressions.read();
        f(&clicks, &impressions)
    }

    pub fn impressions(&self) -> Vec<AdEvent> {
        self.impressions.read().clone()
    }

    pub fn clicks(&self) -> Vec<AdEvent> {
        self.clicks.read().clone()
    }

    pub fn impression_count(&self) -> usize {
        self.impressions.read().len()
    }

    pub fn click_count(&self) -> usize {
        self.clicks.read().len()
    }

    /// Drop impressions from before the retention window. Returns how many were removed.
    pub fn compact(&self, now: DateTime<Utc>) -> usize {
        if self.retention_days == 0 {
            return 0;
        }
        let cutoff = now.date_naive() - Duration::days(i64::from(self.retention_days.max(1)));

        let mut impressions = self.impressions.write();
        let before = impressions.len();
        impressions.retain(|e| e.timestamp.date_naive() > cutoff);
        let removed = before - impressions.len();
        if removed > 0 {
            info!(removed, retained = impressions.len(), "Compacted impression log");
        }
        removed
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(&EventLogConfig::default())
    }
}
