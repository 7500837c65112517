//! In-memory ad and campaign catalog.
//!
//! Ads are kept in insertion order; the ranker relies on it to break ties.

use feedads_core::types::{Ad, AdStatus, Campaign, Variant};
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

pub struct AdCatalog {
    ads: RwLock<Vec<Ad>>,
    campaigns: RwLock<Vec<Campaign>>,
}

impl AdCatalog {
    pub fn new() -> Self {
        Self {
            ads: RwLock::new(Vec::new()),
            campaigns: RwLock::new(Vec::new()),
        }
    }

    pub fn with_contents(ads: Vec<Ad>, campaigns: Vec<Campaign>) -> Self {
        info!(ads = ads.len(), campaigns = campaigns.len(), "Ad catalog loaded");
        Self {
            ads: RwLock::new(ads),
            campaigns: RwLock::new(campaigns),
        }
    }

    // ─── Ads ───────────────────────────────────────────────────────────────

    /// Add a new ad as a draft under a fresh id. Returns the id.
    pub fn add_ad(&self, mut ad: Ad) -> String {
        ad.id = format!("ad-{}", Uuid::new_v4().simple());
        ad.status = AdStatus::Draft;
        let id = ad.id.clone();

        if let Some(campaign_id) = ad.campaign_id.as_deref() {
            if let Some(campaign) = self.campaigns.write().iter_mut().find(|c| c.id == campaign_id) {
                campaign.ad_ids.push(id.clone());
            }
        }
        info!(ad_id = %id, campaign_id = ?ad.campaign_id, "Draft ad created");
        self.ads.write().push(ad);
        id
    }

    /// Insert an ad exactly as given, replacing any ad with the same id in place.
    pub fn upsert_ad(&self, ad: Ad) {
        let mut ads = self.ads.write();
        match ads.iter_mut().find(|a| a.id == ad.id) {
            Some(existing) => *existing = ad,
            None => ads.push(ad),
        }
    }

    pub fn get_ad(&self, id: &str) -> Option<Ad> {
        self.ads.read().iter().find(|a| a.id == id).cloned()
    }

    pub fn ads(&self) -> Vec<Ad> {
        self.ads.read().clone()
    }

    /// Borrow the ads in catalog order without cloning.
    pub fn with_ads<R>(&self, f: impl FnOnce(&[Ad]) -> R) -> R {
        f(&self.ads.read())
    }

    pub fn ads_with_status(&self, status: AdStatus) -> Vec<Ad> {
        self.ads
            .read()
            .iter()
            .filter(|a| a.status == status)
            .cloned()
            .collect()
    }

    pub fn ads_for_campaign(&self, campaign_id: &str) -> Vec<Ad> {
        self.ads
            .read()
            .iter()
            .filter(|a| a.campaign_id.as_deref() == Some(campaign_id))
            .cloned()
            .collect()
    }

    pub fn update_ad_status(&self, id: &str, status: AdStatus) -> bool {
        self.update_ad(id, |ad| ad.status = status).is_some()
    }

    /// Link an ad to an A/B test. `variant` pins every viewer to one creative;
    /// `None` lets each viewer be bucketed individually.
    pub fn attach_ab_test(&self, ad_id: &str, test_id: Uuid, variant: Option<Variant>) -> bool {
        self.update_ad(ad_id, |ad| {
            ad.ab_test_id = Some(test_id);
            ad.ab_variant = variant;
        })
        .is_some()
    }

    /// Bump the ad's and its campaign's cumulative impression counters.
    pub fn count_impression(&self, ad_id: &str) -> Option<Ad> {
        let ad = self.update_ad(ad_id, |ad| ad.impressions += 1)?;
        self.update_campaign_metrics(ad.campaign_id.as_deref(), |c| c.metrics.impressions += 1);
        Some(ad)
    }

    /// Bump the ad's and its campaign's cumulative click counters.
    pub fn count_click(&self, ad_id: &str) -> Option<Ad> {
        let ad = self.update_ad(ad_id, |ad| ad.clicks += 1)?;
        self.update_campaign_metrics(ad.campaign_id.as_deref(), |c| c.metrics.clicks += 1);
        Some(ad)
    }

    fn update_ad(&self, id: &str, f: impl FnOnce(&mut Ad)) -> Option<Ad> {
        let mut ads = self.ads.write();
        let ad = ads.iter_mut().find(|a| a.id == id)?;
        f(ad);
        Some(ad.clone())
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    pub fn upsert_campaign(&self, campaign: Campaign) {
        let mut campaigns = self.campaigns.write();
        match campaigns.iter_mut().find(|c| c.id == campaign.id) {
            Some(existing) => *existing = campaign,
            None => campaigns.push(campaign),
        }
    }

    pub fn get_campaign(&self, id: &str) -> Option<Campaign> {
        self.campaigns.read().iter().find(|c| c.id == id).cloned()
    }

    pub fn campaigns(&self) -> Vec<Campaign> {
        self.campaigns.read().clone()
    }

    fn update_campaign_metrics(&self, campaign_id: Option<&str>, f: impl FnOnce(&mut Campaign)) {
        let Some(campaign_id) = campaign_id else {
            return;
        };
        if let Some(campaign) = self.campaigns.write().iter_mut().find(|c| c.id == campaign_id) {
            f(campaign);
        }
    }
}

impl Default for AdCatalog {
    fn default() -> Self {
        Self::new()
    }
}
