//! JSON fixture bundle used to seed a platform.

use feedads_core::error::AdsResult;
use feedads_core::types::{Ad, AdEvent, Campaign, UserProfile};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Every section is optional; missing sections load as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformFixtures {
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(default)]
    pub ads: Vec<Ad>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub impressions: Vec<AdEvent>,
    #[serde(default)]
    pub clicks: Vec<AdEvent>,
}

impl PlatformFixtures {
    pub fn from_json(json: &str) -> AdsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> AdsResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let fixtures = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            users = fixtures.users.len(),
            ads = fixtures.ads.len(),
            campaigns = fixtures.campaigns.len(),
            "Fixtures loaded"
        );
        Ok(fixtures)
    }
}
