//! Campaign performance reports computed from the catalog's cumulative counters.

use feedads_core::types::{Ad, AdType, Campaign};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const TOP_INDUSTRIES: usize = 10;
const UNTARGETED_INDUSTRY: &str = "Other";

/// Restricts a report to one campaign and/or one ad format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdFilter {
    pub campaign_id: Option<String>,
    pub ad_type: Option<AdType>,
}

impl AdFilter {
    pub fn matches(&self, ad: &Ad) -> bool {
        if let Some(campaign_id) = &self.campaign_id {
            if ad.campaign_id.as_deref() != Some(campaign_id.as_str()) {
                return false;
            }
        }
        self.ad_type.map_or(true, |t| ad.ad_type == t)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub impressions: u64,
    pub clicks: u64,
    pub spent: f64,
    pub ctr_percent: f64,
}

/// Traffic-light grading of CTR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CtrTier {
    Green,
    Yellow,
    Red,
}

impl CtrTier {
    pub fn from_ctr_percent(ctr_percent: f64) -> Self {
        if ctr_percent >= 2.0 {
            CtrTier::Green
        } else if ctr_percent >= 1.0 {
            CtrTier::Yellow
        } else {
            CtrTier::Red
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignCtr {
    pub campaign_id: String,
    pub name: String,
    pub impressions: u64,
    pub clicks: u64,
    pub ctr_percent: f64,
    pub tier: CtrTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetShare {
    pub campaign_id: String,
    pub name: String,
    /// Rounded share of total campaign spend.
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryImpressions {
    pub industry: String,
    pub impressions: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Funnel {
    pub impressions: u64,
    pub clicks: u64,
    pub engagements: u64,
    pub conversions: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignReport {
    pub totals: Totals,
    pub campaign_ctr: Vec<CampaignCtr>,
    pub budget_share: Vec<BudgetShare>,
    pub industries: Vec<IndustryImpressions>,
    pub funnel: Funnel,
}

impl CampaignReport {
    pub fn build(ads: &[Ad], campaigns: &[Campaign], filter: &AdFilter) -> Self {
        let ads: Vec<&Ad> = ads.iter().filter(|ad| filter.matches(ad)).collect();
        Self {
            totals: totals(&ads),
            campaign_ctr: campaign_ctr(&ads, campaigns),
            budget_share: budget_share(campaigns),
            industries: impressions_by_industry(&ads),
            funnel: funnel(&ads, campaigns),
        }
    }
}

fn ctr_percent(clicks: u64, impressions: u64) -> f64 {
    if impressions == 0 {
        0.0
    } else {
        clicks as f64 / impressions as f64 * 100.0
    }
}

pub fn totals(ads: &[&Ad]) -> Totals {
    let impressions = ads.iter().map(|a| a.impressions).sum();
    let clicks = ads.iter().map(|a| a.clicks).sum();
    Totals {
        impressions,
        clicks,
        spent: ads.iter().map(|a| a.spent).sum(),
        ctr_percent: ctr_percent(clicks, impressions),
    }
}

/// CTR per campaign, in campaign order, for campaigns that have matching ads.
pub fn campaign_ctr(ads: &[&Ad], campaigns: &[Campaign]) -> Vec<CampaignCtr> {
    let mut by_campaign: HashMap<&str, (u64, u64)> = HashMap::new();
    for ad in ads {
        if let Some(campaign_id) = ad.campaign_id.as_deref() {
            let entry = by_campaign.entry(campaign_id).or_default();
            entry.0 += ad.impressions;
            entry.1 += ad.clicks;
        }
    }

    campaigns
        .iter()
        .filter_map(|c| {
            let (impressions, clicks) = *by_campaign.get(c.id.as_str())?;
            let ctr = ctr_percent(clicks, impressions);
            Some(CampaignCtr {
                campaign_id: c.id.clone(),
                name: c.name.clone(),
                impressions,
                clicks,
                ctr_percent: ctr,
                tier: CtrTier::from_ctr_percent(ctr),
            })
        })
        .collect()
}

/// Share of total spend per campaign. Empty when nothing has been spent.
pub fn budget_share(campaigns: &[Campaign]) -> Vec<BudgetShare> {
    let total: f64 = campaigns.iter().map(|c| c.spent.max(0.0)).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    campaigns
        .iter()
        .filter(|c| c.spent > 0.0)
        .map(|c| BudgetShare {
            campaign_id: c.id.clone(),
            name: c.name.clone(),
            percent: (c.spent / total * 100.0).round() as u32,
        })
        .collect()
}

/// Impressions attributed to each targeted industry, largest first, top 10.
pub fn impressions_by_industry(ads: &[&Ad]) -> Vec<IndustryImpressions> {
    let mut rows: Vec<IndustryImpressions> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for ad in ads {
        let industries: Vec<&str> = if ad.targeting.industries.is_empty() {
            vec![UNTARGETED_INDUSTRY]
        } else {
            ad.targeting.industries.iter().map(String::as_str).collect()
        };
        for industry in industries {
            let slot = *index.entry(industry.to_string()).or_insert_with(|| {
                rows.push(IndustryImpressions {
                    industry: industry.to_string(),
                    impressions: 0,
                });
                rows.len() - 1
            });
            rows[slot].impressions += ad.impressions;
        }
    }

    rows.sort_by(|a, b| b.impressions.cmp(&a.impressions));
    rows.truncate(TOP_INDUSTRIES);
    rows
}

/// Impressions → clicks → engagements → conversions for the matching ads.
pub fn funnel(ads: &[&Ad], campaigns: &[Campaign]) -> Funnel {
    let conversions = campaigns
        .iter()
        .filter(|c| ads.iter().any(|a| a.campaign_id.as_deref() == Some(c.id.as_str())))
        .map(|c| c.metrics.conversions)
        .sum();
    Funnel {
        impressions: ads.iter().map(|a| a.impressions).sum(),
        clicks: ads.iter().map(|a| a.clicks).sum(),
        engagements: ads.iter().map(|a| a.engagement.total()).sum(),
        conversions,
    }
}
