use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ─── Members ────────────────────────────────────────────────────────────

/// Current job of a member.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

/// Member profile used for targeting. Advertisers are members too.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    /// Free text such as "San Francisco, CA".
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub current_position: Option<Position>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub connections: Vec<String>,
    /// Ad-free entitlement.
    #[serde(default)]
    pub is_premium: bool,
}

impl UserProfile {
    pub fn title(&self) -> Option<&str> {
        self.current_position
            .as_ref()
            .and_then(|p| p.title.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn company(&self) -> Option<&str> {
        self.current_position
            .as_ref()
            .and_then(|p| p.company.as_deref())
            .filter(|c| !c.trim().is_empty())
    }

    pub fn industry(&self) -> Option<&str> {
        self.industry.as_deref().filter(|i| !i.trim().is_empty())
    }

    /// Location text before the first comma, trimmed. Empty when unknown.
    pub fn normalized_location(&self) -> &str {
        normalize_location(self.location.as_deref().unwrap_or(""))
    }

    /// Seniority inferred from the job title, falling back to the headline.
    pub fn seniority(&self) -> Seniority {
        let title = self
            .title()
            .or(self.headline.as_deref())
            .unwrap_or_default();
        Seniority::infer(title)
    }
}

/// "San Francisco, CA" -> "San Francisco".
pub fn normalize_location(location: &str) -> &str {
    location.split(',').next().unwrap_or("").trim()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Seniority {
    Entry,
    Mid,
    Senior,
}

const ENTRY_KEYWORDS: &[&str] = &["intern", "junior", "entry"];
const SENIOR_KEYWORDS: &[&str] = &[
    "senior",
    "staff",
    "principal",
    "lead",
    "director",
    "vp",
    "vice president",
    "manager",
    "head of",
];

impl Seniority {
    /// Keyword heuristic over a job title. Entry keywords win over senior ones.
    pub fn infer(title: &str) -> Self {
        let t = title.to_lowercase();
        if ENTRY_KEYWORDS.iter().any(|k| t.contains(k)) || has_entry_associate(&t) {
            return Seniority::Entry;
        }
        if SENIOR_KEYWORDS.iter().any(|k| t.contains(k)) {
            return Seniority::Senior;
        }
        Seniority::Mid
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Entry => "Entry",
            Seniority::Mid => "Mid",
            Seniority::Senior => "Senior",
        }
    }
}

/// "associate" counts as entry level unless it is an "associate partner".
fn has_entry_associate(title: &str) -> bool {
    title.match_indices("associate").any(|(idx, word)| {
        !title[idx + word.len()..]
            .trim_start()
            .starts_with("partner")
    })
}

impl fmt::Display for Seniority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Ads & Campaigns ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AdStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AdType {
    SponsoredPost,
    SponsoredVideo,
}

/// Targeting criteria. OR within a list, AND across lists, empty list matches everyone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Targeting {
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default)]
    pub job_titles: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub seniority_levels: Vec<String>,
}

/// Creative content of an ad or of an A/B test variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdContent {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub cta_text: Option<String>,
    #[serde(default)]
    pub cta_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Engagement {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
}

impl Engagement {
    pub fn total(&self) -> u64 {
        self.likes + self.comments + self.shares
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ad {
    pub id: String,
    pub advertiser_id: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
    pub status: AdStatus,
    #[serde(rename = "type")]
    pub ad_type: AdType,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub spent: f64,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub targeting: Targeting,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub content: Option<AdContent>,
    /// Legacy headline, used when `content` carries none.
    #[serde(default)]
    pub title: Option<String>,
    /// Legacy description, used when `content` carries none.
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub engagement: Engagement,
    #[serde(default)]
    pub ab_test_id: Option<Uuid>,
    #[serde(default)]
    pub ab_variant: Option<Variant>,
}

impl Ad {
    /// Minimal active sponsored post with no targeting.
    pub fn new(id: impl Into<String>, advertiser_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            advertiser_id: advertiser_id.into(),
            campaign_id: None,
            status: AdStatus::Active,
            ad_type: AdType::SponsoredPost,
            budget: 0.0,
            spent: 0.0,
            start_date: None,
            end_date: None,
            targeting: Targeting::default(),
            impressions: 0,
            clicks: 0,
            content: None,
            title: None,
            body: None,
            engagement: Engagement::default(),
            ab_test_id: None,
            ab_variant: None,
        }
    }

    pub fn headline(&self) -> &str {
        self.content
            .as_ref()
            .map(|c| c.headline.as_str())
            .filter(|h| !h.is_empty())
            .or(self.title.as_deref())
            .unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.content
            .as_ref()
            .map(|c| c.description.as_str())
            .filter(|d| !d.is_empty())
            .or(self.body.as_deref())
            .unwrap_or_default()
    }

    pub fn is_video(&self) -> bool {
        self.ad_type == AdType::SponsoredVideo
    }

    pub fn remaining_budget(&self) -> f64 {
        (self.budget - self.spent).max(0.0)
    }

    pub fn is_budget_exhausted(&self) -> bool {
        self.spent >= self.budget
    }

    /// Test and variant this ad is serving, when attached to an A/B test.
    pub fn ab_assignment(&self) -> Option<(Uuid, Variant)> {
        Some((self.ab_test_id?, self.ab_variant?))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignMetrics {
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub conversions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub advertiser_id: String,
    pub name: String,
    pub status: AdStatus,
    #[serde(default)]
    pub budget: f64,
    #[serde(default)]
    pub spent: f64,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub ad_ids: Vec<String>,
    #[serde(default)]
    pub metrics: CampaignMetrics,
}

// ─── Events ─────────────────────────────────────────────────────────────

/// Impression or click record. Logs of these are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdEvent {
    pub ad_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

impl AdEvent {
    pub fn new(ad_id: impl Into<String>, user_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            ad_id: ad_id.into(),
            user_id: user_id.into(),
            timestamp,
        }
    }

    pub fn matches(&self, user_id: &str, ad_id: &str) -> bool {
        self.ad_id == ad_id && self.user_id == user_id
    }

    /// True when the event falls on the given UTC calendar day.
    pub fn occurred_on(&self, day: NaiveDate) -> bool {
        self.timestamp.date_naive() == day
    }
}

// ─── A/B Tests ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Variant {
    A,
    B,
}

impl Variant {
    pub fn other(self) -> Self {
        match self {
            Variant::A => Variant::B,
            Variant::B => Variant::A,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::A => f.write_str("A"),
            Variant::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Running,
    Paused,
    Completed,
}

/// Per-variant counters. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct VariantMetrics {
    pub impressions: u64,
    pub clicks: u64,
    pub engagements: u64,
    pub spent: f64,
}

impl VariantMetrics {
    pub fn new(impressions: u64, clicks: u64) -> Self {
        Self {
            impressions,
            clicks,
            ..Default::default()
        }
    }

    /// Clicks over impressions, 0 when nothing was shown.
    pub fn ctr(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.clicks as f64 / self.impressions as f64
        }
    }

    /// Spend per click, `None` when there are no clicks.
    pub fn cost_per_click(&self) -> Option<f64> {
        if self.clicks == 0 {
            None
        } else {
            Some(self.spent / self.clicks as f64)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbTest {
    pub id: Uuid,
    pub campaign_id: String,
    pub ad_id: Option<String>,
    pub name: String,
    pub variant_a: AdContent,
    pub variant_b: AdContent,
    /// Share of traffic for variant A, 0-100.
    pub split_percent: u8,
    pub duration_days: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: TestStatus,
    pub winner: Option<Variant>,
    pub metrics_a: VariantMetrics,
    pub metrics_b: VariantMetrics,
}

impl AbTest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        campaign_id: impl Into<String>,
        ad_id: Option<String>,
        name: impl Into<String>,
        variant_a: AdContent,
        variant_b: AdContent,
        split_percent: u8,
        duration_days: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id: campaign_id.into(),
            ad_id,
            name: name.into(),
            variant_a,
            variant_b,
            split_percent: split_percent.min(100),
            duration_days,
            start_date: started_at,
            end_date: started_at + Duration::days(i64::from(duration_days)),
            status: TestStatus::Running,
            winner: None,
            metrics_a: VariantMetrics::default(),
            metrics_b: VariantMetrics::default(),
        }
    }

    pub fn metrics(&self, variant: Variant) -> &VariantMetrics {
        match variant {
            Variant::A => &self.metrics_a,
            Variant::B => &self.metrics_b,
        }
    }

    pub fn metrics_mut(&mut self, variant: Variant) -> &mut VariantMetrics {
        match variant {
            Variant::A => &mut self.metrics_a,
            Variant::B => &mut self.metrics_b,
        }
    }

    pub fn creative(&self, variant: Variant) -> &AdContent {
        match variant {
            Variant::A => &self.variant_a,
            Variant::B => &self.variant_b,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TestStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("San Francisco, CA"), "San Francisco");
        assert_eq!(normalize_location("  Berlin "), "Berlin");
        assert_eq!(normalize_location(""), "");
        assert_eq!(normalize_location(", Somewhere"), "");
    }

    #[test]
    fn test_seniority_inference() {
        assert_eq!(Seniority::infer("Software Engineering Intern"), Seniority::Entry);
        assert_eq!(Seniority::infer("Junior Developer"), Seniority::Entry);
        assert_eq!(Seniority::infer("Associate Product Manager"), Seniority::Entry);
        assert_eq!(Seniority::infer("Associate Partner"), Seniority::Mid);
        assert_eq!(Seniority::infer("Senior Software Engineer"), Seniority::Senior);
        assert_eq!(Seniority::infer("Head of Growth"), Seniority::Senior);
        assert_eq!(Seniority::infer("VP Engineering"), Seniority::Senior);
        assert_eq!(Seniority::infer("Software Engineer"), Seniority::Mid);
        assert_eq!(Seniority::infer(""), Seniority::Mid);
    }

    #[test]
    fn test_seniority_falls_back_to_headline() {
        let user = UserProfile {
            id: "u1".to_string(),
            headline: Some("Staff Engineer at Acme".to_string()),
            ..Default::default()
        };
        assert_eq!(user.seniority(), Seniority::Senior);
    }

    #[test]
    fn test_ad_content_fallbacks() {
        let mut ad = Ad::new("ad1", "u9");
        ad.title = Some("Legacy title".to_string());
        ad.body = Some("Legacy body".to_string());
        assert_eq!(ad.headline(), "Legacy title");
        assert_eq!(ad.description(), "Legacy body");

        ad.content = Some(AdContent {
            headline: "Fresh headline".to_string(),
            ..Default::default()
        });
        assert_eq!(ad.headline(), "Fresh headline");
        assert_eq!(ad.description(), "Legacy body");
    }

    #[test]
    fn test_ad_deserializes_fixture_shape() {
        let json = r#"{
            "id": "ad1",
            "advertiserId": "u5",
            "campaignId": "c1",
            "status": "active",
            "type": "sponsored_video",
            "budget": 5000,
            "spent": 1200.5,
            "startDate": "2026-01-01",
            "endDate": "2026-12-31",
            "targeting": {"industries": ["Technology"], "seniorityLevels": ["Senior"]},
            "impressions": 900,
            "clicks": 27,
            "content": {"headline": "Build faster", "ctaText": "Learn more"}
        }"#;
        let ad: Ad = serde_json::from_str(json).unwrap();
        assert!(ad.is_video());
        assert_eq!(ad.targeting.industries, vec!["Technology"]);
        assert!(ad.targeting.job_titles.is_empty());
        assert_eq!(ad.start_date, NaiveDate::from_ymd_opt(2026, 1, 1));
        assert!((ad.remaining_budget() - 3799.5).abs() < 1e-9);
        assert!(ad.ab_assignment().is_none());
    }

    #[test]
    fn test_abtest_end_date_and_split_clamp() {
        let start = Utc::now();
        let test = AbTest::new(
            "c1",
            None,
            "Headline test",
            AdContent::default(),
            AdContent::default(),
            150,
            7,
            start,
        );
        assert_eq!(test.split_percent, 100);
        assert_eq!(test.end_date - test.start_date, Duration::days(7));
        assert!(test.is_running());
        assert_eq!(test.metrics(Variant::B), &VariantMetrics::default());
    }

    #[test]
    fn test_variant_metric_ratios() {
        let mut m = VariantMetrics::new(200, 10);
        assert!((m.ctr() - 0.05).abs() < 1e-12);
        assert_eq!(m.cost_per_click(), Some(0.0));
        m.spent = 25.0;
        assert_eq!(m.cost_per_click(), Some(2.5));
        assert_eq!(VariantMetrics::default().ctr(), 0.0);
        assert_eq!(VariantMetrics::default().cost_per_click(), None);
    }
}
