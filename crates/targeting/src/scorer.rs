//! Relevance scoring for an eligible (member, ad) pair.
//!
//! Additive points, capped at 100:
//!   - industry match: 30
//!   - job title match: 20
//!   - location match: 15
//!   - skill overlap with targeted titles: 10
//!   - mutual connections at the advertiser's company: 10 each, at most 30

use crate::matcher::{industry_matches, job_title_matches, location_matches};
use feedads_core::types::{Ad, UserProfile};
use serde::Serialize;
use std::collections::HashMap;

const INDUSTRY_POINTS: u32 = 30;
const JOB_TITLE_POINTS: u32 = 20;
const LOCATION_POINTS: u32 = 15;
const SKILLS_POINTS: u32 = 10;
const MUTUAL_CONNECTION_POINTS: u32 = 10;
const MUTUAL_CONNECTION_CAP: u32 = 30;
const MAX_SCORE: u32 = 100;

/// Points earned per signal. Also used to explain an ad to the member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub industry: u32,
    pub job_title: u32,
    pub location: u32,
    pub skills: u32,
    pub mutual_connections: u32,
    pub mutual_connection_count: usize,
    pub total: u32,
}

impl ScoreBreakdown {
    /// Short descriptions of the signals that contributed.
    pub fn reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.industry > 0 {
            reasons.push("Your industry".to_string());
        }
        if self.job_title > 0 {
            reasons.push("Your job title".to_string());
        }
        if self.location > 0 {
            reasons.push("Your location".to_string());
        }
        if self.skills > 0 {
            reasons.push("Your skills".to_string());
        }
        if self.mutual_connection_count > 0 {
            reasons.push(format!(
                "{} connection(s) work at this company",
                self.mutual_connection_count
            ));
        }
        reasons
    }
}

pub fn relevance_score(
    user: &UserProfile,
    ad: &Ad,
    users_by_id: &HashMap<String, UserProfile>,
) -> u32 {
    score_breakdown(user, ad, users_by_id).total
}

pub fn score_breakdown(
    user: &UserProfile,
    ad: &Ad,
    users_by_id: &HashMap<String, UserProfile>,
) -> ScoreBreakdown {
    let targeting = &ad.targeting;
    let mut breakdown = ScoreBreakdown::default();

    if let Some(industry) = user.industry() {
        if industry_matches(industry, &targeting.industries) {
            breakdown.industry = INDUSTRY_POINTS;
        }
    }
    if job_title_matches(user.title(), &targeting.job_titles) {
        breakdown.job_title = JOB_TITLE_POINTS;
    }
    if location_matches(user.location.as_deref(), &targeting.locations) {
        breakdown.location = LOCATION_POINTS;
    }
    if skills_overlap(&user.skills, &targeting.job_titles) {
        breakdown.skills = SKILLS_POINTS;
    }

    let mutual = mutual_connection_count(user, ad, users_by_id);
    breakdown.mutual_connection_count = mutual;
    breakdown.mutual_connections =
        (mutual as u32).saturating_mul(MUTUAL_CONNECTION_POINTS).min(MUTUAL_CONNECTION_CAP);

    breakdown.total = (breakdown.industry
        + breakdown.job_title
        + breakdown.location
        + breakdown.skills
        + breakdown.mutual_connections)
        .min(MAX_SCORE);
    breakdown
}

/// Ads carry no skill targeting, so targeted job titles stand in for it:
/// any skill that shares a substring with any title word counts.
fn skills_overlap(skills: &[String], target_titles: &[String]) -> bool {
    let skills: Vec<String> = skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if skills.is_empty() {
        return false;
    }
    target_titles.iter().any(|title| {
        title.to_lowercase().split_whitespace().any(|word| {
            skills
                .iter()
                .any(|skill| skill.contains(word) || word.contains(skill.as_str()))
        })
    })
}

/// Connections whose current employer matches the advertiser's, case-insensitively.
fn mutual_connection_count(
    user: &UserProfile,
    ad: &Ad,
    users_by_id: &HashMap<String, UserProfile>,
) -> usize {
    let Some(company) = users_by_id
        .get(&ad.advertiser_id)
        .and_then(|advertiser| advertiser.company())
        .map(str::to_lowercase)
    else {
        return 0;
    };

    user.connections
        .iter()
        .filter_map(|id| users_by_id.get(id))
        .filter(|conn| conn.company().is_some_and(|c| c.to_lowercase() == company))
        .count()
}
