//! Targeting matcher: decides whether a single ad may be shown to a single member.
//!
//! Every non-empty targeting list must be satisfied (AND across lists, OR within
//! a list). Profile fields the member left blank skip the matching check.

use chrono::{DateTime, Utc};
use feedads_core::types::{normalize_location, Ad, AdStatus, UserProfile};
use serde::Serialize;
use std::fmt;

/// Why an ad was excluded for a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    NotActive,
    BudgetExhausted,
    NotStarted,
    Ended,
    Industry,
    JobTitle,
    Location,
    Seniority,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Exclusion::NotActive => "ad is not active",
            Exclusion::BudgetExhausted => "budget exhausted",
            Exclusion::NotStarted => "flight has not started",
            Exclusion::Ended => "flight has ended",
            Exclusion::Industry => "industry not targeted",
            Exclusion::JobTitle => "job title not targeted",
            Exclusion::Location => "location not targeted",
            Exclusion::Seniority => "seniority not targeted",
        };
        f.write_str(reason)
    }
}

pub fn is_eligible(user: &UserProfile, ad: &Ad, now: DateTime<Utc>) -> bool {
    eligibility(user, ad, now).is_ok()
}

/// Run every check in order and report the first one that fails.
pub fn eligibility(user: &UserProfile, ad: &Ad, now: DateTime<Utc>) -> Result<(), Exclusion> {
    if ad.status != AdStatus::Active {
        return Err(Exclusion::NotActive);
    }
    if ad.is_budget_exhausted() {
        return Err(Exclusion::BudgetExhausted);
    }

    let today = now.date_naive();
    if ad.start_date.is_some_and(|start| today < start) {
        return Err(Exclusion::NotStarted);
    }
    if ad.end_date.is_some_and(|end| today > end) {
        return Err(Exclusion::Ended);
    }

    let targeting = &ad.targeting;
    if let Some(industry) = user.industry() {
        if !targeting.industries.is_empty() && !industry_matches(industry, &targeting.industries) {
            return Err(Exclusion::Industry);
        }
    }

    if let Some(title) = user.title() {
        if !targeting.job_titles.is_empty() && !job_title_matches(Some(title), &targeting.job_titles) {
            return Err(Exclusion::JobTitle);
        }
    }

    if !location_matches(user.location.as_deref(), &targeting.locations) {
        return Err(Exclusion::Location);
    }

    if !targeting.seniority_levels.is_empty() {
        let seniority = user.seniority();
        if !targeting
            .seniority_levels
            .iter()
            .any(|level| level.eq_ignore_ascii_case(seniority.as_str()))
        {
            return Err(Exclusion::Seniority);
        }
    }

    Ok(())
}

/// Case-insensitive exact membership.
pub fn industry_matches(industry: &str, targets: &[String]) -> bool {
    let industry = industry.to_lowercase();
    targets.iter().any(|t| t.to_lowercase() == industry)
}

/// Case-insensitive substring match in either direction.
/// False when there is no title or no targeted titles.
pub fn job_title_matches(title: Option<&str>, targets: &[String]) -> bool {
    let Some(title) = title else {
        return false;
    };
    let title = title.to_lowercase();
    targets.iter().any(|t| {
        let t = t.to_lowercase();
        title.contains(&t) || t.contains(&title)
    })
}

/// Matches the city part of the member location against target locations.
/// "Remote" and "Global" targets match everyone; an empty target list matches too.
pub fn location_matches(location: Option<&str>, targets: &[String]) -> bool {
    if targets.is_empty() {
        return true;
    }
    let normalized = normalize_location(location.unwrap_or_default()).to_lowercase();
    targets.iter().any(|target| {
        let t = target.to_lowercase();
        if t == "remote" || t == "global" {
            return true;
        }
        !normalized.is_empty() && (normalized.contains(&t) || t.contains(&normalized))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use feedads_core::types::{Position, Targeting};

    fn engineer() -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            industry: Some("Technology".to_string()),
            location: Some("San Francisco, CA".to_string()),
            current_position: Some(Position {
                title: Some("Senior Software Engineer".to_string()),
                company: Some("Tech Co".to_string()),
            }),
            ..Default::default()
        }
    }

    fn targeted_ad() -> Ad {
        let mut ad = Ad::new("ad1", "adv1");
        ad.budget = 1000.0;
        ad.spent = 200.0;
        ad.targeting = Targeting {
            industries: vec!["technology".to_string()],
            job_titles: vec!["Engineer".to_string()],
            locations: vec!["San Francisco".to_string()],
            seniority_levels: vec!["senior".to_string()],
        };
        ad
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_fully_matching_ad_is_eligible() {
        assert_eq!(eligibility(&engineer(), &targeted_ad(), now()), Ok(()));
    }

    #[test]
    fn test_each_dimension_is_required() {
        let user = engineer();

        let mut ad = targeted_ad();
        ad.targeting.industries = vec!["Finance".to_string()];
        assert_eq!(eligibility(&user, &ad, now()), Err(Exclusion::Industry));

        let mut ad = targeted_ad();
        ad.targeting.job_titles = vec!["Accountant".to_string()];
        assert_eq!(eligibility(&user, &ad, now()), Err(Exclusion::JobTitle));

        let mut ad = targeted_ad();
        ad.targeting.locations = vec!["London".to_string()];
        assert_eq!(eligibility(&user, &ad, now()), Err(Exclusion::Location));

        let mut ad = targeted_ad();
        ad.targeting.seniority_levels = vec!["Entry".to_string()];
        assert_eq!(eligibility(&user, &ad, now()), Err(Exclusion::Seniority));
    }

    #[test]
    fn test_status_and_budget_checks() {
        let user = engineer();

        let mut ad = targeted_ad();
        ad.status = AdStatus::Paused;
        assert_eq!(eligibility(&user, &ad, now()), Err(Exclusion::NotActive));

        let mut ad = targeted_ad();
        ad.spent = ad.budget;
        assert_eq!(eligibility(&user, &ad, now()), Err(Exclusion::BudgetExhausted));
    }

    #[test]
    fn test_flight_window_is_inclusive() {
        let user = engineer();
        let today = now().date_naive();

        let mut ad = targeted_ad();
        ad.start_date = Some(today);
        ad.end_date = Some(today);
        assert!(is_eligible(&user, &ad, now()));

        ad.start_date = NaiveDate::from_ymd_opt(2026, 3, 11);
        ad.end_date = None;
        assert_eq!(eligibility(&user, &ad, now()), Err(Exclusion::NotStarted));

        ad.start_date = None;
        ad.end_date = NaiveDate::from_ymd_opt(2026, 3, 9);
        assert_eq!(eligibility(&user, &ad, now()), Err(Exclusion::Ended));
    }

    #[test]
    fn test_missing_profile_fields_skip_checks() {
        let user = UserProfile {
            id: "u2".to_string(),
            location: Some("San Francisco".to_string()),
            ..Default::default()
        };
        let mut ad = targeted_ad();
        ad.targeting.seniority_levels.clear();
        // No industry and no title: both checks are skipped.
        assert!(is_eligible(&user, &ad, now()));
    }

    #[test]
    fn test_empty_targeting_is_wildcard() {
        let mut ad = targeted_ad();
        ad.targeting = Targeting::default();
        let user = UserProfile {
            id: "u3".to_string(),
            ..Default::default()
        };
        assert!(is_eligible(&user, &ad, now()));
    }

    #[test]
    fn test_location_rules() {
        let remote = vec!["Remote".to_string()];
        let sf = vec!["San Francisco".to_string()];
        assert!(location_matches(None, &[]));
        assert!(location_matches(None, &remote));
        assert!(location_matches(Some(""), &["GLOBAL".to_string()]));
        assert!(!location_matches(None, &sf));
        assert!(location_matches(Some("San Francisco Bay Area, CA"), &sf));
        assert!(location_matches(Some("Francisco"), &sf));
        assert!(!location_matches(Some("Austin, TX"), &sf));
        assert!(location_matches(Some("Austin, TX"), &remote));
    }

    #[test]
    fn test_job_title_substring_both_directions() {
        let targets = vec!["Senior Software Engineer II".to_string()];
        assert!(job_title_matches(Some("software engineer"), &targets));
        assert!(job_title_matches(Some("Senior Software Engineer II, Payments"), &targets));
        assert!(!job_title_matches(Some("Designer"), &targets));
        assert!(!job_title_matches(None, &targets));
        assert!(!job_title_matches(Some("Designer"), &[]));
    }
}
