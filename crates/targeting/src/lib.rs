//! Ad targeting and ranking: eligibility matching, relevance scoring,
//! frequency capping, and the blended ranker with video backfill.

pub mod frequency_capping;
pub mod matcher;
pub mod ranker;
pub mod scorer;

pub use frequency_capping::FrequencyCapper;
pub use matcher::{eligibility, is_eligible, Exclusion};
pub use ranker::{AdRanker, RankedAd, RankingContext};
pub use scorer::{relevance_score, score_breakdown, ScoreBreakdown};
