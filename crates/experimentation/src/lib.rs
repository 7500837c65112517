//! A/B testing for ad creatives: experiment lifecycle, variant assignment,
//! per-variant metrics, and two-proportion significance testing.

pub mod engine;
pub mod stats;

pub use engine::{AbTestEngine, NewAbTest, TestEvaluation, TestMetric};
pub use stats::{evaluate_significance, winner_by_ctr, SignificanceResult, VariantStats};
