//! Statistics for two-variant creative tests.

use feedads_core::config::ExperimentConfig;
use feedads_core::types::{Variant, VariantMetrics};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    pub significant: bool,
    /// Two-tailed p-value.
    pub p_value: f64,
    pub confidence_percent: u32,
}

impl SignificanceResult {
    fn inconclusive() -> Self {
        Self {
            significant: false,
            p_value: 1.0,
            confidence_percent: 0,
        }
    }
}

/// Display-ready numbers for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariantStats {
    pub impressions: u64,
    pub clicks: u64,
    pub ctr_percent: f64,
    pub engagements: u64,
    pub spent: f64,
    /// `None` until the variant has at least one click.
    pub cost_per_click: Option<f64>,
}

impl From<&VariantMetrics> for VariantStats {
    fn from(m: &VariantMetrics) -> Self {
        Self {
            impressions: m.impressions,
            clicks: m.clicks,
            ctr_percent: m.ctr() * 100.0,
            engagements: m.engagements,
            spent: m.spent,
            cost_per_click: m.cost_per_click(),
        }
    }
}

/// Two-proportion z-test on CTR with the default thresholds
/// (30 impressions per variant, alpha 0.05, confidence capped at 99%).
pub fn evaluate_significance(a: &VariantMetrics, b: &VariantMetrics) -> SignificanceResult {
    evaluate_significance_with(a, b, &ExperimentConfig::default())
}

pub fn evaluate_significance_with(
    a: &VariantMetrics,
    b: &VariantMetrics,
    config: &ExperimentConfig,
) -> SignificanceResult {
    if a.impressions < config.min_sample_size || b.impressions < config.min_sample_size {
        return SignificanceResult::inconclusive();
    }

    let (n1, n2) = (a.impressions as f64, b.impressions as f64);
    let pooled = (a.clicks + b.clicks) as f64 / (n1 + n2);
    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if se == 0.0 || !se.is_finite() {
        return SignificanceResult::inconclusive();
    }

    let z = (a.ctr() - b.ctr()).abs() / se;
    let p_value = (2.0 * (1.0 - normal_cdf(z))).clamp(0.0, 1.0);
    let confidence = ((1.0 - p_value) * 100.0).round() as u32;

    SignificanceResult {
        significant: p_value < config.significance_level,
        p_value,
        confidence_percent: confidence.min(config.max_confidence_percent),
    }
}

/// Variant with the higher CTR, `None` on an exact tie.
pub fn winner_by_ctr(a: &VariantMetrics, b: &VariantMetrics) -> Option<Variant> {
    let (ctr_a, ctr_b) = (a.ctr(), b.ctr());
    if ctr_a > ctr_b {
        Some(Variant::A)
    } else if ctr_b > ctr_a {
        Some(Variant::B)
    } else {
        None
    }
}

/// Standard normal CDF via the Abramowitz & Stegun 7.1.26 erf approximation
/// (absolute error below 1.5e-7).
///
/// The polynomial approximates erf, so `z` is deliberately scaled by 1/sqrt(2)
/// before evaluation: Phi(z) = (1 + erf(z / sqrt(2))) / 2.
pub fn normal_cdf(z: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let x = z.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    let erf = 1.0 - poly * (-x * x).exp();

    if z < 0.0 {
        0.5 * (1.0 - erf)
    } else {
        0.5 * (1.0 + erf)
    }
}
