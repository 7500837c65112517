use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `FEEDADS__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub frequency: FrequencyConfig,
    #[serde(default)]
    pub experiments: ExperimentConfig,
    #[serde(default)]
    pub events: EventLogConfig,
}

/// Weights and limits used by the ad ranker.
#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_relevance_weight")]
    pub relevance_weight: f64,
    #[serde(default = "default_bid_weight")]
    pub bid_weight: f64,
    #[serde(default = "default_ctr_weight")]
    pub ctr_weight: f64,
    /// Remaining budget that maps to a full bid signal of 1.0.
    #[serde(default = "default_bid_normalizer")]
    pub bid_normalizer: f64,
    #[serde(default = "default_video_backfill")]
    pub video_backfill: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrequencyConfig {
    #[serde(default = "default_max_impressions_per_day")]
    pub max_impressions_per_day: usize,
    #[serde(default = "default_suppress_after_click")]
    pub suppress_after_click: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: u64,
    #[serde(default = "default_significance_level")]
    pub significance_level: f64,
    #[serde(default = "default_max_confidence_percent")]
    pub max_confidence_percent: u32,
    /// Fixed seed for variant assignment. Unset means entropy-seeded.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventLogConfig {
    /// Impressions older than this are dropped on compaction. 0 keeps everything.
    #[serde(default = "default_impression_retention_days")]
    pub impression_retention_days: u32,
}

// Default functions
fn default_max_results() -> usize {
    5
}
fn default_relevance_weight() -> f64 {
    0.4
}
fn default_bid_weight() -> f64 {
    0.3
}
fn default_ctr_weight() -> f64 {
    0.3
}
fn default_bid_normalizer() -> f64 {
    10_000.0
}
fn default_video_backfill() -> bool {
    true
}
fn default_max_impressions_per_day() -> usize {
    3
}
fn default_suppress_after_click() -> bool {
    true
}
fn default_min_sample_size() -> u64 {
    30
}
fn default_significance_level() -> f64 {
    0.05
}
fn default_max_confidence_percent() -> u32 {
    99
}
fn default_impression_retention_days() -> u32 {
    30
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            relevance_weight: default_relevance_weight(),
            bid_weight: default_bid_weight(),
            ctr_weight: default_ctr_weight(),
            bid_normalizer: default_bid_normalizer(),
            video_backfill: default_video_backfill(),
        }
    }
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            max_impressions_per_day: default_max_impressions_per_day(),
            suppress_after_click: default_suppress_after_click(),
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            min_sample_size: default_min_sample_size(),
            significance_level: default_significance_level(),
            max_confidence_percent: default_max_confidence_percent(),
            seed: None,
        }
    }
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            impression_retention_days: default_impression_retention_days(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ranking: RankingConfig::default(),
            frequency: FrequencyConfig::default(),
            experiments: ExperimentConfig::default(),
            events: EventLogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("FEEDADS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
