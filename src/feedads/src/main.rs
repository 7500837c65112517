//! feedads: sponsored-feed ad ranking and A/B test analysis.
//!
//! Loads a JSON fixture bundle into a platform and runs one command against it.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use feedads_analytics::AdFilter;
use feedads_core::config::AppConfig;
use feedads_core::types::{AdType, VariantMetrics};
use feedads_delivery::{AdPlatform, PlatformFixtures};
use feedads_experimentation::evaluate_significance;
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "feedads")]
#[command(about = "Sponsored-feed ad ranking and A/B test analysis")]
#[command(version)]
struct Cli {
    /// JSON bundle with users, ads, campaigns, impressions and clicks
    #[arg(short, long, env = "FEEDADS_FIXTURES")]
    fixtures: Option<String>,

    /// Maximum ranked ads (overrides config)
    #[arg(long, env = "FEEDADS__RANKING__MAX_RESULTS")]
    max_results: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rank the catalog for a member and explain each score
    Rank {
        /// Member id from the fixtures
        #[arg(short, long)]
        user: String,
    },

    /// Show the ads that would fill a member's feed slots
    Feed {
        /// Member id from the fixtures
        #[arg(short, long)]
        user: String,
    },

    /// Campaign performance report
    Report {
        /// Only ads of this campaign
        #[arg(long)]
        campaign: Option<String>,

        /// Only ads of this type (post or video)
        #[arg(long)]
        ad_type: Option<String>,
    },

    /// Two-proportion significance test on raw counts
    Significance {
        #[arg(long)]
        a_impressions: u64,
        #[arg(long)]
        a_clicks: u64,
        #[arg(long)]
        b_impressions: u64,
        #[arg(long)]
        b_clicks: u64,
    },
}

fn parse_ad_type(s: &str) -> anyhow::Result<AdType> {
    match s.to_lowercase().as_str() {
        "post" | "sponsored_post" => Ok(AdType::SponsoredPost),
        "video" | "sponsored_video" => Ok(AdType::SponsoredVideo),
        other => bail!("unknown ad type '{other}', expected post or video"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedads=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(max_results) = cli.max_results {
        config.ranking.max_results = max_results;
    }

    let fixtures = match &cli.fixtures {
        Some(path) => PlatformFixtures::from_path(path)
            .with_context(|| format!("loading fixtures from {path}"))?,
        None => PlatformFixtures::default(),
    };
    let platform = AdPlatform::from_fixtures(config, fixtures);
    info!(command = ?cli.command, "Running command");

    let output = match cli.command {
        Commands::Rank { user } => {
            let Some(profile) = platform.get_user(&user) else {
                bail!("no member with id '{user}'");
            };
            let ranked: Vec<_> = platform
                .rank_ads_for_user(&profile)
                .into_iter()
                .map(|r| {
                    json!({
                        "adId": r.ad.id,
                        "headline": r.ad.headline(),
                        "type": r.ad.ad_type,
                        "relevanceScore": r.relevance_score,
                        "bidAmount": r.bid_amount,
                        "historicalCtr": r.historical_ctr,
                        "finalScore": r.final_score,
                        "backfilled": r.backfilled,
                        "reasons": r.breakdown.reasons(),
                    })
                })
                .collect();
            serde_json::to_string_pretty(&ranked)?
        }
        Commands::Feed { user } => {
            let Some(profile) = platform.get_user(&user) else {
                bail!("no member with id '{user}'");
            };
            serde_json::to_string_pretty(&platform.feed_ads(&profile))?
        }
        Commands::Report { campaign, ad_type } => {
            let filter = AdFilter {
                campaign_id: campaign,
                ad_type: ad_type.as_deref().map(parse_ad_type).transpose()?,
            };
            serde_json::to_string_pretty(&platform.campaign_report(&filter))?
        }
        Commands::Significance {
            a_impressions,
            a_clicks,
            b_impressions,
            b_clicks,
        } => {
            let a = VariantMetrics::new(a_impressions, a_clicks);
            let b = VariantMetrics::new(b_impressions, b_clicks);
            serde_json::to_string_pretty(&evaluate_significance(&a, &b))?
        }
    };

    println!("{output}");
    Ok(())
}
