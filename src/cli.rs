//! CLI commands for sgm-api.
//!
//! Supports API server mode plus one-shot engine calls against the local
//! database or a request file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::betting::price_signal;
use crate::config::AppConfig;
use crate::feed::{FeedClient, MatchResult, TtlCache};
use crate::outcome_bins::BinFilter;
use crate::sgm;
use crate::storage::{Dataset, MatchRepository};
use crate::try_rate::RatePolicy;
use crate::types::{
    JointProbabilityRequest, JointProbabilityResponse, OutcomeBinsResponse,
    ScoringDistributionResponse,
};

#[derive(Parser)]
#[command(name = "sgm-api")]
#[command(version, about = "SGM probability engine: API server and CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path override
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Scoring distribution for a team's named players
    Distribution {
        match_id: i64,

        team_id: i64,

        /// Only count appearances at this position label
        #[arg(long)]
        position: Option<String>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Database path override
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Joint minimum-tries probability from a request JSON file
    Joint {
        /// Path to request JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output format (json, table)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Aggregate a match's outcome bins inside a scoreline window
    Bins {
        match_id: i64,

        #[arg(long, allow_negative_numbers = true)]
        margin_gte: Option<i32>,

        #[arg(long, allow_negative_numbers = true)]
        margin_lte: Option<i32>,

        #[arg(long)]
        total_gte: Option<i32>,

        #[arg(long)]
        total_lte: Option<i32>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Database path override
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Import a dataset JSON file into the database
    Import {
        /// Path to dataset JSON file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Database path override
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Completed results from the live fixture feed
    Results {
        #[arg(long)]
        season: Option<u32>,

        #[arg(long)]
        round: Option<u32>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

/// Load configuration, applying a database path override.
pub fn load_config(db: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load()?;
    if let Some(path) = db {
        config.storage.database_path = path.to_string_lossy().to_string();
    }
    Ok(config)
}

fn open_repository(config: &AppConfig) -> anyhow::Result<MatchRepository> {
    let path = Path::new(&config.storage.database_path);
    MatchRepository::new(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Dispatch on output format, falling back to JSON for unknown formats.
fn emit<T: serde::Serialize>(format: &str, value: &T, table: impl FnOnce(&T)) -> anyhow::Result<()> {
    match format {
        "json" => print_json(value),
        "table" => {
            table(value);
            Ok(())
        }
        _ => {
            eprintln!("Unknown format: {}. Using JSON.", format);
            print_json(value)
        }
    }
}

/// Print a team's scoring distribution.
pub fn run_distribution(
    match_id: i64,
    team_id: i64,
    position: Option<String>,
    format: String,
    db: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config(db)?;
    let repo = open_repository(&config)?;

    let probabilities = sgm::team_scoring_distribution(
        &repo,
        match_id,
        team_id,
        &config.stats.seasons,
        position.as_deref(),
        &RatePolicy::from(&config.engine),
    )?;

    let response = ScoringDistributionResponse {
        match_id,
        team_id,
        probabilities,
    };
    emit(&format, &response, print_distribution_table)
}

fn print_distribution_table(response: &ScoringDistributionResponse) {
    println!("Match {} / team {}", response.match_id, response.team_id);
    println!();

    if response.probabilities.is_empty() {
        println!("  (no named players)");
        return;
    }

    let mut sorted: Vec<_> = response.probabilities.iter().collect();
    sorted.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));

    println!("=== Try Attribution ===");
    for (player, prob) in sorted {
        println!("  {:>8}: {:.2}%", player, *prob * 100.0);
    }
}

/// Compute a joint probability from a request file.
pub fn run_joint(input: PathBuf, format: String) -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    let input_json = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let req: JointProbabilityRequest = serde_json::from_str(&input_json)?;

    let probability = sgm::joint_probability(&req.try_dist, &req.player_probs, &req.min_tries)?;
    let pricing = req
        .offered_odds
        .map(|odds| price_signal(probability, Some(odds), &config.betting));

    let response = JointProbabilityResponse {
        probability,
        pricing,
    };
    emit(&format, &response, |r| {
        println!("Joint probability: {:.4}%", r.probability * 100.0);
        if let Some(pricing) = &r.pricing {
            if let Some(fair) = pricing.fair_odds {
                println!("Fair odds:         {:.2}", fair);
            }
            if let (Some(odds), Some(ev)) = (pricing.offered_odds, pricing.expected_value) {
                println!("Offered odds:      {:.2} (EV {:.3})", odds, ev);
            }
            if pricing.value_bet {
                println!("Value bet (kelly {:.4})", pricing.kelly_fraction.unwrap_or(0.0));
            }
        }
    })
}

/// Aggregate outcome bins for a match.
pub fn run_bins(
    match_id: i64,
    filter: BinFilter,
    format: String,
    db: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config(db)?;
    let repo = open_repository(&config)?;

    let outcome = sgm::aggregate_outcome_bins(&repo, match_id, &filter)?;
    let response = OutcomeBinsResponse { match_id, outcome };

    emit(&format, &response, |r| {
        let o = &r.outcome;
        println!("Match {}", r.match_id);
        println!(
            "Samples in window: {} (selection probability {:.2}%)",
            o.total_count,
            o.selection_probability * 100.0
        );
        println!();
        println!("  {:>5}  {:>8}  {:>8}", "tries", "home", "away");
        let max_tries = o
            .home_try_dist
            .iter()
            .chain(o.away_try_dist.iter())
            .map(|(k, _)| k)
            .max()
            .unwrap_or(0);
        for k in 0..=max_tries {
            let home = o.home_try_dist.probability(k);
            let away = o.away_try_dist.probability(k);
            if home > 0.0 || away > 0.0 {
                println!("  {:>5}  {:>7.2}%  {:>7.2}%", k, home * 100.0, away * 100.0);
            }
        }
    })
}

/// Import a dataset file into the database.
pub fn run_import(input: PathBuf, db: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(db)?;
    let repo = open_repository(&config)?;

    eprintln!("Loading dataset from: {}", input.display());
    let input_json = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let dataset: Dataset = serde_json::from_str(&input_json)?;

    let summary = repo.import_dataset(&dataset)?;
    eprintln!(
        "Imported {} matches, {} players, {} team list entries, {} appearances, {} try distributions, {} outcome bins",
        summary.matches,
        summary.players,
        summary.team_lists,
        summary.appearances,
        summary.try_distributions,
        summary.outcome_bins
    );
    eprintln!("Database now holds {} matches", repo.get_match_count()?);

    Ok(())
}

/// Fetch completed results from the live feed.
pub async fn run_results(
    season: Option<u32>,
    round: Option<u32>,
    format: String,
) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let cache = Arc::new(TtlCache::with_ttl_secs(config.feed.cache_ttl_secs));
    let feed = FeedClient::new(config.feed, cache)?;

    let results = feed.latest_results(season, round).await?;
    emit(&format, &results, print_results_table)
}

fn print_results_table(results: &Vec<MatchResult>) {
    if results.is_empty() {
        println!("No completed matches");
        return;
    }

    for r in results {
        let winner = r.winner.as_deref().unwrap_or("draw");
        println!(
            "  {:>12} {:>3} - {:<3} {:<12}  ({})",
            r.home, r.home_score, r.away_score, r.away, winner
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_bins_negative_margin() {
        let cli = Cli::try_parse_from([
            "sgm-api",
            "bins",
            "40",
            "--margin-lte",
            "-4",
            "--format",
            "json",
        ])
        .unwrap();

        match cli.command {
            Commands::Bins {
                match_id,
                margin_lte,
                margin_gte,
                format,
                ..
            } => {
                assert_eq!(match_id, 40);
                assert_eq!(margin_lte, Some(-4));
                assert_eq!(margin_gte, None);
                assert_eq!(format, "json");
            }
            _ => panic!("expected bins command"),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["sgm-api", "serve", "-p", "9000"]).unwrap();
        match cli.command {
            Commands::Serve { host, port, db } => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
                assert!(db.is_none());
            }
            _ => panic!("expected serve command"),
        }
    }
}
