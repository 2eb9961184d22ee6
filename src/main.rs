//! SGM Probability API
//!
//! REST API and CLI for same-game multi try-scorer probabilities.

mod betting;
mod cli;
mod config;
mod distribution;
mod error;
mod feed;
mod joint;
mod outcome_bins;
mod retry;
mod routes;
mod scoring;
mod sgm;
mod storage;
mod try_rate;
mod types;

use axum::{routing::get, routing::post, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::feed::{FeedClient, TtlCache};
use crate::outcome_bins::BinFilter;
use crate::routes::AppState;
use crate::storage::MatchRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port, db } => run_server(host, port, db).await,
        Commands::Distribution {
            match_id,
            team_id,
            position,
            format,
            db,
        } => cli::run_distribution(match_id, team_id, position, format, db),
        Commands::Joint { input, format } => cli::run_joint(input, format),
        Commands::Bins {
            match_id,
            margin_gte,
            margin_lte,
            total_gte,
            total_lte,
            format,
            db,
        } => {
            let filter = BinFilter {
                margin_gte,
                margin_lte,
                total_gte,
                total_lte,
            };
            cli::run_bins(match_id, filter, format, db)
        }
        Commands::Import { input, db } => cli::run_import(input, db),
        Commands::Results {
            season,
            round,
            format,
        } => cli::run_results(season, round, format).await,
    }
}

/// Run the API server.
async fn run_server(
    host: Option<String>,
    port: Option<u16>,
    db: Option<PathBuf>,
) -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sgm_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let mut config = cli::load_config(db)?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("Database path: {}", config.storage.database_path);
    tracing::info!(
        "Rate policy: min_sample={}, zero_try_effective={}, default_rate={}",
        config.engine.min_sample,
        config.engine.zero_try_effective,
        config.engine.default_rate
    );

    let repo = MatchRepository::new(Path::new(&config.storage.database_path))?;
    tracing::info!("Database opened with {} matches", repo.get_match_count()?);

    let cache = Arc::new(TtlCache::with_ttl_secs(config.feed.cache_ttl_secs));
    tracing::info!("Feed cache TTL: {}s", cache.ttl().num_seconds());
    let feed = FeedClient::new(config.feed.clone(), cache)?;

    // Create application state
    let state = Arc::new(AppState {
        repo: Mutex::new(repo),
        config: config.clone(),
        feed,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(routes::health))
        .route(
            "/matches/:match_id/teams/:team_id/scoring-distribution",
            get(routes::scoring_distribution),
        )
        .route("/matches/:match_id/outcome-bins", get(routes::outcome_bins))
        .route("/matches/:match_id/sgm", post(routes::price_sgm))
        .route("/sgm/joint-probability", post(routes::joint_probability))
        .route("/latest-results", get(routes::latest_results))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
