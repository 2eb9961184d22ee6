//! HTTP client for completed results from the NRL draw feed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::cache::TtlCache;
use super::{draw_url, round_key};
use crate::config::FeedConfig;
use crate::retry::{retry, RetryConfig};

#[derive(Debug, Deserialize)]
struct DrawResponse {
    #[serde(default)]
    fixtures: Vec<Fixture>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Fixture {
    #[serde(default)]
    home_team: Option<FixtureTeam>,
    #[serde(default)]
    away_team: Option<FixtureTeam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureTeam {
    #[serde(default)]
    nick_name: Option<String>,
    #[serde(default)]
    score: Option<u32>,
}

/// A completed fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub home: String,
    pub away: String,
    pub home_score: u32,
    pub away_score: u32,
    /// Nickname of the higher-scoring team, `None` for a draw
    pub winner: Option<String>,
}

/// Parse a draw payload, keeping fixtures with both scores posted.
pub fn parse_results(body: &str) -> Result<Vec<MatchResult>> {
    let draw: DrawResponse = serde_json::from_str(body).context("Invalid draw payload")?;

    let results = draw
        .fixtures
        .into_iter()
        .filter_map(|fixture| {
            let home = fixture.home_team?;
            let away = fixture.away_team?;
            let (home_score, away_score) = (home.score?, away.score?);
            let home = home.nick_name?;
            let away = away.nick_name?;

            let winner = if home_score > away_score {
                Some(home.clone())
            } else if away_score > home_score {
                Some(away.clone())
            } else {
                None
            };

            Some(MatchResult {
                home,
                away,
                home_score,
                away_score,
                winner,
            })
        })
        .collect();

    Ok(results)
}

/// Transport failures and 429/5xx responses are worth retrying.
fn is_transient(err: &reqwest::Error) -> bool {
    match err.status() {
        Some(status) => {
            status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        }
        None => err.is_timeout() || err.is_connect() || err.is_request(),
    }
}

/// Draw feed client with a per-round result cache
pub struct FeedClient {
    http: reqwest::Client,
    config: FeedConfig,
    cache: Arc<TtlCache<Vec<MatchResult>>>,
    retry: RetryConfig,
}

impl FeedClient {
    pub fn new(config: FeedConfig, cache: Arc<TtlCache<Vec<MatchResult>>>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            retry: RetryConfig::from(&config),
            config,
            cache,
        })
    }

    /// Completed results for a round, defaulting to the configured season/round
    pub async fn latest_results(
        &self,
        season: Option<u32>,
        round: Option<u32>,
    ) -> Result<Vec<MatchResult>> {
        let season = season.unwrap_or(self.config.season);
        let round = round.unwrap_or(self.config.round);
        let key = round_key(self.config.competition, season, round);

        if let Some(results) = self.cache.get(&key) {
            tracing::debug!("Cache hit for round {}", key);
            return Ok(results);
        }

        let url = draw_url(&self.config.base_url, self.config.competition, season, round);
        tracing::info!("Fetching draw data: {}", url);

        let body = retry(&self.retry, "draw fetch", is_transient, || {
            let request = self.http.get(&url);
            async move { request.send().await?.error_for_status()?.text().await }
        })
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

        let results = parse_results(&body)?;
        self.cache.insert(&key, results.clone());
        tracing::debug!(
            "Cached {} results for {} ({} rounds held)",
            results.len(),
            key,
            self.cache.len()
        );

        Ok(results)
    }
}
