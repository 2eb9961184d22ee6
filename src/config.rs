//! Configuration for the SGM API.

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Try-rate estimation policy.
///
/// The zero-try smoothing and the default rate are heuristics, not fitted
/// values; both are exposed here so they can be tuned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Appearances needed before a player's own rate is used
    #[serde(default = "default_min_sample")]
    pub min_sample: u32,
    /// Effective tries for a qualified player who has not scored
    #[serde(default = "default_zero_try_effective")]
    pub zero_try_effective: f64,
    /// Rate used when nobody in the team has enough appearances
    #[serde(default = "default_rate")]
    pub default_rate: f64,
}

fn default_min_sample() -> u32 {
    5
}

fn default_zero_try_effective() -> f64 {
    1.0
}

fn default_rate() -> f64 {
    0.05
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_sample: default_min_sample(),
            zero_try_effective: default_zero_try_effective(),
            default_rate: default_rate(),
        }
    }
}

/// Historical stats window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Season ids included in player histories. Empty means all seasons.
    #[serde(default = "default_seasons")]
    pub seasons: Vec<i32>,
}

fn default_seasons() -> Vec<i32> {
    vec![2024, 2025]
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            seasons: default_seasons(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    "data/sgm.sqlite".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Betting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BettingConfig {
    #[serde(default = "default_ev_threshold")]
    pub ev_threshold: f64,
    #[serde(default = "default_kelly_fraction")]
    pub kelly_fraction: f64,
}

fn default_ev_threshold() -> f64 {
    1.0
}

fn default_kelly_fraction() -> f64 {
    0.25
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            ev_threshold: default_ev_threshold(),
            kelly_fraction: default_kelly_fraction(),
        }
    }
}

/// Live fixture feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub base_url: String,
    #[serde(default = "default_competition")]
    pub competition: u32,
    #[serde(default = "default_feed_season")]
    pub season: u32,
    #[serde(default = "default_feed_round")]
    pub round: u32,
    /// The upstream feed rejects requests without a browser user agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Retries after the first failed fetch
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,
}

fn default_feed_url() -> String {
    "https://www.nrl.com/draw/data".to_string()
}

fn default_competition() -> u32 {
    111
}

fn default_feed_season() -> u32 {
    2025
}

fn default_feed_round() -> u32 {
    8
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_initial_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_url(),
            competition: default_competition(),
            season: default_feed_season(),
            round: default_feed_round(),
            user_agent: default_user_agent(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_retries: default_max_retries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            retry_multiplier: default_retry_multiplier(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub betting: BettingConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (SGM_SERVER__PORT, etc.)
            .add_source(
                config::Environment::with_prefix("SGM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.min_sample, 5);
        assert_eq!(config.engine.default_rate, 0.05);
        assert_eq!(config.stats.seasons, vec![2024, 2025]);
        assert_eq!(config.feed.competition, 111);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"engine": {"min_sample": 3}, "stats": {"seasons": []}}"#)
                .unwrap();
        assert_eq!(config.engine.min_sample, 3);
        assert_eq!(config.engine.zero_try_effective, 1.0);
        assert!(config.stats.seasons.is_empty());
        assert_eq!(config.storage.database_path, "data/sgm.sqlite");
    }

    #[test]
    fn test_feed_retry_settings() {
        let config: AppConfig =
            serde_json::from_str(r#"{"feed": {"max_retries": 0, "retry_max_delay_ms": 2000}}"#)
                .unwrap();
        assert_eq!(config.feed.max_retries, 0);
        assert_eq!(config.feed.retry_max_delay_ms, 2000);
        assert_eq!(config.feed.retry_initial_delay_ms, 500);
        assert_eq!(config.feed.retry_multiplier, 2.0);
        assert_eq!(config.feed.cache_ttl_secs, 300);
    }
}
