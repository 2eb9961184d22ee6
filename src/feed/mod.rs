//! Live fixture feed for the NRL draw.
//!
//! Fetched rounds are kept in an injected [`TtlCache`] owned by the client.

pub mod cache;
pub mod client;

pub use cache::TtlCache;
pub use client::{FeedClient, MatchResult};

/// Build the draw data URL for a competition round
pub fn draw_url(base_url: &str, competition: u32, season: u32, round: u32) -> String {
    format!(
        "{}?competition={}&season={}&round={}",
        base_url, competition, season, round
    )
}

/// Cache key for a competition round
pub fn round_key(competition: u32, season: u32, round: u32) -> String {
    format!("{}/{}/{}", competition, season, round)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_url() {
        assert_eq!(
            draw_url("https://www.nrl.com/draw/data", 111, 2025, 8),
            "https://www.nrl.com/draw/data?competition=111&season=2025&round=8"
        );
        assert_eq!(round_key(111, 2025, 8), "111/2025/8");
    }
}
