//! Team scoring-attribution distribution.

use std::collections::BTreeMap;

use crate::try_rate::PlayerRate;

/// Normalize per-player rates into a distribution over the team's players.
///
/// Falls back to a uniform split when every rate is zero. An empty roster
/// yields an empty map.
pub fn normalize_rates(rates: &[PlayerRate]) -> BTreeMap<String, f64> {
    if rates.is_empty() {
        return BTreeMap::new();
    }

    let total: f64 = rates.iter().map(|r| r.rate).sum();

    if total > 0.0 {
        rates
            .iter()
            .map(|r| (r.player_id.clone(), r.rate / total))
            .collect()
    } else {
        tracing::debug!(players = rates.len(), "all rates zero, using uniform distribution");
        let uniform = 1.0 / rates.len() as f64;
        rates
            .iter()
            .map(|r| (r.player_id.clone(), uniform))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::try_rate::RateSource;

    fn rate(id: &str, rate: f64) -> PlayerRate {
        PlayerRate {
            player_id: id.to_string(),
            rate,
            source: RateSource::Observed,
        }
    }

    #[test]
    fn test_normalize_rates() {
        let dist = normalize_rates(&[rate("a", 0.6), rate("b", 0.2), rate("c", 0.2)]);

        assert_eq!(dist.len(), 3);
        assert!((dist["a"] - 0.6).abs() < 1e-12);
        let total: f64 = dist.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sums_to_one_for_awkward_rates() {
        let rates: Vec<_> = (1..=17)
            .map(|i| rate(&format!("p{}", i), 1.0 / (i as f64 * 3.0)))
            .collect();
        let total: f64 = normalize_rates(&rates).values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_zero_is_uniform() {
        let dist = normalize_rates(&[rate("a", 0.0), rate("b", 0.0), rate("c", 0.0), rate("d", 0.0)]);
        assert!(dist.values().all(|&p| p == 0.25));
    }

    #[test]
    fn test_empty() {
        assert!(normalize_rates(&[]).is_empty());
    }
}
