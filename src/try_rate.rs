//! Per-player try-scoring rate estimation with a hierarchical fallback.
//!
//! Rates are resolved in two passes: observed rates for players with enough
//! appearances are finalized first, then every short-sample player is filled
//! from the finalized rates of their position group, the whole team, or a
//! constant default, in that order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::EngineConfig;

/// Canonical position groups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PositionGroup {
    Fullback,
    Wing,
    Centre,
    FiveEighth,
    Halfback,
    FrontRow,
    Hooker,
    SecondRow,
    Lock,
    Bench,
    /// Unrecognized label, kept verbatim as its own group.
    Other(String),
}

/// Source label aliases, compared case-insensitively after trimming.
const POSITION_ALIASES: &[(&str, PositionGroup)] = &[
    ("FB", PositionGroup::Fullback),
    ("Fullback", PositionGroup::Fullback),
    ("Full Back", PositionGroup::Fullback),
    ("WG", PositionGroup::Wing),
    ("W", PositionGroup::Wing),
    ("Wing", PositionGroup::Wing),
    ("Winger", PositionGroup::Wing),
    ("CE", PositionGroup::Centre),
    ("CTR", PositionGroup::Centre),
    ("Centre", PositionGroup::Centre),
    ("Center", PositionGroup::Centre),
    ("FE", PositionGroup::FiveEighth),
    ("5/8", PositionGroup::FiveEighth),
    ("Five-eighth", PositionGroup::FiveEighth),
    ("Five Eighth", PositionGroup::FiveEighth),
    ("Stand-off", PositionGroup::FiveEighth),
    ("HB", PositionGroup::Halfback),
    ("Halfback", PositionGroup::Halfback),
    ("Half Back", PositionGroup::Halfback),
    ("Half-back", PositionGroup::Halfback),
    ("Scrum-half", PositionGroup::Halfback),
    ("FR", PositionGroup::FrontRow),
    ("PR", PositionGroup::FrontRow),
    ("Prop", PositionGroup::FrontRow),
    ("Front Row", PositionGroup::FrontRow),
    ("Front-row", PositionGroup::FrontRow),
    ("HK", PositionGroup::Hooker),
    ("HOK", PositionGroup::Hooker),
    ("Hooker", PositionGroup::Hooker),
    ("SR", PositionGroup::SecondRow),
    ("2R", PositionGroup::SecondRow),
    ("Second Row", PositionGroup::SecondRow),
    ("Second-row", PositionGroup::SecondRow),
    ("LK", PositionGroup::Lock),
    ("Lock", PositionGroup::Lock),
    ("Loose Forward", PositionGroup::Lock),
    ("INT", PositionGroup::Bench),
    ("IC", PositionGroup::Bench),
    ("Interchange", PositionGroup::Bench),
    ("Reserve", PositionGroup::Bench),
    ("Bench", PositionGroup::Bench),
];

impl PositionGroup {
    /// Collapse a source position label into its canonical group.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        POSITION_ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(trimmed))
            .map(|(_, group)| group.clone())
            .unwrap_or_else(|| PositionGroup::Other(trimmed.to_string()))
    }
}

impl fmt::Display for PositionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionGroup::Fullback => write!(f, "Fullback"),
            PositionGroup::Wing => write!(f, "Wing"),
            PositionGroup::Centre => write!(f, "Centre"),
            PositionGroup::FiveEighth => write!(f, "Five-eighth"),
            PositionGroup::Halfback => write!(f, "Halfback"),
            PositionGroup::FrontRow => write!(f, "Front row"),
            PositionGroup::Hooker => write!(f, "Hooker"),
            PositionGroup::SecondRow => write!(f, "Second row"),
            PositionGroup::Lock => write!(f, "Lock"),
            PositionGroup::Bench => write!(f, "Bench"),
            PositionGroup::Other(label) => write!(f, "{}", label),
        }
    }
}

/// A player's try history inside the requested season window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerHistory {
    pub player_id: String,
    pub position: String,
    pub tries: u32,
    pub matches_played: u32,
}

/// Tunable estimation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RatePolicy {
    /// Appearances required before an observed rate is trusted.
    pub min_sample: u32,
    /// Try count substituted for a qualified player with zero tries.
    pub zero_try_effective: f64,
    /// Rate used when no qualified player exists at all.
    pub default_rate: f64,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            min_sample: 5,
            zero_try_effective: 1.0,
            default_rate: 0.05,
        }
    }
}

impl From<&EngineConfig> for RatePolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            min_sample: config.min_sample,
            zero_try_effective: config.zero_try_effective,
            default_rate: config.default_rate,
        }
    }
}

/// Where a resolved rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Observed,
    PositionGroup,
    Team,
    Default,
}

/// Resolved rate for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRate {
    pub player_id: String,
    pub rate: f64,
    pub source: RateSource,
}

/// Observed rate, or `None` when the sample is too small.
pub fn observed_rate(history: &PlayerHistory, policy: &RatePolicy) -> Option<f64> {
    if history.matches_played < policy.min_sample || history.matches_played == 0 {
        return None;
    }

    let effective_tries = if history.tries > 0 {
        history.tries as f64
    } else {
        policy.zero_try_effective
    };

    Some(effective_tries / history.matches_played as f64)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Estimate a rate for every player, in input order.
///
/// Never leaves a player unresolved.
pub fn estimate_try_rates(histories: &[PlayerHistory], policy: &RatePolicy) -> Vec<PlayerRate> {
    // Pass 1: observed rates only; nothing below reads a pending fallback.
    let observed: Vec<Option<f64>> = histories
        .iter()
        .map(|h| observed_rate(h, policy))
        .collect();
    let groups: Vec<PositionGroup> = histories
        .iter()
        .map(|h| PositionGroup::from_label(&h.position))
        .collect();

    let mut by_group: BTreeMap<&PositionGroup, Vec<f64>> = BTreeMap::new();
    for (group, rate) in groups.iter().zip(&observed) {
        if let Some(rate) = rate {
            by_group.entry(group).or_default().push(*rate);
        }
    }
    let group_means: BTreeMap<&PositionGroup, f64> = by_group
        .iter()
        .filter_map(|(group, rates)| mean(rates).map(|m| (*group, m)))
        .collect();
    let all_known: Vec<f64> = observed.iter().flatten().copied().collect();
    let team_mean = mean(&all_known);

    // Pass 2: fill short samples from the finalized aggregates.
    histories
        .iter()
        .zip(observed.iter().zip(&groups))
        .map(|(history, (rate, group))| {
            let (rate, source) = match rate {
                Some(r) => (*r, RateSource::Observed),
                None => match (group_means.get(group), team_mean) {
                    (Some(&g), _) => (g, RateSource::PositionGroup),
                    (None, Some(t)) => (t, RateSource::Team),
                    (None, None) => (policy.default_rate, RateSource::Default),
                },
            };

            if source != RateSource::Observed {
                tracing::debug!(
                    player_id = %history.player_id,
                    matches_played = history.matches_played,
                    group = %group,
                    ?source,
                    rate,
                    "insufficient sample, using fallback rate"
                );
            }

            PlayerRate {
                player_id: history.player_id.clone(),
                rate,
                source,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(id: &str, position: &str, tries: u32, played: u32) -> PlayerHistory {
        PlayerHistory {
            player_id: id.to_string(),
            position: position.to_string(),
            tries,
            matches_played: played,
        }
    }

    #[test]
    fn test_position_aliases() {
        assert_eq!(PositionGroup::from_label("FB"), PositionGroup::Fullback);
        assert_eq!(PositionGroup::from_label("Fullback"), PositionGroup::Fullback);
        assert_eq!(PositionGroup::from_label(" wing "), PositionGroup::Wing);
        assert_eq!(PositionGroup::from_label("Interchange"), PositionGroup::Bench);
        assert_eq!(PositionGroup::from_label("Reserve"), PositionGroup::Bench);
        assert_eq!(PositionGroup::from_label("Bench"), PositionGroup::Bench);
        assert_eq!(PositionGroup::from_label("2R"), PositionGroup::SecondRow);
        assert_eq!(
            PositionGroup::from_label("Utility"),
            PositionGroup::Other("Utility".to_string())
        );
    }

    #[test]
    fn test_every_alias_resolves_to_its_group() {
        for (alias, group) in POSITION_ALIASES {
            assert_eq!(&PositionGroup::from_label(alias), group, "alias {}", alias);
            assert_eq!(
                &PositionGroup::from_label(&alias.to_uppercase()),
                group,
                "alias {}",
                alias
            );
        }
    }

    #[test]
    fn test_observed_rate() {
        let policy = RatePolicy::default();
        assert_eq!(observed_rate(&history("a", "Wing", 3, 5), &policy), Some(0.6));

        let smoothed = observed_rate(&history("b", "Prop", 0, 6), &policy).unwrap();
        assert!((smoothed - 1.0 / 6.0).abs() < 1e-12);

        assert_eq!(observed_rate(&history("c", "Wing", 2, 2), &policy), None);
    }

    #[test]
    fn test_group_fallback() {
        let policy = RatePolicy::default();
        let rates = estimate_try_rates(
            &[
                history("w1", "WG", 4, 10),
                history("w2", "Wing", 6, 10),
                history("p1", "Prop", 1, 10),
                history("w3", "Winger", 5, 2),
            ],
            &policy,
        );

        assert_eq!(rates.len(), 4);
        assert_eq!(rates[3].player_id, "w3");
        assert_eq!(rates[3].source, RateSource::PositionGroup);
        assert!((rates[3].rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_team_fallback() {
        let policy = RatePolicy::default();
        let rates = estimate_try_rates(
            &[
                history("w1", "Wing", 4, 10),
                history("p1", "Prop", 1, 10),
                history("h1", "Hooker", 3, 1),
            ],
            &policy,
        );

        assert_eq!(rates[2].source, RateSource::Team);
        assert!((rates[2].rate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_default_fallback() {
        let policy = RatePolicy::default();
        let rates = estimate_try_rates(
            &[history("a", "Wing", 1, 2), history("b", "Lock", 0, 0)],
            &policy,
        );

        assert!(rates.iter().all(|r| r.source == RateSource::Default));
        assert!(rates.iter().all(|r| (r.rate - 0.05).abs() < 1e-12));
    }

    #[test]
    fn test_fallbacks_never_feed_each_other() {
        // Two short-sample wings: neither may use the other's fallback rate.
        let policy = RatePolicy::default();
        let rates = estimate_try_rates(
            &[
                history("w1", "Wing", 1, 1),
                history("p1", "Prop", 2, 10),
                history("w2", "Wing", 1, 1),
            ],
            &policy,
        );

        assert_eq!(rates[0].source, RateSource::Team);
        assert_eq!(rates[2].source, RateSource::Team);
        assert!((rates[0].rate - 0.2).abs() < 1e-12);
        assert!((rates[2].rate - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_custom_policy() {
        let policy = RatePolicy {
            min_sample: 3,
            zero_try_effective: 0.5,
            default_rate: 0.1,
        };
        let rates = estimate_try_rates(&[history("a", "Centre", 0, 4)], &policy);
        assert!((rates[0].rate - 0.125).abs() < 1e-12);

        let rates = estimate_try_rates(&[history("b", "Centre", 0, 2)], &policy);
        assert!((rates[0].rate - 0.1).abs() < 1e-12);
    }
}
