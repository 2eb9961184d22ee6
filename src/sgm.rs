//! Orchestration of the probability engine against a historical stats
//! provider.
//!
//! The engine modules are pure; everything that reads stored history goes
//! through [`StatsProvider`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

use crate::distribution::TryCountDistribution;
use crate::error::EngineError;
use crate::joint::joint_min_tries_probability;
use crate::outcome_bins::{aggregate_bins, AggregatedOutcome, BinFilter, OutcomeBin};
use crate::scoring::normalize_rates;
use crate::storage::MatchRepository;
use crate::try_rate::{estimate_try_rates, PlayerHistory, RatePolicy};

/// Read-only source of historical inputs.
pub trait StatsProvider {
    /// Histories of a team's named, non-replacement players for a match.
    fn team_player_histories(
        &self,
        match_id: i64,
        team_id: i64,
        seasons: &[i32],
        position: Option<&str>,
    ) -> anyhow::Result<Vec<PlayerHistory>>;

    fn team_try_distribution(
        &self,
        match_id: i64,
        team_id: i64,
    ) -> anyhow::Result<Option<TryCountDistribution>>;

    fn outcome_bins(&self, match_id: i64) -> anyhow::Result<Vec<OutcomeBin>>;

    /// `(home_team_id, away_team_id)` when the match exists.
    fn match_teams(&self, match_id: i64) -> anyhow::Result<Option<(i64, i64)>>;
}

impl StatsProvider for MatchRepository {
    fn team_player_histories(
        &self,
        match_id: i64,
        team_id: i64,
        seasons: &[i32],
        position: Option<&str>,
    ) -> anyhow::Result<Vec<PlayerHistory>> {
        self.get_team_player_histories(match_id, team_id, seasons, position)
    }

    fn team_try_distribution(
        &self,
        match_id: i64,
        team_id: i64,
    ) -> anyhow::Result<Option<TryCountDistribution>> {
        self.get_try_distribution(match_id, team_id)
    }

    fn outcome_bins(&self, match_id: i64) -> anyhow::Result<Vec<OutcomeBin>> {
        self.get_outcome_bins(match_id)
    }

    fn match_teams(&self, match_id: i64) -> anyhow::Result<Option<(i64, i64)>> {
        Ok(self
            .get_match(match_id)?
            .map(|m| (m.home_team_id, m.away_team_id)))
    }
}

/// Engine failure or a failure reading stored history.
#[derive(Debug, Error)]
pub enum SgmError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Normalized scoring-attribution distribution for one team in one match.
pub fn team_scoring_distribution(
    provider: &impl StatsProvider,
    match_id: i64,
    team_id: i64,
    seasons: &[i32],
    position: Option<&str>,
    policy: &RatePolicy,
) -> Result<BTreeMap<String, f64>, SgmError> {
    let histories = provider.team_player_histories(match_id, team_id, seasons, position)?;
    let rates = estimate_try_rates(&histories, policy);
    Ok(normalize_rates(&rates))
}

/// Joint minimum-tries probability from wire-format inputs.
pub fn joint_probability(
    try_dist: &HashMap<String, f64>,
    player_probs: &[f64],
    min_tries: &[u32],
) -> Result<f64, EngineError> {
    if try_dist.is_empty() {
        return Err(EngineError::invalid("try_dist must not be empty"));
    }
    if player_probs.is_empty() || min_tries.is_empty() {
        return Err(EngineError::invalid(
            "player_probs and min_tries must not be empty",
        ));
    }
    let dist = TryCountDistribution::from_string_keys(try_dist)?;
    joint_min_tries_probability(&dist, player_probs, min_tries)
}

/// Aggregate a match's outcome bins inside a margin / total window.
pub fn aggregate_outcome_bins(
    provider: &impl StatsProvider,
    match_id: i64,
    filter: &BinFilter,
) -> Result<AggregatedOutcome, SgmError> {
    let bins = provider.outcome_bins(match_id)?;
    if bins.is_empty() {
        return Err(EngineError::not_found(format!("no outcome bins for match {}", match_id)).into());
    }
    Ok(aggregate_bins(&bins, filter)?)
}

/// One try-scorer leg of a same-game multi.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgmLeg {
    pub player_id: String,
    pub min_tries: u32,
}

/// A same-game multi on one team's try scorers.
#[derive(Debug, Clone, PartialEq)]
pub struct SgmQuery {
    pub team_id: i64,
    pub legs: Vec<SgmLeg>,
    /// Scoreline window; any bound switches the try distribution to bins.
    pub filter: BinFilter,
    pub position: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TryDistributionSource {
    Stored,
    OutcomeBins,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedLeg {
    pub player_id: String,
    pub min_tries: u32,
    pub attribution_probability: f64,
}

/// Priced same-game multi.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SgmPrice {
    pub match_id: i64,
    pub team_id: i64,
    pub legs: Vec<PricedLeg>,
    pub try_dist_source: TryDistributionSource,
    /// Probability every leg hits, given the try distribution used.
    pub joint_probability: f64,
    /// Probability the scoreline lands in the window, when bins were used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_probability: Option<f64>,
    /// Probability the whole multi hits.
    pub probability: f64,
}

/// Price a same-game multi end to end from stored history.
pub fn price_sgm(
    provider: &impl StatsProvider,
    match_id: i64,
    query: &SgmQuery,
    seasons: &[i32],
    policy: &RatePolicy,
) -> Result<SgmPrice, SgmError> {
    if query.legs.is_empty() {
        return Err(EngineError::invalid("at least one leg is required").into());
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = query.legs.iter().find(|l| !seen.insert(l.player_id.as_str())) {
        return Err(EngineError::invalid(format!(
            "player {} appears in more than one leg",
            dup.player_id
        ))
        .into());
    }

    let (home, away) = provider
        .match_teams(match_id)?
        .ok_or_else(|| EngineError::not_found(format!("match {} not found", match_id)))?;
    let is_home = if query.team_id == home {
        true
    } else if query.team_id == away {
        false
    } else {
        return Err(EngineError::not_found(format!(
            "team {} is not playing in match {}",
            query.team_id, match_id
        ))
        .into());
    };

    let scoring = team_scoring_distribution(
        provider,
        match_id,
        query.team_id,
        seasons,
        query.position.as_deref(),
        policy,
    )?;
    let legs = query
        .legs
        .iter()
        .map(|leg| {
            scoring
                .get(&leg.player_id)
                .map(|&p| PricedLeg {
                    player_id: leg.player_id.clone(),
                    min_tries: leg.min_tries,
                    attribution_probability: p,
                })
                .ok_or_else(|| {
                    EngineError::invalid(format!(
                        "player {} is not named for team {} in match {}",
                        leg.player_id, query.team_id, match_id
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let stored = if query.filter.is_constrained() {
        None
    } else {
        provider.team_try_distribution(match_id, query.team_id)?
    };
    let (dist, source, selection_probability) = match stored {
        Some(dist) => (dist, TryDistributionSource::Stored, None),
        None => {
            let agg = aggregate_outcome_bins(provider, match_id, &query.filter)?;
            let dist = if is_home {
                agg.home_try_dist
            } else {
                agg.away_try_dist
            };
            (
                dist,
                TryDistributionSource::OutcomeBins,
                Some(agg.selection_probability),
            )
        }
    };

    let probs: Vec<f64> = legs.iter().map(|l| l.attribution_probability).collect();
    let mins: Vec<u32> = legs.iter().map(|l| l.min_tries).collect();
    let joint = joint_min_tries_probability(&dist, &probs, &mins)?;
    let probability = joint * selection_probability.unwrap_or(1.0);

    tracing::info!(
        match_id,
        team_id = query.team_id,
        legs = legs.len(),
        ?source,
        probability,
        "priced same-game multi"
    );

    Ok(SgmPrice {
        match_id,
        team_id: query.team_id,
        legs,
        try_dist_source: source,
        joint_probability: joint,
        selection_probability,
        probability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::repository::tests::seeded_repository;

    fn leg(id: &str, min_tries: u32) -> SgmLeg {
        SgmLeg {
            player_id: id.to_string(),
            min_tries,
        }
    }

    fn query(legs: Vec<SgmLeg>, filter: BinFilter) -> SgmQuery {
        SgmQuery {
            team_id: 1,
            legs,
            filter,
            position: None,
        }
    }

    #[test]
    fn test_team_scoring_distribution() {
        let repo = seeded_repository();
        let policy = RatePolicy {
            min_sample: 2,
            ..Default::default()
        };

        let dist = team_scoring_distribution(&repo, 40, 1, &[2025], None, &policy).unwrap();

        // 101: 3/2 observed; 102: below sample, 103: no games -> team mean
        assert_eq!(dist.len(), 3);
        let total: f64 = dist.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((dist["101"] - 1.5 / 4.5).abs() < 1e-12);
        assert!((dist["102"] - dist["103"]).abs() < 1e-12);
    }

    #[test]
    fn test_team_scoring_distribution_unknown_team() {
        let repo = seeded_repository();
        let dist =
            team_scoring_distribution(&repo, 40, 9, &[2025], None, &RatePolicy::default()).unwrap();
        assert!(dist.is_empty());
    }

    #[test]
    fn test_joint_probability_wire_inputs() {
        let try_dist = HashMap::from([("0".to_string(), 0.5), ("1".to_string(), 0.5)]);
        let p = joint_probability(&try_dist, &[1.0], &[1]).unwrap();
        assert!((p - 0.5).abs() < 1e-9);

        let try_dist = HashMap::from([("2".to_string(), 1.0)]);
        let p = joint_probability(&try_dist, &[0.5, 0.5], &[1, 1]).unwrap();
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_joint_probability_rejects_bad_shapes() {
        let try_dist = HashMap::from([("2".to_string(), 1.0)]);
        assert!(matches!(
            joint_probability(&HashMap::new(), &[0.5], &[1]),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(joint_probability(&try_dist, &[], &[]).is_err());
        assert!(joint_probability(&try_dist, &[0.5, 0.2], &[1]).is_err());
    }

    #[test]
    fn test_joint_probability_rejects_truncated_distribution() {
        let truncated = HashMap::from([("3".to_string(), 0.2)]);
        assert!(matches!(
            joint_probability(&truncated, &[0.5], &[0]),
            Err(EngineError::InvalidInput(_))
        ));

        let complete = HashMap::from([("3".to_string(), 0.2), ("4".to_string(), 0.8)]);
        let p = joint_probability(&complete, &[0.5], &[0]).unwrap();
        assert!((p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_outcome_bins() {
        let repo = seeded_repository();
        let agg = aggregate_outcome_bins(
            &repo,
            40,
            &BinFilter {
                margin_gte: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(agg.total_count, 60);
        assert!((agg.selection_probability - 0.6).abs() < 1e-12);

        assert!(matches!(
            aggregate_outcome_bins(&repo, 99, &BinFilter::default()),
            Err(SgmError::Engine(EngineError::NotFound(_)))
        ));
    }

    #[test]
    fn test_price_sgm_stored_distribution() {
        let repo = seeded_repository();
        let price = price_sgm(
            &repo,
            40,
            &query(vec![leg("101", 1)], BinFilter::default()),
            &[2025],
            &RatePolicy::default(),
        )
        .unwrap();

        assert_eq!(price.try_dist_source, TryDistributionSource::Stored);
        assert!(price.selection_probability.is_none());
        assert_eq!(price.probability, price.joint_probability);

        let p = price.legs[0].attribution_probability;
        let expected = 0.3 * (1.0 - (1.0 - p).powi(2))
            + 0.4 * (1.0 - (1.0 - p).powi(3))
            + 0.3 * (1.0 - (1.0 - p).powi(4));
        assert!((price.probability - expected).abs() < 1e-12);
    }

    #[test]
    fn test_price_sgm_with_scoreline_window() {
        let repo = seeded_repository();
        let filter = BinFilter {
            margin_gte: Some(1),
            ..Default::default()
        };
        let price = price_sgm(
            &repo,
            40,
            &query(vec![leg("101", 1), leg("102", 1)], filter),
            &[2025],
            &RatePolicy::default(),
        )
        .unwrap();

        assert_eq!(price.try_dist_source, TryDistributionSource::OutcomeBins);
        assert_eq!(price.selection_probability, Some(0.6));
        assert!((price.probability - price.joint_probability * 0.6).abs() < 1e-12);
        assert!(price.probability < price.joint_probability);
    }

    #[test]
    fn test_price_sgm_rejects_unknown_and_duplicate_players() {
        let repo = seeded_repository();
        let policy = RatePolicy::default();

        // Replacement players are not part of the scoring distribution
        let err = price_sgm(&repo, 40, &query(vec![leg("104", 1)], BinFilter::default()), &[2025], &policy)
            .unwrap_err();
        assert!(matches!(err, SgmError::Engine(EngineError::InvalidInput(_))));

        let err = price_sgm(
            &repo,
            40,
            &query(vec![leg("101", 1), leg("101", 2)], BinFilter::default()),
            &[2025],
            &policy,
        )
        .unwrap_err();
        assert!(matches!(err, SgmError::Engine(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_price_sgm_not_found() {
        let repo = seeded_repository();
        let policy = RatePolicy::default();

        let err = price_sgm(&repo, 99, &query(vec![leg("101", 1)], BinFilter::default()), &[2025], &policy)
            .unwrap_err();
        assert!(matches!(err, SgmError::Engine(EngineError::NotFound(_))));

        let mut q = query(vec![leg("101", 1)], BinFilter::default());
        q.team_id = 7;
        let err = price_sgm(&repo, 40, &q, &[2025], &policy).unwrap_err();
        assert!(matches!(err, SgmError::Engine(EngineError::NotFound(_))));
    }
}
