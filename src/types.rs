//! Request and response types for the SGM API.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::outcome_bins::{AggregatedOutcome, BinFilter};
use crate::sgm::{SgmLeg, SgmPrice};

/// Fair price and value signal for a computed probability
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSignal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fair_odds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offered_odds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kelly_fraction: Option<f64>,
    pub value_bet: bool,
}

/// Query for the scoring-distribution endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DistributionQuery {
    #[serde(default)]
    pub position: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScoringDistributionResponse {
    pub match_id: i64,
    pub team_id: i64,
    /// player_id -> probability that player scores a given team try
    pub probabilities: BTreeMap<String, f64>,
}

/// Joint probability request.
///
/// `try_dist` keys are try counts as strings, as in JSON objects.
#[derive(Debug, Clone, Deserialize)]
pub struct JointProbabilityRequest {
    pub try_dist: HashMap<String, f64>,
    pub player_probs: Vec<f64>,
    pub min_tries: Vec<u32>,
    #[serde(default)]
    pub offered_odds: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct JointProbabilityResponse {
    pub probability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PriceSignal>,
}

#[derive(Debug, Serialize)]
pub struct OutcomeBinsResponse {
    pub match_id: i64,
    #[serde(flatten)]
    pub outcome: AggregatedOutcome,
}

/// Same-game multi request
#[derive(Debug, Clone, Deserialize)]
pub struct SgmRequest {
    pub team_id: i64,
    pub legs: Vec<SgmLeg>,
    #[serde(default)]
    pub margin_gte: Option<i32>,
    #[serde(default)]
    pub margin_lte: Option<i32>,
    #[serde(default)]
    pub total_gte: Option<i32>,
    #[serde(default)]
    pub total_lte: Option<i32>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub offered_odds: Option<f64>,
}

impl SgmRequest {
    pub fn filter(&self) -> BinFilter {
        BinFilter {
            margin_gte: self.margin_gte,
            margin_lte: self.margin_lte,
            total_gte: self.total_gte,
            total_lte: self.total_lte,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SgmResponse {
    #[serde(flatten)]
    pub price: SgmPrice,
    pub pricing: PriceSignal,
}

/// Query for the latest-results endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub round: Option<u32>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgm_request_defaults() {
        let req: SgmRequest = serde_json::from_str(
            r#"{"team_id": 1, "legs": [{"player_id": "101", "min_tries": 2}], "margin_gte": 1}"#,
        )
        .unwrap();

        assert_eq!(req.legs[0].min_tries, 2);
        assert!(req.offered_odds.is_none());
        let filter = req.filter();
        assert_eq!(filter.margin_gte, Some(1));
        assert!(filter.total_lte.is_none());
    }

    #[test]
    fn test_joint_request_string_keys() {
        let req: JointProbabilityRequest = serde_json::from_str(
            r#"{"try_dist": {"0": 0.25, "3": 0.75}, "player_probs": [0.3], "min_tries": [1]}"#,
        )
        .unwrap();
        assert_eq!(req.try_dist["3"], 0.75);
    }

    #[test]
    fn test_price_signal_skips_missing_fields() {
        let signal = PriceSignal {
            fair_odds: Some(4.0),
            offered_odds: None,
            expected_value: None,
            kelly_fraction: None,
            value_bet: false,
        };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json, serde_json::json!({"fair_odds": 4.0, "value_bet": false}));
    }
}
