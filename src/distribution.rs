//! Team try-count distribution shared by the joint calculator, the outcome
//! bin aggregator and storage.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::EngineError;

/// Largest try count accepted as a distribution key.
pub const MAX_TRY_COUNT: u32 = 60;

/// Slack allowed between the total mass of a distribution and 1.
pub const MASS_TOLERANCE: f64 = 1e-9;

/// Probability of a team scoring exactly `k` tries in a match.
///
/// Keys serialize as JSON strings (`{"0": 0.12, "1": 0.88}`). Values are
/// finite and non-negative, and the total mass is 1 within
/// [`MASS_TOLERANCE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<u32, f64>", into = "BTreeMap<u32, f64>")]
pub struct TryCountDistribution(BTreeMap<u32, f64>);

impl TryCountDistribution {
    /// Validate and wrap a distribution.
    pub fn new(probs: BTreeMap<u32, f64>) -> Result<Self, EngineError> {
        if probs.is_empty() {
            return Err(EngineError::invalid("try distribution is empty"));
        }

        for (&k, &p) in &probs {
            if k > MAX_TRY_COUNT {
                return Err(EngineError::invalid(format!(
                    "try count {} exceeds supported maximum {}",
                    k, MAX_TRY_COUNT
                )));
            }
            if !p.is_finite() || p < 0.0 {
                return Err(EngineError::invalid(format!(
                    "probability for {} tries must be finite and non-negative, got {}",
                    k, p
                )));
            }
        }

        let total: f64 = probs.values().sum();
        if (total - 1.0).abs() > MASS_TOLERANCE {
            return Err(EngineError::invalid(format!(
                "try distribution sums to {:.9}, expected 1",
                total
            )));
        }

        Ok(Self(probs))
    }

    /// Parse a wire-format distribution whose keys are string-encoded
    /// non-negative integers.
    pub fn from_string_keys(raw: &HashMap<String, f64>) -> Result<Self, EngineError> {
        let mut probs = BTreeMap::new();
        for (key, &p) in raw {
            let digits = !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit());
            let parsed = if digits { key.parse::<u32>().ok() } else { None };
            let k = parsed.ok_or_else(|| {
                EngineError::invalid(format!(
                    "try distribution key '{}' is not a non-negative integer",
                    key
                ))
            })?;
            if probs.insert(k, p).is_some() {
                return Err(EngineError::invalid(format!(
                    "try distribution key {} appears more than once",
                    k
                )));
            }
        }
        Self::new(probs)
    }

    /// Probability of exactly `k` tries (0 for keys outside the support).
    pub fn probability(&self, k: u32) -> f64 {
        self.0.get(&k).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.0.iter().map(|(&k, &p)| (k, p))
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl TryFrom<BTreeMap<u32, f64>> for TryCountDistribution {
    type Error = EngineError;

    fn try_from(probs: BTreeMap<u32, f64>) -> Result<Self, Self::Error> {
        Self::new(probs)
    }
}

impl From<TryCountDistribution> for BTreeMap<u32, f64> {
    fn from(dist: TryCountDistribution) -> Self {
        dist.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_string_keys() {
        let mut raw = HashMap::new();
        raw.insert("0".to_string(), 0.25);
        raw.insert("2".to_string(), 0.75);

        let dist = TryCountDistribution::from_string_keys(&raw).unwrap();
        assert_eq!(dist.len(), 2);
        assert_eq!(dist.probability(2), 0.75);
        assert_eq!(dist.probability(1), 0.0);
    }

    #[test]
    fn test_rejects_bad_keys() {
        let mut raw = HashMap::new();
        raw.insert("-1".to_string(), 0.5);
        assert!(TryCountDistribution::from_string_keys(&raw).is_err());

        let mut raw = HashMap::new();
        raw.insert("two".to_string(), 0.5);
        assert!(TryCountDistribution::from_string_keys(&raw).is_err());
    }

    #[test]
    fn test_rejects_empty_and_negative() {
        assert!(TryCountDistribution::new(BTreeMap::new()).is_err());

        let probs = BTreeMap::from([(0, 1.2), (1, -0.2)]);
        assert!(TryCountDistribution::new(probs).is_err());
    }

    #[test]
    fn test_rejects_mass_above_one() {
        let probs = BTreeMap::from([(0, 0.6), (1, 0.6)]);
        assert!(matches!(
            TryCountDistribution::new(probs),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_tail() {
        let probs = BTreeMap::from([(0, 0.3), (1, 0.5)]);
        assert!(matches!(
            TryCountDistribution::new(probs),
            Err(EngineError::InvalidInput(_))
        ));

        let raw = HashMap::from([("3".to_string(), 0.2)]);
        assert!(TryCountDistribution::from_string_keys(&raw).is_err());
    }

    #[test]
    fn test_accepts_rounding_noise() {
        let probs = BTreeMap::from([(0, 0.1), (1, 0.2), (2, 0.3), (3, 0.4)]);
        let dist = TryCountDistribution::new(probs).unwrap();
        assert!((dist.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_signed_and_padded_keys() {
        for key in ["+3", " 3 ", "3 ", "", "3.0", "0x3"] {
            let raw = HashMap::from([(key.to_string(), 1.0)]);
            assert!(
                TryCountDistribution::from_string_keys(&raw).is_err(),
                "key {:?}",
                key
            );
        }

        let raw = HashMap::from([("03".to_string(), 1.0)]);
        let dist = TryCountDistribution::from_string_keys(&raw).unwrap();
        assert_eq!(dist.probability(3), 1.0);
    }

    #[test]
    fn test_json_keys_are_strings() {
        let dist = TryCountDistribution::new(BTreeMap::from([(3, 1.0)])).unwrap();
        let json = serde_json::to_string(&dist).unwrap();
        assert_eq!(json, r#"{"3":1.0}"#);

        let back: TryCountDistribution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dist);

        let invalid: Result<TryCountDistribution, _> = serde_json::from_str(r#"{"1":1.5}"#);
        assert!(invalid.is_err());
    }
}
