//! Aggregation of precomputed outcome bins into a conditional try
//! distribution for a margin / total-points window.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::distribution::TryCountDistribution;
use crate::error::EngineError;

/// A bucket of historical or simulated outcomes for one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeBin {
    /// Home points minus away points.
    pub margin: i32,
    pub total_points: i32,
    pub home_try_dist: TryCountDistribution,
    pub away_try_dist: TryCountDistribution,
    pub count: u64,
}

/// Inclusive bounds on margin and total points. `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinFilter {
    pub margin_gte: Option<i32>,
    pub margin_lte: Option<i32>,
    pub total_gte: Option<i32>,
    pub total_lte: Option<i32>,
}

impl BinFilter {
    pub fn matches(&self, bin: &OutcomeBin) -> bool {
        self.margin_gte.map_or(true, |lo| bin.margin >= lo)
            && self.margin_lte.map_or(true, |hi| bin.margin <= hi)
            && self.total_gte.map_or(true, |lo| bin.total_points >= lo)
            && self.total_lte.map_or(true, |hi| bin.total_points <= hi)
    }

    /// True when at least one bound is set.
    pub fn is_constrained(&self) -> bool {
        self.margin_gte.is_some()
            || self.margin_lte.is_some()
            || self.total_gte.is_some()
            || self.total_lte.is_some()
    }
}

/// Count-weighted merge of the bins inside a filter window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedOutcome {
    pub home_try_dist: TryCountDistribution,
    pub away_try_dist: TryCountDistribution,
    /// Samples inside the window.
    pub total_count: u64,
    /// Share of all samples for the match that fall inside the window.
    pub selection_probability: f64,
    pub filters: BinFilter,
}

fn checked_count<'a>(mut bins: impl Iterator<Item = &'a OutcomeBin>) -> Result<u64, EngineError> {
    bins.try_fold(0u64, |acc, bin| {
        acc.checked_add(bin.count)
            .ok_or_else(|| EngineError::invalid("outcome bin counts overflow"))
    })
}

fn weighted_merge<'a>(
    dists: impl Iterator<Item = (&'a TryCountDistribution, u64)>,
    total_count: u64,
) -> Result<TryCountDistribution, EngineError> {
    let mut merged: BTreeMap<u32, f64> = BTreeMap::new();
    for (dist, count) in dists {
        for (k, p) in dist.iter() {
            *merged.entry(k).or_insert(0.0) += p * count as f64;
        }
    }
    for p in merged.values_mut() {
        *p /= total_count as f64;
    }
    TryCountDistribution::new(merged)
}

/// Aggregate the bins of one match that satisfy `filter`.
///
/// Returns `NotFound` when no bin (or no sample) survives the filter.
pub fn aggregate_bins(
    bins: &[OutcomeBin],
    filter: &BinFilter,
) -> Result<AggregatedOutcome, EngineError> {
    let selected: Vec<&OutcomeBin> = bins.iter().filter(|b| filter.matches(b)).collect();
    if selected.is_empty() {
        return Err(EngineError::not_found("no outcome bins match the requested range"));
    }

    let total_count = checked_count(selected.iter().copied())?;
    if total_count == 0 {
        return Err(EngineError::not_found("matching outcome bins carry no samples"));
    }
    let overall_count = checked_count(bins.iter())?;

    let home_try_dist = weighted_merge(
        selected.iter().map(|b| (&b.home_try_dist, b.count)),
        total_count,
    )?;
    let away_try_dist = weighted_merge(
        selected.iter().map(|b| (&b.away_try_dist, b.count)),
        total_count,
    )?;

    Ok(AggregatedOutcome {
        home_try_dist,
        away_try_dist,
        total_count,
        selection_probability: total_count as f64 / overall_count as f64,
        filters: *filter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(pairs: &[(u32, f64)]) -> TryCountDistribution {
        TryCountDistribution::new(pairs.iter().copied().collect()).unwrap()
    }

    fn sample_bins() -> Vec<OutcomeBin> {
        vec![
            OutcomeBin {
                margin: 12,
                total_points: 36,
                home_try_dist: dist(&[(4, 0.6), (5, 0.4)]),
                away_try_dist: dist(&[(2, 1.0)]),
                count: 30,
            },
            OutcomeBin {
                margin: 2,
                total_points: 30,
                home_try_dist: dist(&[(3, 0.5), (4, 0.5)]),
                away_try_dist: dist(&[(2, 0.5), (3, 0.5)]),
                count: 50,
            },
            OutcomeBin {
                margin: -8,
                total_points: 44,
                home_try_dist: dist(&[(3, 1.0)]),
                away_try_dist: dist(&[(4, 0.3), (5, 0.7)]),
                count: 20,
            },
        ]
    }

    #[test]
    fn test_unfiltered_covers_everything() {
        let agg = aggregate_bins(&sample_bins(), &BinFilter::default()).unwrap();

        assert_eq!(agg.total_count, 100);
        assert!((agg.selection_probability - 1.0).abs() < 1e-12);
        assert!((agg.home_try_dist.total() - 1.0).abs() < 1e-9);
        assert!((agg.away_try_dist.total() - 1.0).abs() < 1e-9);

        // home 4 tries: (0.6 * 30 + 0.5 * 50) / 100
        assert!((agg.home_try_dist.probability(4) - 0.43).abs() < 1e-12);
    }

    #[test]
    fn test_margin_window() {
        let filter = BinFilter {
            margin_gte: Some(1),
            ..Default::default()
        };
        let agg = aggregate_bins(&sample_bins(), &filter).unwrap();

        assert_eq!(agg.total_count, 80);
        assert!((agg.selection_probability - 0.8).abs() < 1e-12);
        assert!((agg.away_try_dist.probability(2) - (30.0 + 25.0) / 80.0).abs() < 1e-12);
        assert_eq!(agg.away_try_dist.probability(5), 0.0);
        assert!((agg.home_try_dist.total() - 1.0).abs() < 1e-9);
        assert_eq!(agg.filters, filter);
    }

    #[test]
    fn test_combined_bounds_are_inclusive() {
        let filter = BinFilter {
            margin_gte: Some(-8),
            margin_lte: Some(2),
            total_gte: Some(30),
            total_lte: Some(30),
        };
        let agg = aggregate_bins(&sample_bins(), &filter).unwrap();

        assert_eq!(agg.total_count, 50);
        assert!((agg.selection_probability - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_window_is_not_found() {
        let filter = BinFilter {
            total_gte: Some(80),
            ..Default::default()
        };
        assert!(matches!(
            aggregate_bins(&sample_bins(), &filter),
            Err(EngineError::NotFound(_))
        ));
        assert!(aggregate_bins(&[], &BinFilter::default()).is_err());
    }

    #[test]
    fn test_zero_count_window_is_not_found() {
        let mut bins = sample_bins();
        bins[2].count = 0;
        let filter = BinFilter {
            margin_lte: Some(-1),
            ..Default::default()
        };
        assert!(matches!(
            aggregate_bins(&bins, &filter),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_count_overflow_is_invalid() {
        let mut bins = sample_bins();
        bins[0].count = u64::MAX;
        assert!(matches!(
            aggregate_bins(&bins, &BinFilter::default()),
            Err(EngineError::InvalidInput(_))
        ));

        // The window alone fits, but the match total does not
        let filter = BinFilter {
            margin_gte: Some(12),
            ..Default::default()
        };
        assert!(matches!(
            aggregate_bins(&bins, &filter),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_truncated_bin_distribution_is_rejected() {
        let bin: Result<OutcomeBin, _> = serde_json::from_str(
            r#"{"margin": 4, "total_points": 20, "home_try_dist": {"2": 0.4},
                "away_try_dist": {"1": 0.1}, "count": 5}"#,
        );
        assert!(bin.is_err());
    }

    #[test]
    fn test_is_constrained() {
        assert!(!BinFilter::default().is_constrained());
        assert!(BinFilter {
            total_lte: Some(40),
            ..Default::default()
        }
        .is_constrained());
    }
}
