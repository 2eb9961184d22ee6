//! Joint "at least k tries" probability for a set of players.
//!
//! Given the team scores exactly `n` tries, each try is attributed to
//! player `i` with probability `p_i` or to the rest of the team with
//! `1 - Σp`. The joint probability that every player reaches their minimum
//! is `1 - P(any player falls short)`, with the union expanded by
//! inclusion-exclusion over player subsets:
//!
//! ```text
//! P(∪ A_i) = Σ_S (-1)^(|S|+1) P(∩_{i∈S} A_i),   A_i = {X_i < min_i}
//! ```
//!
//! Players outside `S` are unconstrained, so they merge into the rest bucket
//! (the marginal of a multinomial over merged categories is multinomial).
//! Each subset therefore only enumerates the capped allocations of its own
//! members. Those allocations do not depend on `n`, so they are folded once
//! into per-total coefficients and reused for every `n` in the distribution.
//!
//! Cost is `Π(1 + min_i) - 1` allocations in total; inputs above
//! [`MAX_ENUMERATION`] are rejected up front.

use crate::distribution::{TryCountDistribution, MAX_TRY_COUNT};
use crate::error::EngineError;

/// Most players a single query may constrain.
pub const MAX_PLAYERS: usize = 8;

/// Largest per-player minimum accepted.
pub const MAX_MIN_TRIES: u32 = 10;

/// Ceiling on allocations enumerated across all subsets.
pub const MAX_ENUMERATION: u64 = 2_000_000;

const PROB_TOLERANCE: f64 = 1e-9;

/// Non-empty subsets of `0..k`, as ascending index lists.
#[derive(Debug, Clone)]
pub struct Subsets {
    k: usize,
    mask: u64,
}

impl Subsets {
    pub fn new(k: usize) -> Self {
        assert!(k < 64, "subset enumeration supports at most 63 items");
        Self { k, mask: 1 }
    }
}

impl Iterator for Subsets {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.mask >= 1u64 << self.k {
            return None;
        }
        let subset = (0..self.k).filter(|&i| self.mask & (1u64 << i) != 0).collect();
        self.mask += 1;
        Some(subset)
    }
}

/// Every vector `x` with `0 <= x[i] < limits[i]`, odometer order.
///
/// A zero limit admits no values, so the iterator is empty. An empty
/// `limits` yields the single empty allocation.
#[derive(Debug, Clone)]
pub struct Allocations {
    limits: Vec<u32>,
    current: Option<Vec<u32>>,
}

impl Allocations {
    pub fn new(limits: Vec<u32>) -> Self {
        let current = if limits.iter().any(|&l| l == 0) {
            None
        } else {
            Some(vec![0; limits.len()])
        };
        Self { limits, current }
    }
}

impl Iterator for Allocations {
    type Item = Vec<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        let mut advanced = current.clone();

        let mut rolled_over = true;
        for (slot, &limit) in advanced.iter_mut().zip(&self.limits) {
            *slot += 1;
            if *slot < limit {
                rolled_over = false;
                break;
            }
            *slot = 0;
        }
        if !rolled_over {
            self.current = Some(advanced);
        }

        Some(current)
    }
}

/// Allocations enumerated across all subsets for these minimums.
pub fn enumeration_size(min_tries: &[u32]) -> u64 {
    min_tries
        .iter()
        .fold(1u64, |acc, &m| acc.saturating_mul(m as u64 + 1))
        - 1
}

/// `ln(i!)` for `i` in `0..=n`.
fn ln_factorials(n: u32) -> Vec<f64> {
    let mut table = Vec::with_capacity(n as usize + 1);
    let mut acc = 0.0;
    table.push(acc);
    for i in 1..=n {
        acc += (i as f64).ln();
        table.push(acc);
    }
    table
}

/// One inclusion-exclusion term: `P(every member of S falls short | n)`.
#[derive(Debug, Clone)]
struct ShortfallTerm {
    /// `+1` for odd-sized subsets, `-1` for even.
    sign: f64,
    /// `coefficients[t] = Σ_{Σx = t} Π p_i^x_i / x_i!` over capped allocations.
    coefficients: Vec<f64>,
    /// Attribution probability of everyone outside the subset.
    p_rest: f64,
}

impl ShortfallTerm {
    fn build(subset: &[usize], probs: &[f64], min_tries: &[u32], ln_fact: &[f64]) -> Self {
        let limits: Vec<u32> = subset.iter().map(|&i| min_tries[i]).collect();
        let max_total: u32 = limits.iter().map(|&l| l.saturating_sub(1)).sum();
        let mut coefficients = vec![0.0; max_total as usize + 1];

        for allocation in Allocations::new(limits) {
            let mut log_weight = 0.0;
            let mut possible = true;
            for (&x, &i) in allocation.iter().zip(subset) {
                if x == 0 {
                    continue;
                }
                if probs[i] == 0.0 {
                    possible = false;
                    break;
                }
                log_weight += x as f64 * probs[i].ln() - ln_fact[x as usize];
            }
            if possible {
                let total: u32 = allocation.iter().sum();
                coefficients[total as usize] += log_weight.exp();
            }
        }

        let p_subset: f64 = subset.iter().map(|&i| probs[i]).sum();
        let sign = if subset.len() % 2 == 1 { 1.0 } else { -1.0 };

        Self {
            sign,
            coefficients,
            p_rest: (1.0 - p_subset).max(0.0),
        }
    }

    fn probability(&self, n: u32, ln_fact: &[f64]) -> f64 {
        let upper = (n as usize).min(self.coefficients.len() - 1);
        (0..=upper)
            .map(|t| {
                let rest = n - t as u32;
                let falling = (ln_fact[n as usize] - ln_fact[rest as usize]).exp();
                self.coefficients[t] * falling * self.p_rest.powi(rest as i32)
            })
            .sum()
    }
}

fn validate(probs: &[f64], min_tries: &[u32]) -> Result<(), EngineError> {
    if probs.len() != min_tries.len() {
        return Err(EngineError::invalid(format!(
            "player_probs has {} entries but min_tries has {}",
            probs.len(),
            min_tries.len()
        )));
    }
    if probs.len() > MAX_PLAYERS {
        return Err(EngineError::invalid(format!(
            "at most {} players are supported, got {}",
            MAX_PLAYERS,
            probs.len()
        )));
    }
    if let Some(p) = probs.iter().find(|p| !p.is_finite() || **p < 0.0 || **p > 1.0) {
        return Err(EngineError::invalid(format!(
            "player probability {} is outside [0, 1]",
            p
        )));
    }
    let total: f64 = probs.iter().sum();
    if total > 1.0 + PROB_TOLERANCE {
        return Err(EngineError::invalid(format!(
            "player probabilities sum to {:.6}, above 1",
            total
        )));
    }
    if let Some(m) = min_tries.iter().find(|&&m| m > MAX_MIN_TRIES) {
        return Err(EngineError::invalid(format!(
            "min_tries {} exceeds supported maximum {}",
            m, MAX_MIN_TRIES
        )));
    }
    let size = enumeration_size(min_tries);
    if size > MAX_ENUMERATION {
        return Err(EngineError::invalid(format!(
            "query needs {} allocations, above the limit of {}",
            size, MAX_ENUMERATION
        )));
    }
    Ok(())
}

/// `P(∀i: X_i >= min_tries[i])` against a team try-count distribution.
///
/// `probs` are per-player attribution probabilities (each in `[0, 1]`,
/// summing to at most 1). With no players, or all minimums zero, the
/// result is 1.
pub fn joint_min_tries_probability(
    dist: &TryCountDistribution,
    probs: &[f64],
    min_tries: &[u32],
) -> Result<f64, EngineError> {
    validate(probs, min_tries)?;

    let ln_fact = ln_factorials(MAX_TRY_COUNT);
    let terms: Vec<ShortfallTerm> = Subsets::new(probs.len())
        .map(|subset| ShortfallTerm::build(&subset, probs, min_tries, &ln_fact))
        .collect();
    let required: u32 = min_tries.iter().sum();

    let probability: f64 = dist
        .iter()
        .filter(|&(n, _)| n >= required)
        .map(|(n, p_n)| {
            let union: f64 = terms
                .iter()
                .map(|term| term.sign * term.probability(n, &ln_fact))
                .sum();
            p_n * (1.0 - union).clamp(0.0, 1.0)
        })
        .sum();

    tracing::debug!(
        players = probs.len(),
        subsets = terms.len(),
        support = dist.len(),
        mass = dist.total(),
        probability,
        "computed joint min-tries probability"
    );

    Ok(probability.clamp(0.0, 1.0))
}
