//! Betting helpers: fair odds, EV calculation, Kelly criterion.
//!
//! All odds are decimal (total return per unit staked, e.g. 3.5).

use crate::config::BettingConfig;
use crate::types::PriceSignal;

/// Fair decimal odds for a probability (`None` when the event is impossible).
pub fn fair_odds(probability: f64) -> Option<f64> {
    if probability > 0.0 {
        Some(1.0 / probability)
    } else {
        None
    }
}

/// Calculate expected value.
///
/// # Returns
/// Expected return per unit staked (> 1.0 indicates positive edge)
pub fn calculate_ev(probability: f64, odds: f64) -> f64 {
    probability * odds
}

/// Calculate Kelly criterion fraction.
///
/// Kelly fraction = (p * b - q) / b
/// where:
///   p = probability of winning
///   b = net odds (decimal odds - 1)
///   q = 1 - p (probability of losing)
///
/// # Returns
/// Optimal fraction of bankroll to bet (0 if negative EV)
pub fn calculate_kelly_fraction(probability: f64, odds: f64) -> f64 {
    if probability <= 0.0 || odds <= 1.0 {
        return 0.0;
    }

    let b = odds - 1.0;
    let q = 1.0 - probability;

    let kelly = (probability * b - q) / b;
    kelly.max(0.0)
}

/// Price a computed probability, comparing it to offered odds if any.
pub fn price_signal(probability: f64, offered_odds: Option<f64>, config: &BettingConfig) -> PriceSignal {
    let fair = fair_odds(probability);

    match offered_odds {
        Some(odds) => {
            let ev = calculate_ev(probability, odds);
            let kelly = calculate_kelly_fraction(probability, odds);
            PriceSignal {
                fair_odds: fair,
                offered_odds: Some(odds),
                expected_value: Some(ev),
                kelly_fraction: Some(kelly * config.kelly_fraction),
                value_bet: ev > config.ev_threshold,
            }
        }
        None => PriceSignal {
            fair_odds: fair,
            offered_odds: None,
            expected_value: None,
            kelly_fraction: None,
            value_bet: false,
        },
    }
}
