//! Closed-form answers for the simple case: flat rate, no soft pity, one copy.

use crate::error::{invalid, Result};
use serde::{Deserialize, Serialize};

/// How the quoted rate relates to the item you want.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnalyticMode {
    /// The rate is the pickup's own rate and pity guarantees the pickup.
    Pickup,
    /// The rate is for a whole grade of `characters_in_grade` equally likely
    /// items; pity guarantees the grade, not the item.
    Grade { characters_in_grade: u32 },
}

impl Default for AnalyticMode {
    fn default() -> Self {
        AnalyticMode::Grade { characters_in_grade: 22 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticInput {
    pub rate: f64,
    pub hard_pity: Option<u32>,
    pub current_pulls: u32,
    pub planned_pulls: f64,
    pub price_per_pull: f64,
    pub mode: AnalyticMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticCosts {
    pub median: f64,
    pub p90: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticResult {
    pub median: u64,
    pub p90: u64,
    pub p99: u64,
    pub expected: f64,
    /// Per-pull chance of the specific item, in percent.
    pub effective_rate_percent: f64,
    pub planned_success_rate: f64,
    pub costs: AnalyticCosts,
    /// Grade mode with pity only.
    pub first_cycle_success_rate: Option<f64>,
    pub cycle_success_rate: Option<f64>,
    pub remaining_pity: Option<u32>,
    pub completed_cycles: u32,
}

/// Success probability after `n` pulls under one of the closed-form models.
#[derive(Debug, Clone, Copy)]
enum Curve {
    Geometric { rate: f64, remaining: Option<u32> },
    /// Grade mode with pity. Pity resets on any grade win, including the wrong
    /// character, which this curve does not model: it treats every cycle as
    /// running the full pity length.
    GradeCycles {
        specific: f64,
        remaining: u32,
        pity: u32,
        fail_first: f64,
        fail_cycle: f64,
    },
}

impl Curve {
    fn success(&self, n: u64) -> f64 {
        match *self {
            Curve::Geometric { rate, remaining } => {
                if remaining.is_some_and(|r| n >= r as u64) {
                    1.0
                } else {
                    1.0 - (1.0 - rate).powf(n as f64)
                }
            }
            Curve::GradeCycles {
                specific,
                remaining,
                pity,
                fail_first,
                fail_cycle,
            } => {
                if n == 0 {
                    return 0.0;
                }
                let remaining = remaining as u64;
                if n < remaining {
                    return 1.0 - (1.0 - specific).powf(n as f64);
                }
                if n == remaining {
                    return 1.0 - fail_first;
                }
                let after_first = n - remaining;
                let full_cycles = after_first / pity as u64;
                let in_cycle = after_first % pity as u64;
                let mut fail = fail_first * fail_cycle.powf(full_cycles as f64);
                if in_cycle > 0 {
                    fail *= (1.0 - specific).powf(in_cycle as f64);
                }
                1.0 - fail
            }
        }
    }

    /// Success for a possibly fractional budget. The flat curve takes the
    /// budget as is; the cycle curve counts whole pulls.
    fn success_within(&self, budget: f64) -> f64 {
        match *self {
            Curve::Geometric { rate, remaining } => {
                if remaining.is_some_and(|r| budget >= r as f64) {
                    1.0
                } else {
                    1.0 - (1.0 - rate).powf(budget)
                }
            }
            Curve::GradeCycles { .. } => self.success(budget.floor() as u64),
        }
    }

    /// Fewest pulls whose success probability reaches `target`.
    fn pulls_for(&self, target: f64) -> u64 {
        match *self {
            Curve::Geometric { rate, remaining } => {
                if rate >= 1.0 {
                    return 1;
                }
                let pulls = ((1.0 - target).ln() / (1.0 - rate).ln()).ceil().max(1.0) as u64;
                match remaining {
                    Some(r) if pulls > r as u64 => r as u64,
                    _ => pulls,
                }
            }
            Curve::GradeCycles { pity, .. } => {
                let max = pity as u64 * 100;
                (1..=max).find(|&n| self.success(n) >= target).unwrap_or(max)
            }
        }
    }
}

pub fn evaluate_analytic(input: &AnalyticInput) -> Result<AnalyticResult> {
    if !(input.rate > 0.0 && input.rate <= 1.0) {
        return Err(invalid(format!("rate {} outside (0, 1]", input.rate)));
    }
    if !(input.planned_pulls > 0.0) {
        return Err(invalid("planned pulls must be positive"));
    }
    if !(input.price_per_pull > 0.0) {
        return Err(invalid("price per pull must be positive"));
    }

    let pity = input.hard_pity.filter(|&p| p > 0);
    let remaining = pity.map(|p| p - input.current_pulls % p);
    let completed_cycles = pity.map_or(0, |p| input.current_pulls / p);

    let (curve, specific, expected, cycle_rates) = match input.mode {
        AnalyticMode::Pickup => {
            let rate = input.rate;
            let expected = match remaining {
                Some(r) => (1.0 / rate).min(r as f64),
                None => 1.0 / rate,
            };
            (Curve::Geometric { rate, remaining }, rate, expected, None)
        }
        AnalyticMode::Grade { characters_in_grade } => {
            if characters_in_grade < 1 {
                return Err(invalid("characters in grade must be at least 1"));
            }
            let char_rate = 1.0 / characters_in_grade as f64;
            let specific = input.rate * char_rate;
            match (pity, remaining) {
                (Some(pity), Some(remaining)) => {
                    let fail_first = (1.0 - specific).powf(remaining as f64 - 1.0) * (1.0 - char_rate);
                    let fail_cycle = (1.0 - specific).powf(pity as f64 - 1.0) * (1.0 - char_rate);
                    let expected_cycles = 1.0 / (1.0 - fail_cycle);
                    let expected = remaining as f64 + (expected_cycles - 1.0) * pity as f64;
                    let curve = Curve::GradeCycles {
                        specific,
                        remaining,
                        pity,
                        fail_first,
                        fail_cycle,
                    };
                    let rates = ((1.0 - fail_first) * 100.0, (1.0 - fail_cycle) * 100.0);
                    (curve, specific, expected, Some(rates))
                }
                _ => (
                    Curve::Geometric {
                        rate: specific,
                        remaining: None,
                    },
                    specific,
                    1.0 / specific,
                    None,
                ),
            }
        }
    };

    let median = curve.pulls_for(0.5);
    let p90 = curve.pulls_for(0.9);
    let p99 = curve.pulls_for(0.99);
    let price = input.price_per_pull;

    Ok(AnalyticResult {
        median,
        p90,
        p99,
        expected,
        effective_rate_percent: specific * 100.0,
        planned_success_rate: curve.success_within(input.planned_pulls) * 100.0,
        costs: AnalyticCosts {
            median: median as f64 * price,
            p90: p90 as f64 * price,
            p99: p99 as f64 * price,
        },
        first_cycle_success_rate: cycle_rates.map(|r| r.0),
        cycle_success_rate: cycle_rates.map(|r| r.1),
        remaining_pity: remaining,
        completed_cycles,
    })
}
