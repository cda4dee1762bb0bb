use crate::acquisition::SingleAcquisition;
use crate::config::{GachaConfig, PullState};
use crate::convolution::multi_copy_distribution;
use crate::error::{invalid, Result};
use crate::query::planned_success_rate;
use crate::rate::RateModel;
use crate::stats::{self, DistributionStats};
use log::{debug, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Omitted tail mass above which a truncated result is flagged approximate.
pub const NEGLIGIBLE_TAIL: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub config: GachaConfig,
    pub state: PullState,
    pub planned_pulls: f64,
    pub price_per_pull: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostProjection {
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

/// Distribution and budget-independent statistics for one (config, state) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Acquisition {
    /// `distribution[k]` = P(exactly k pulls); index 0 unused.
    pub distribution: Vec<f64>,
    #[serde(skip)]
    pub cdf: Vec<f64>,
    pub stats: DistributionStats,
    /// No hard pity and more than [`NEGLIGIBLE_TAIL`] of the mass lies past the cap.
    pub approximate: bool,
    pub omitted_mass: f64,
    pub completed_cycles: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    #[serde(flatten)]
    pub acquisition: Arc<Acquisition>,
    pub planned_success_rate: f64,
    pub costs: CostProjection,
}

impl Evaluation {
    pub fn stats(&self) -> &DistributionStats {
        &self.acquisition.stats
    }
}

/// Exact pull-count distribution and statistics for a scenario.
pub fn evaluate(scenario: &Scenario) -> Result<Evaluation> {
    validate_budget(scenario)?;
    let acquisition = acquire(&scenario.config, &scenario.state)?;
    Ok(finish(scenario, Arc::new(acquisition)))
}

/// Budget-independent half of [`evaluate`]: everything keyed by config and state.
pub fn acquire(config: &GachaConfig, state: &PullState) -> Result<Acquisition> {
    config.validate()?;
    let model = RateModel::new(config);
    let single = SingleAcquisition::new(&model, config.pickup);
    let start_pity = config.start_pity(state);

    let mut distribution =
        multi_copy_distribution(&single, start_pity, state.current_guarantee, config.target_copies);
    sanitize(&mut distribution);

    let has_pity = model.hard_pity().is_some();
    let raw_mass = if has_pity {
        stats::normalize(&mut distribution)
    } else {
        distribution.iter().sum()
    };
    let omitted_mass = if has_pity { 0.0 } else { (1.0 - raw_mass).max(0.0) };
    let approximate = omitted_mass > NEGLIGIBLE_TAIL;
    if approximate {
        warn!(
            "[Engine] Distribution truncated at {} pulls; {:.4}% of the mass is not represented",
            distribution.len().saturating_sub(1),
            omitted_mass * 100.0
        );
    }
    debug!(
        "[Engine] {} entries, raw mass {:.12}, start pity {}",
        distribution.len(),
        raw_mass,
        start_pity
    );

    let cdf = stats::cdf(&distribution);
    let mut stats = DistributionStats::from_distribution(&distribution, &cdf);
    if !stats.mean.is_finite() || !stats.variance.is_finite() {
        warn!("[Engine] Non-finite moments, reporting zero");
        stats.mean = 0.0;
        stats.variance = 0.0;
        stats.std_dev = 0.0;
    }

    Ok(Acquisition {
        distribution,
        cdf,
        stats,
        approximate,
        omitted_mass,
        completed_cycles: config.completed_cycles(state),
    })
}

fn validate_budget(scenario: &Scenario) -> Result<()> {
    if !(scenario.planned_pulls > 0.0) {
        return Err(invalid(format!("planned pulls {} must be positive", scenario.planned_pulls)));
    }
    if !(scenario.price_per_pull > 0.0) {
        return Err(invalid(format!("price per pull {} must be positive", scenario.price_per_pull)));
    }
    Ok(())
}

fn finish(scenario: &Scenario, acquisition: Arc<Acquisition>) -> Evaluation {
    let price = scenario.price_per_pull;
    let stats = &acquisition.stats;
    let costs = CostProjection {
        mean: (stats.mean * price).round(),
        p50: stats.percentile(50) as f64 * price,
        p90: stats.percentile(90) as f64 * price,
        p99: stats.percentile(99) as f64 * price,
    };
    let planned_success_rate = planned_success_rate(&acquisition.cdf, scenario.planned_pulls);
    Evaluation {
        acquisition,
        planned_success_rate,
        costs,
    }
}

/// Replaces NaN, infinities, negatives and subnormal dust with zero.
fn sanitize(dist: &mut [f64]) {
    let mut replaced = 0usize;
    for p in dist.iter_mut() {
        if !p.is_finite() || *p < 0.0 {
            *p = 0.0;
            replaced += 1;
        } else if *p < 1e-300 {
            *p = 0.0;
        }
    }
    if replaced > 0 {
        warn!("[Engine] Replaced {} degenerate probabilities with zero", replaced);
    }
}

/// Opt-in memo of [`acquire`] results keyed by a SHA-256 of the canonical
/// JSON of (config, state). Budget and price are applied per call.
#[derive(Debug, Default)]
pub struct EvaluationCache {
    entries: HashMap<String, Arc<Acquisition>>,
    hits: usize,
}

impl EvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(config: &GachaConfig, state: &PullState) -> String {
        let canonical = serde_json::to_vec(&(config, state)).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn evaluate(&mut self, scenario: &Scenario) -> Result<Evaluation> {
        validate_budget(scenario)?;
        let key = Self::key(&scenario.config, &scenario.state);
        let acquisition = match self.entries.get(&key) {
            Some(hit) => {
                self.hits += 1;
                Arc::clone(hit)
            }
            None => {
                let fresh = Arc::new(acquire(&scenario.config, &scenario.state)?);
                self.entries.insert(key, Arc::clone(&fresh));
                fresh
            }
        };
        Ok(finish(scenario, acquisition))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PickupPolicy;
    use crate::error::EngineError;

    fn scenario(config: GachaConfig) -> Scenario {
        Scenario {
            config,
            state: PullState::default(),
            planned_pulls: 100.0,
            price_per_pull: 2000.0,
        }
    }

    #[test]
    fn hard_pity_distribution_sums_to_one() {
        for pickup in [
            PickupPolicy::Always,
            PickupPolicy::GuaranteeOnFail { rate: 0.5 },
            PickupPolicy::IndependentTrial { rate: 0.5 },
        ] {
            let eval = evaluate(&scenario(GachaConfig {
                base_rate: 0.006,
                hard_pity: Some(90),
                soft_pity_start: 74,
                soft_pity_increase: 0.06,
                pickup,
                target_copies: 3,
            }))
            .unwrap();
            let total: f64 = eval.acquisition.distribution.iter().sum();
            assert!((total - 1.0).abs() < 1e-6, "{:?}: {}", pickup, total);
            assert!(!eval.acquisition.approximate);
        }
    }

    #[test]
    fn ten_percent_no_pity_ten_pulls() {
        let mut s = scenario(GachaConfig {
            base_rate: 0.1,
            hard_pity: None,
            ..GachaConfig::default()
        });
        s.planned_pulls = 10.0;
        let eval = evaluate(&s).unwrap();
        let expected = (1.0 - 0.9f64.powi(10)) * 100.0;
        assert!((eval.planned_success_rate - expected).abs() < 1e-6);
        assert!((eval.planned_success_rate - 65.13).abs() < 0.01);
        assert!(!eval.acquisition.approximate);
    }

    #[test]
    fn soft_pity_ramp_ends_at_hard_pity() {
        let eval = evaluate(&scenario(GachaConfig {
            base_rate: 0.006,
            hard_pity: Some(100),
            soft_pity_start: 74,
            soft_pity_increase: 0.06,
            ..GachaConfig::default()
        }))
        .unwrap();
        let dist = &eval.acquisition.distribution;
        assert_eq!(dist.len() - 1, 100);

        let model = RateModel::new(&GachaConfig {
            base_rate: 0.006,
            hard_pity: Some(100),
            soft_pity_start: 74,
            soft_pity_increase: 0.06,
            ..GachaConfig::default()
        });
        let survival: f64 = (1..100).map(|k| 1.0 - model.rate_at(k)).product();
        assert!((dist[100] - survival).abs() < 1e-12);
        // +6% per pull from 74 reaches certainty at pull 90, so nothing is left
        // for the pity pull and the visible support ends a few pulls earlier.
        assert_eq!(dist[100], 0.0);
        assert!(dist[91..].iter().all(|&p| p == 0.0));
        assert!(dist[90] > 0.0);
        assert_eq!(eval.stats().max, 87);
    }

    #[test]
    fn gentle_ramp_leaves_mass_on_the_pity_pull() {
        let config = GachaConfig {
            base_rate: 0.006,
            hard_pity: Some(100),
            soft_pity_start: 74,
            soft_pity_increase: 0.002,
            ..GachaConfig::default()
        };
        let eval = evaluate(&scenario(config.clone())).unwrap();
        let model = RateModel::new(&config);
        let survival: f64 = (1..100).map(|k| 1.0 - model.rate_at(k)).product();
        let dist = &eval.acquisition.distribution;
        assert!(survival > 1e-4);
        assert!((dist[100] - survival).abs() < 1e-9);
        assert_eq!(eval.stats().max, 100);
        assert_eq!(eval.stats().percentile(99), 100);
    }

    #[test]
    fn fifty_fifty_regression_baseline() {
        // Pinned from the first trusted run of this engine.
        let eval = evaluate(&scenario(GachaConfig {
            base_rate: 0.01,
            hard_pity: Some(90),
            pickup: PickupPolicy::GuaranteeOnFail { rate: 0.5 },
            ..GachaConfig::default()
        }))
        .unwrap();
        let stats = eval.stats();
        assert!((stats.mean - MEAN_BASELINE).abs() < 1e-6, "mean {}", stats.mean);
        assert!((stats.std_dev - STD_BASELINE).abs() < 1e-6, "std {}", stats.std_dev);
        assert_eq!(stats.percentile(50), P50_BASELINE);
        assert_eq!(stats.percentile(90), P90_BASELINE);
        assert!((eval.planned_success_rate - PLANNED_100_BASELINE).abs() < 1e-6);
    }

    const MEAN_BASELINE: f64 = 89.290204098251;
    const STD_BASELINE: f64 = 49.108930438814;
    const P50_BASELINE: usize = 90;
    const P90_BASELINE: usize = 170;
    const PLANNED_100_BASELINE: f64 = 66.909197430350;

    #[test]
    fn histogram_covers_all_mass_with_hard_pity() {
        let eval = evaluate(&scenario(GachaConfig {
            base_rate: 0.02,
            hard_pity: Some(60),
            pickup: PickupPolicy::GuaranteeOnFail { rate: 0.5 },
            target_copies: 2,
            ..GachaConfig::default()
        }))
        .unwrap();
        let total: f64 = eval.stats().histogram.iter().map(|b| b.percent).sum();
        // Only entries below the 1e-4 support threshold fall outside [min, max].
        assert!((total - 100.0).abs() < 0.5, "histogram total {}", total);
        assert!(eval.stats().histogram.len() <= 30);
    }

    #[test]
    fn low_rate_without_pity_is_flagged_approximate() {
        let eval = evaluate(&scenario(GachaConfig {
            base_rate: 0.0002,
            hard_pity: None,
            pickup: PickupPolicy::GuaranteeOnFail { rate: 0.5 },
            ..GachaConfig::default()
        }))
        .unwrap();
        assert!(eval.acquisition.approximate);
        assert!(eval.acquisition.omitted_mass > NEGLIGIBLE_TAIL);
        assert!(eval.planned_success_rate < 100.0);
    }

    #[test]
    fn costs_follow_percentiles() {
        let eval = evaluate(&scenario(GachaConfig::default())).unwrap();
        let stats = eval.stats();
        assert_eq!(eval.costs.p50, stats.percentile(50) as f64 * 2000.0);
        assert_eq!(eval.costs.mean, (stats.mean * 2000.0).round());
    }

    #[test]
    fn current_pulls_wrap_into_cycles() {
        let mut s = scenario(GachaConfig {
            base_rate: 0.01,
            hard_pity: Some(90),
            ..GachaConfig::default()
        });
        s.state.current_pulls = 200;
        let eval = evaluate(&s).unwrap();
        assert_eq!(eval.acquisition.completed_cycles, 2);
        assert_eq!(eval.acquisition.distribution.len(), 71);
    }

    #[test]
    fn invalid_inputs_give_errors_and_neutral_default() {
        let mut s = scenario(GachaConfig {
            base_rate: 0.0,
            ..GachaConfig::default()
        });
        assert!(matches!(evaluate(&s), Err(EngineError::InvalidConfiguration(_))));
        s.config.base_rate = 0.01;
        s.planned_pulls = 0.0;
        assert!(evaluate(&s).is_err());
        s.planned_pulls = 10.0;
        s.price_per_pull = -1.0;
        assert!(evaluate(&s).is_err());

        let neutral = Evaluation::default();
        assert!(neutral.acquisition.distribution.is_empty());
        assert_eq!(neutral.planned_success_rate, 0.0);
    }

    #[test]
    fn sanitize_clears_degenerate_values() {
        let mut dist = vec![0.0, f64::NAN, -0.5, f64::INFINITY, 1e-310, 0.25];
        sanitize(&mut dist);
        assert_eq!(dist, vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.25]);
    }

    #[test]
    fn huge_carried_count_without_pity_stays_exact() {
        let config = GachaConfig {
            base_rate: 0.1,
            hard_pity: None,
            pickup: PickupPolicy::IndependentTrial { rate: 0.5 },
            ..GachaConfig::default()
        };
        let fresh = evaluate(&scenario(config.clone())).unwrap();
        let carried = evaluate(&Scenario {
            state: PullState {
                current_pulls: u32::MAX,
                current_guarantee: false,
            },
            ..scenario(config)
        })
        .unwrap();
        assert!(!carried.acquisition.approximate);
        assert_eq!(carried.acquisition.distribution, fresh.acquisition.distribution);
        assert!((carried.stats().mean - 20.0).abs() < 1e-4);
        assert_eq!(carried.planned_success_rate, fresh.planned_success_rate);
    }

    #[test]
    fn cache_reuses_distribution_across_budgets() {
        let mut cache = EvaluationCache::new();
        let mut s = scenario(GachaConfig::default());
        let first = cache.evaluate(&s).unwrap();
        s.planned_pulls = 50.0;
        let second = cache.evaluate(&s).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
        assert!(Arc::ptr_eq(&first.acquisition, &second.acquisition));
        assert_eq!(second, evaluate(&s).unwrap());

        s.state.current_pulls = 10;
        cache.evaluate(&s).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cache_key_is_stable_and_distinguishes_state() {
        let config = GachaConfig::default();
        let a = EvaluationCache::key(&config, &PullState::default());
        let b = EvaluationCache::key(&config, &PullState::default());
        let c = EvaluationCache::key(
            &config,
            &PullState {
                current_pulls: 0,
                current_guarantee: true,
            },
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
