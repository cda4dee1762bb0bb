use crate::config::PickupPolicy;
use crate::rate::RateModel;
use log::debug;

/// Mass below this is treated as zero.
pub const EPS: f64 = 1e-12;
/// Longest hit distribution, and widest pity-counter state space.
pub const HIT_CAP: usize = 50_000;
/// Pull horizon for the independent-trial state machine.
pub const INDEPENDENT_CAP: usize = 20_000;
/// Result length for guarantee-on-fail without hard pity.
pub const GUARANTEE_CAP: usize = 10_000;

/// Distribution of pulls needed for one target copy.
///
/// `dist[k]` is the probability that the k-th pull from the starting state
/// yields the target; index 0 is unused.
#[derive(Debug, Clone, Copy)]
pub struct SingleAcquisition<'a> {
    model: &'a RateModel,
    policy: PickupPolicy,
}

impl<'a> SingleAcquisition<'a> {
    pub fn new(model: &'a RateModel, policy: PickupPolicy) -> Self {
        SingleAcquisition { model, policy }
    }

    pub fn distribution(&self, start_pity: u32, start_guarantee: bool) -> Vec<f64> {
        let hit = hit_distribution(self.model, start_pity);
        let dist = match self.policy {
            PickupPolicy::Always => hit,
            PickupPolicy::IndependentTrial { rate } if rate >= 1.0 => hit,
            PickupPolicy::GuaranteeOnFail { rate } if rate >= 1.0 => hit,
            PickupPolicy::IndependentTrial { rate } => independent_trial(self.model, start_pity, rate),
            PickupPolicy::GuaranteeOnFail { rate } => guarantee_on_fail(self.model, &hit, start_guarantee, rate),
        };
        debug!(
            "single acquisition from pity {} (guarantee {}): {} entries",
            start_pity,
            start_guarantee,
            dist.len()
        );
        dist
    }
}

/// Pulls until the next top-tier win, whichever item it is.
pub fn hit_distribution(model: &RateModel, start_pity: u32) -> Vec<f64> {
    let remaining = model
        .hard_pity()
        .map(|pity| pity.saturating_sub(start_pity).max(1) as usize);
    let max_pulls = remaining.unwrap_or(HIT_CAP).min(HIT_CAP);

    let mut dist = vec![0.0; max_pulls + 1];
    let mut survival = 1.0;
    for k in 1..=max_pulls {
        if remaining == Some(k) {
            dist[k] = survival;
            break;
        }
        let rate = model.rate_at(start_pity.saturating_add(k as u32));
        dist[k] = survival * rate;
        survival *= 1.0 - rate;
        if remaining.is_none() && survival < EPS {
            dist.truncate(k + 1);
            break;
        }
    }
    dist
}

/// Every tier win rolls the pickup; a miss resets pity and nothing else.
///
/// Without hard pity the top state is absorbing: the rate is flat from there
/// on, so any pity counter at or past it behaves the same.
fn independent_trial(model: &RateModel, start_pity: u32, pickup: f64) -> Vec<f64> {
    let base = model.base_rate();
    let (horizon, max_pulls) = match model.hard_pity() {
        // Every pity cycle ends in a win, so the live mass decays fast enough
        // for the early exit to fire long before the cap.
        Some(pity) => (pity as usize, INDEPENDENT_CAP),
        None => {
            let horizon = (model.flat_from() as usize).saturating_add(1).min(HIT_CAP);
            let max = ((20.0 / (base * pickup)).ceil() as usize).min(INDEPENDENT_CAP);
            (horizon, max)
        }
    };
    let top = horizon.saturating_sub(1);

    let mut result = vec![0.0; max_pulls + 1];
    let mut survival = vec![0.0; horizon.max(1)];
    let mut next = vec![0.0; horizon.max(1)];
    survival[(start_pity as usize).min(top)] = 1.0;

    for k in 1..=max_pulls {
        next.iter_mut().for_each(|v| *v = 0.0);
        for (i, &s) in survival.iter().enumerate() {
            if s < EPS {
                continue;
            }
            let rate = model.rate_with_pity(i as u32 + 1);
            result[k] += s * rate * pickup;
            next[0] += s * rate * (1.0 - pickup);
            if rate < 1.0 {
                next[(i + 1).min(top)] += s * (1.0 - rate);
            }
        }
        std::mem::swap(&mut survival, &mut next);
        if survival.iter().sum::<f64>() < EPS {
            result.truncate(k + 1);
            break;
        }
    }
    result
}

/// A missed pickup makes the next tier win the pickup (50/50 with carry-over).
fn guarantee_on_fail(model: &RateModel, hit: &[f64], start_guarantee: bool, pickup: f64) -> Vec<f64> {
    let cap = match model.hard_pity() {
        Some(pity) => (pity as usize).saturating_mul(3),
        None => GUARANTEE_CAP,
    };

    if start_guarantee {
        let mut result = hit.to_vec();
        result.truncate(cap + 1);
        return result;
    }

    let mut result = vec![0.0; cap + 1];
    for (k, &p) in hit.iter().enumerate().skip(1).take(cap) {
        result[k] += p * pickup;
    }

    // Miss on the first win: pity resets to 0 and the next win is guaranteed.
    let fresh = hit_distribution(model, 0);
    for (first, &p) in hit.iter().enumerate().skip(1) {
        let fail = p * (1.0 - pickup);
        if fail < EPS {
            continue;
        }
        for (second, &q) in fresh.iter().enumerate().skip(1) {
            let n = first + second;
            if n > cap {
                break;
            }
            result[n] += fail * q;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GachaConfig;

    fn model(base_rate: f64, hard_pity: Option<u32>) -> RateModel {
        RateModel::new(&GachaConfig {
            base_rate,
            hard_pity,
            ..GachaConfig::default()
        })
    }

    fn mean(dist: &[f64]) -> f64 {
        dist.iter().enumerate().map(|(k, p)| k as f64 * p).sum()
    }

    #[test]
    fn hit_distribution_forces_win_at_pity() {
        let m = model(0.01, Some(90));
        let dist = hit_distribution(&m, 0);
        assert_eq!(dist.len(), 91);
        assert!((dist[90] - 0.99f64.powi(89)).abs() < 1e-12);
        assert!((dist.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn hit_distribution_respects_start_pity() {
        let m = model(0.01, Some(90));
        let dist = hit_distribution(&m, 80);
        assert_eq!(dist.len(), 11);
        assert!((dist[10] - 0.99f64.powi(9)).abs() < 1e-12);
    }

    #[test]
    fn hit_distribution_without_pity_truncates_tail() {
        let m = model(0.1, None);
        let dist = hit_distribution(&m, 0);
        let omitted = 1.0 - dist.iter().sum::<f64>();
        assert!(omitted < EPS);
        assert!(dist.len() < 300);
        assert!((dist[1] - 0.1).abs() < 1e-15);
    }

    #[test]
    fn always_policy_is_hit_distribution() {
        let m = model(0.02, Some(50));
        let single = SingleAcquisition::new(&m, PickupPolicy::Always);
        assert_eq!(single.distribution(3, false), hit_distribution(&m, 3));
    }

    #[test]
    fn guarantee_held_skips_the_coin_flip() {
        let m = model(0.01, Some(90));
        let single = SingleAcquisition::new(&m, PickupPolicy::GuaranteeOnFail { rate: 0.5 });
        let dist = single.distribution(0, true);
        assert_eq!(dist, hit_distribution(&m, 0));
    }

    #[test]
    fn fifty_fifty_sums_to_one_within_two_cycles() {
        let m = model(0.01, Some(90));
        let single = SingleAcquisition::new(&m, PickupPolicy::GuaranteeOnFail { rate: 0.5 });
        let dist = single.distribution(0, false);
        assert_eq!(dist.len(), 271);
        assert!((dist.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(dist[181..].iter().all(|&p| p == 0.0));
        // Expected pulls: one hit cycle plus half a fresh one.
        let hit_mean = mean(&hit_distribution(&m, 0));
        assert!((mean(&dist) - 1.5 * hit_mean).abs() < 1e-6);
    }

    #[test]
    fn independent_trial_without_pity_is_geometric() {
        let m = model(0.05, None);
        let single = SingleAcquisition::new(&m, PickupPolicy::IndependentTrial { rate: 0.25 });
        let dist = single.distribution(0, false);
        let p: f64 = 0.05 * 0.25;
        for k in [1usize, 10, 100] {
            let expected = (1.0 - p).powi(k as i32 - 1) * p;
            assert!((dist[k] - expected).abs() < 1e-9, "k={} got {} want {}", k, dist[k], expected);
        }
    }

    #[test]
    fn independent_trial_with_pity_conserves_mass() {
        let m = model(0.01, Some(80));
        let single = SingleAcquisition::new(&m, PickupPolicy::IndependentTrial { rate: 0.5 });
        let dist = single.distribution(10, false);
        let total: f64 = dist.iter().sum();
        assert!((total - 1.0).abs() < 1e-6, "total mass {}", total);
    }

    #[test]
    fn independent_trial_without_pity_ignores_carried_pulls() {
        let m = model(0.1, None);
        let single = SingleAcquisition::new(&m, PickupPolicy::IndependentTrial { rate: 0.5 });
        let fresh = single.distribution(0, false);
        assert!((fresh.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!((fresh[2] - 0.95 * 0.05).abs() < 1e-12);
        for start in [140, 200, u32::MAX] {
            assert_eq!(single.distribution(start, false), fresh, "start {}", start);
        }
    }

    #[test]
    fn carried_pulls_reach_the_soft_pity_ramp() {
        let m = RateModel::new(&GachaConfig {
            base_rate: 0.5,
            hard_pity: None,
            soft_pity_start: 100,
            soft_pity_increase: 0.2,
            ..GachaConfig::default()
        });
        let single = SingleAcquisition::new(&m, PickupPolicy::IndependentTrial { rate: 0.5 });

        let dist = single.distribution(98, false);
        assert!((dist[1] - 0.25).abs() < 1e-12);
        // Miss into the ramp (0.5 * 0.7 * 0.5) or lose the pickup and restart (0.25 * 0.5 * 0.5).
        assert!((dist[2] - 0.2375).abs() < 1e-12);
        assert!((dist.iter().sum::<f64>() - 1.0).abs() < 1e-6);

        // Past the ramp the rate is pinned at 1.
        let late = single.distribution(1_000, false);
        assert!((late[1] - 0.5).abs() < 1e-12);
        assert_eq!(late, single.distribution(5_000, false));
    }

    #[test]
    fn caps_hold_under_seeded_fuzz() {
        use crate::rng::{unit_f64, Rng};

        let mut rng = Rng::from_seed(0xC0FFEE);
        for _ in 0..40 {
            let pity = if unit_f64(&mut rng) < 0.7 {
                Some(10 + rng.next_u64_bounded(190) as u32)
            } else {
                None
            };
            let base_rate = 0.02 + unit_f64(&mut rng) * 0.2;
            let soft_pity_start = rng.next_u64_bounded(120) as u32;
            let config = GachaConfig {
                base_rate,
                hard_pity: pity,
                soft_pity_start,
                soft_pity_increase: unit_f64(&mut rng) * 0.1,
                ..GachaConfig::default()
            };
            let m = RateModel::new(&config);
            let pickup = 0.3 + unit_f64(&mut rng) * 0.6;
            let start = pity.map_or(0, |p| rng.next_u64_bounded(p as u64) as u32);
            for policy in [
                PickupPolicy::Always,
                PickupPolicy::GuaranteeOnFail { rate: pickup },
                PickupPolicy::IndependentTrial { rate: pickup },
            ] {
                let dist = SingleAcquisition::new(&m, policy).distribution(start, false);
                assert!(dist.len() <= HIT_CAP + 1);
                assert!(dist.iter().all(|p| p.is_finite() && *p >= 0.0));
                assert!(dist.iter().sum::<f64>() <= 1.0 + 1e-9);
                if let Some(pity) = pity {
                    match policy {
                        PickupPolicy::GuaranteeOnFail { .. } => assert!(dist.len() <= 3 * pity as usize + 1),
                        PickupPolicy::Always => assert!(dist.len() <= pity as usize + 1),
                        PickupPolicy::IndependentTrial { .. } => assert!(dist.len() <= INDEPENDENT_CAP + 1),
                    }
                }
            }
        }
    }
}
