use crate::acquisition::HIT_CAP;
use crate::config::{GachaConfig, PickupPolicy, PullState};
use crate::error::Result;
use crate::rate::RateModel;
use crate::rng::{unit_f64, Rng};
use crate::worker::SimulationPool;
use log::{debug, warn};
use rand_core::RngCore;
use rayon::prelude::*;
use serde::Serialize;

pub const CHUNK_SIZE: usize = 64;
/// A single run gives up after this many pulls.
pub const MAX_SIM_PULLS: u32 = HIT_CAP as u32;

/// Live pull counters for one simulated player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimState {
    /// Pulls since the last top-tier win.
    pub pity: u32,
    pub guarantee: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    Miss,
    /// Top tier, but not the pickup.
    OffTarget,
    Target,
}

/// One pull. Pity counts pulls since the last tier win, as in the exact engine.
pub fn roll_one<R: RngCore + ?Sized>(
    model: &RateModel,
    policy: PickupPolicy,
    state: &mut SimState,
    rng: &mut R,
) -> PullOutcome {
    state.pity += 1;
    if unit_f64(rng) >= model.rate_with_pity(state.pity) {
        return PullOutcome::Miss;
    }
    state.pity = 0;

    match policy {
        PickupPolicy::Always => PullOutcome::Target,
        PickupPolicy::GuaranteeOnFail { rate } => {
            if state.guarantee || unit_f64(rng) < rate {
                state.guarantee = false;
                PullOutcome::Target
            } else {
                state.guarantee = true;
                PullOutcome::OffTarget
            }
        }
        PickupPolicy::IndependentTrial { rate } => {
            if unit_f64(rng) < rate {
                PullOutcome::Target
            } else {
                PullOutcome::OffTarget
            }
        }
    }
}

/// Pulls until `config.target_copies` targets. `Err(cap)` when the run hit
/// [`MAX_SIM_PULLS`] first.
pub fn pulls_until_copies<R: RngCore + ?Sized>(
    config: &GachaConfig,
    model: &RateModel,
    start: &PullState,
    rng: &mut R,
) -> std::result::Result<u32, u32> {
    let mut state = SimState {
        pity: config.start_pity(start),
        guarantee: start.current_guarantee,
    };
    let mut copies = 0;
    for pulls in 1..=MAX_SIM_PULLS {
        if roll_one(model, config.pickup, &mut state, rng) == PullOutcome::Target {
            copies += 1;
            if copies >= config.target_copies {
                return Ok(pulls);
            }
        }
    }
    Err(MAX_SIM_PULLS)
}

/// Empirical counterpart of an exact evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub runs: usize,
    pub mean: f64,
    pub std_dev: f64,
    /// Percent of runs finished within `planned_pulls`.
    pub planned_success_rate: f64,
    /// Runs that gave up at the pull cap; counted at the cap.
    pub capped_runs: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    pulls: u64,
    pulls_sq: u128,
    within_plan: usize,
    capped: usize,
}

impl Totals {
    fn merge(self, other: Totals) -> Totals {
        Totals {
            pulls: self.pulls + other.pulls,
            pulls_sq: self.pulls_sq + other.pulls_sq,
            within_plan: self.within_plan + other.within_plan,
            capped: self.capped + other.capped,
        }
    }
}

/// Runs `num_sims` independent players in chunks of [`CHUNK_SIZE`]. Chunk `i`
/// draws from its own stream seeded `base + i`, so the result does not depend
/// on the thread count.
pub fn simulate_stats(
    config: &GachaConfig,
    state: &PullState,
    num_sims: usize,
    seed: u64,
    planned_pulls: f64,
    pool: &SimulationPool,
) -> Result<SimulationSummary> {
    config.validate()?;
    if num_sims == 0 {
        return Ok(SimulationSummary::default());
    }
    let model = RateModel::new(config);
    let budget = if planned_pulls > 0.0 {
        planned_pulls.floor() as u64
    } else {
        0
    };

    let mut master_rng = Rng::from_seed(seed);
    let base_seed = master_rng.next_u64();

    let chunk_count = num_sims.div_ceil(CHUNK_SIZE);
    let totals = pool.execute(|| {
        (0..chunk_count)
            .into_par_iter()
            .map(|chunk_idx| {
                let start = chunk_idx * CHUNK_SIZE;
                let end = (start + CHUNK_SIZE).min(num_sims);
                let mut local_rng = Rng::from_seed(base_seed.wrapping_add(chunk_idx as u64));
                let mut totals = Totals::default();
                for _ in start..end {
                    let pulls = match pulls_until_copies(config, &model, state, &mut local_rng) {
                        Ok(pulls) => pulls,
                        Err(cap) => {
                            totals.capped += 1;
                            cap
                        }
                    } as u64;
                    totals.pulls += pulls;
                    totals.pulls_sq += (pulls as u128) * (pulls as u128);
                    if pulls <= budget {
                        totals.within_plan += 1;
                    }
                }
                totals
            })
            .reduce(Totals::default, Totals::merge)
    })?;

    if totals.capped > 0 {
        warn!(
            "[Sim] {} of {} runs hit the {}-pull cap",
            totals.capped, num_sims, MAX_SIM_PULLS
        );
    }

    let n = num_sims as f64;
    let mean = totals.pulls as f64 / n;
    let variance = (totals.pulls_sq as f64 / n - mean * mean).max(0.0);
    debug!("[Sim] {} runs, mean {:.3}", num_sims, mean);

    Ok(SimulationSummary {
        runs: num_sims,
        mean,
        std_dev: variance.sqrt(),
        planned_success_rate: totals.within_plan as f64 / n * 100.0,
        capped_runs: totals.capped,
    })
}
