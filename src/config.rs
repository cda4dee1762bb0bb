use crate::analytic::{AnalyticInput, AnalyticMode};
use crate::engine::Scenario;
use crate::error::{invalid, EngineError, Result};
use log::info;
use serde::{Deserialize, Serialize};

/// Largest copy target the engine accepts. Each extra copy is one more
/// convolution pass over arrays of up to 50k entries.
pub const MAX_TARGET_COPIES: u32 = 20;

/// What happens when a rarity-tier win is not the pickup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PickupPolicy {
    /// Every tier win is the pickup.
    Always,
    /// A missed pickup forces the next tier win to be the pickup (50/50 style).
    GuaranteeOnFail { rate: f64 },
    /// Each tier win rolls the pickup independently; a miss only resets pity.
    IndependentTrial { rate: f64 },
}

impl PickupPolicy {
    pub fn from_rate(rate: f64, guarantee_on_fail: bool) -> Self {
        if rate >= 1.0 {
            PickupPolicy::Always
        } else if guarantee_on_fail {
            PickupPolicy::GuaranteeOnFail { rate }
        } else {
            PickupPolicy::IndependentTrial { rate }
        }
    }

    pub fn rate(&self) -> f64 {
        match *self {
            PickupPolicy::Always => 1.0,
            PickupPolicy::GuaranteeOnFail { rate } | PickupPolicy::IndependentTrial { rate } => rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GachaConfig {
    pub base_rate: f64,
    pub hard_pity: Option<u32>,
    /// 0 disables the ramp.
    pub soft_pity_start: u32,
    pub soft_pity_increase: f64,
    pub pickup: PickupPolicy,
    pub target_copies: u32,
}

impl Default for GachaConfig {
    fn default() -> Self {
        GachaConfig {
            base_rate: 0.01,
            hard_pity: Some(100),
            soft_pity_start: 0,
            soft_pity_increase: 0.06,
            pickup: PickupPolicy::Always,
            target_copies: 1,
        }
    }
}

impl GachaConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.base_rate > 0.0 && self.base_rate <= 1.0) {
            return Err(invalid(format!("base rate {} outside (0, 1]", self.base_rate)));
        }
        if self.hard_pity == Some(0) {
            return Err(invalid("hard pity must be positive when set"));
        }
        if !(self.soft_pity_increase >= 0.0 && self.soft_pity_increase.is_finite()) {
            return Err(invalid(format!("soft pity increase {} must be non-negative", self.soft_pity_increase)));
        }
        let pickup = self.pickup.rate();
        if !(pickup > 0.0 && pickup <= 1.0) {
            return Err(invalid(format!("pickup rate {} outside (0, 1]", pickup)));
        }
        if self.target_copies == 0 || self.target_copies > MAX_TARGET_COPIES {
            return Err(invalid(format!(
                "target copies {} outside 1..={}",
                self.target_copies, MAX_TARGET_COPIES
            )));
        }
        Ok(())
    }

    /// Pity counter the first copy starts from.
    pub fn start_pity(&self, state: &PullState) -> u32 {
        match self.hard_pity {
            Some(pity) if pity > 0 => state.current_pulls % pity,
            _ => state.current_pulls,
        }
    }

    pub fn completed_cycles(&self, state: &PullState) -> u32 {
        match self.hard_pity {
            Some(pity) if pity > 0 => state.current_pulls / pity,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullState {
    /// Pulls since the last hard-pity reset.
    pub current_pulls: u32,
    /// Next tier win is forced to be the pickup.
    pub current_guarantee: bool,
}

// --- Scenario file (data-driven) ---

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// 0 = all cores minus `reserve_cores`.
    pub max_threads: usize,
    pub reserve_cores: usize,
    pub stack_size_mb: usize,
}

impl Default for WorkerSection {
    fn default() -> Self {
        WorkerSection {
            max_threads: 0,
            reserve_cores: 1,
            stack_size_mb: 4,
        }
    }
}

/// On-disk scenario. Rates are fractions, `hard_pity: 0` or `null` means no pity.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScenarioFile {
    pub pool_name: String,
    pub base_rate: f64,
    pub hard_pity: Option<u32>,
    pub soft_pity_start: u32,
    pub soft_pity_increase: f64,
    pub pickup_rate: f64,
    pub guarantee_on_fail: bool,
    pub target_copies: u32,
    pub current_pulls: u32,
    pub current_guarantee: bool,
    pub planned_pulls: f64,
    pub price_per_pull: f64,
    pub analytic: AnalyticMode,
    pub feelings_path: String,
    pub worker: WorkerSection,
}

impl Default for ScenarioFile {
    fn default() -> Self {
        ScenarioFile {
            pool_name: "Unknown".to_string(),
            base_rate: 0.01,
            hard_pity: Some(100),
            soft_pity_start: 0,
            soft_pity_increase: 0.06,
            pickup_rate: 1.0,
            guarantee_on_fail: true,
            target_copies: 1,
            current_pulls: 0,
            current_guarantee: false,
            planned_pulls: 100.0,
            price_per_pull: 2000.0,
            analytic: AnalyticMode::default(),
            feelings_path: "data/feelings.json".to_string(),
            worker: WorkerSection::default(),
        }
    }
}

impl ScenarioFile {
    pub fn load(path: &str) -> Result<Self> {
        let contents = read_with_fallback(path)?;
        Self::from_json(&contents, path)
    }

    pub fn from_json(contents: &str, path: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|source| EngineError::Json {
            path: path.to_string(),
            source,
        })
    }

    pub fn gacha_config(&self) -> GachaConfig {
        GachaConfig {
            base_rate: self.base_rate,
            hard_pity: self.hard_pity.filter(|&p| p > 0),
            soft_pity_start: self.soft_pity_start,
            soft_pity_increase: self.soft_pity_increase,
            pickup: PickupPolicy::from_rate(self.pickup_rate, self.guarantee_on_fail),
            target_copies: self.target_copies,
        }
    }

    pub fn pull_state(&self) -> PullState {
        PullState {
            current_pulls: self.current_pulls,
            current_guarantee: self.current_guarantee,
        }
    }

    pub fn scenario(&self) -> Scenario {
        Scenario {
            config: self.gacha_config(),
            state: self.pull_state(),
            planned_pulls: self.planned_pulls,
            price_per_pull: self.price_per_pull,
        }
    }

    pub fn analytic_input(&self) -> AnalyticInput {
        AnalyticInput {
            rate: self.base_rate,
            hard_pity: self.hard_pity.filter(|&p| p > 0),
            current_pulls: self.current_pulls,
            planned_pulls: self.planned_pulls,
            price_per_pull: self.price_per_pull,
            mode: self.analytic,
        }
    }
}

/// Reads `path`, retrying at `../../path` for runs from `target/<profile>/`.
pub fn read_with_fallback(path: &str) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(err) => {
            let alt = format!("../../{}", path);
            match std::fs::read_to_string(&alt) {
                Ok(contents) => {
                    info!("[Config] {} found in parent directory.", path);
                    Ok(contents)
                }
                Err(_) => Err(EngineError::Io {
                    path: path.to_string(),
                    source: err,
                }),
            }
        }
    }
}
