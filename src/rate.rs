use crate::config::GachaConfig;

/// Per-pull draw probability for the top rarity tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateModel {
    base_rate: f64,
    hard_pity: Option<u32>,
    soft_pity: Option<(u32, f64)>,
}

impl RateModel {
    pub fn new(config: &GachaConfig) -> Self {
        let hard_pity = config.hard_pity.filter(|&p| p > 0);
        // A ramp that starts at or after hard pity never applies.
        let soft_enabled = config.soft_pity_start > 0
            && hard_pity.map_or(true, |pity| config.soft_pity_start < pity);
        RateModel {
            base_rate: config.base_rate,
            hard_pity,
            soft_pity: soft_enabled.then_some((config.soft_pity_start, config.soft_pity_increase)),
        }
    }

    pub fn base_rate(&self) -> f64 {
        self.base_rate
    }

    pub fn hard_pity(&self) -> Option<u32> {
        self.hard_pity
    }

    pub fn has_soft_pity(&self) -> bool {
        self.soft_pity.is_some()
    }

    /// Rate of the `stack`-th pull since the last tier win (1-based).
    pub fn rate_at(&self, stack: u32) -> f64 {
        match self.soft_pity {
            Some((start, increase)) if stack >= start => {
                let soft_pulls = (stack - start + 1) as f64;
                let rate = (self.base_rate + increase * soft_pulls).min(1.0);
                if rate.is_finite() {
                    rate
                } else {
                    self.base_rate
                }
            }
            _ => self.base_rate,
        }
    }

    /// First stack from which `rate_at` no longer changes.
    pub fn flat_from(&self) -> u32 {
        match self.soft_pity {
            Some((start, increase)) if increase > 0.0 => {
                let steps = ((1.0 - self.base_rate) / increase).ceil();
                let steps = if steps.is_finite() { steps.clamp(0.0, u32::MAX as f64) as u32 } else { u32::MAX };
                start.saturating_add(steps)
            }
            Some((start, _)) => start,
            None => 0,
        }
    }

    /// Rate used by state-machine code: 1 once the pity counter reaches hard pity.
    pub fn rate_with_pity(&self, stack: u32) -> f64 {
        match self.hard_pity {
            Some(pity) if stack >= pity => 1.0,
            _ => self.rate_at(stack),
        }
    }
}
