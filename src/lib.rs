//! Exact pull-count distributions for gacha banners with hard pity, soft pity
//! and pickup guarantees, plus a closed-form shortcut and a Monte Carlo
//! cross-check.

pub mod acquisition;
pub mod analytic;
pub mod config;
pub mod convolution;
pub mod engine;
pub mod error;
pub mod feeling;
pub mod query;
pub mod rate;
pub mod report;
pub mod rng;
pub mod sim;
pub mod stats;
pub mod worker;

pub use analytic::{evaluate_analytic, AnalyticInput, AnalyticMode, AnalyticResult};
pub use config::{GachaConfig, PickupPolicy, PullState, ScenarioFile};
pub use engine::{evaluate, Evaluation, EvaluationCache, Scenario};
pub use error::{EngineError, Result};
pub use feeling::{find_closest_probability, FeelingEntry, FeelingMatch, FeelingTable};
pub use query::planned_success_rate;
pub use stats::DistributionStats;
