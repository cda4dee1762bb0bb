//! Everyday-probability analogies ("about as likely as ...").
//!
//! The table is reference data shipped next to the binary, not part of the
//! engine, so it can be revised without a rebuild.

use crate::config::read_with_fallback;
use crate::error::{EngineError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeelingEntry {
    /// Percent, e.g. `50.0` for a coin flip.
    pub rate: f64,
    pub event: String,
    pub feeling: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeelingTable {
    #[serde(default)]
    pub version: String,
    pub entries: Vec<FeelingEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeelingMatch<'a> {
    /// Target at or above 100%.
    Certain,
    Closest(&'a FeelingEntry),
}

impl FeelingTable {
    pub fn new(mut entries: Vec<FeelingEntry>) -> Self {
        entries.sort_by(|a, b| a.rate.total_cmp(&b.rate));
        FeelingTable {
            version: String::new(),
            entries,
        }
    }

    pub fn load(path: &str) -> Result<Self> {
        let contents = read_with_fallback(path)?;
        let table: FeelingTable = serde_json::from_str(&contents).map_err(|source| EngineError::Json {
            path: path.to_string(),
            source,
        })?;
        let version = table.version.clone();
        let mut table = FeelingTable::new(table.entries);
        table.version = version;
        let skipped = table.entries.iter().filter(|e| !(e.rate > 0.0)).count();
        if skipped > 0 {
            warn!("[Feeling] {} entries in {} have a non-positive rate and will never match", skipped, path);
        }
        debug!("[Feeling] Loaded {} entries (version {:?})", table.entries.len(), table.version);
        Ok(table)
    }

    pub fn find_closest(&self, target: f64) -> Option<FeelingMatch<'_>> {
        find_closest_probability(target, &self.entries)
    }
}

/// Entry whose rate is nearest to `target` (percent) on a log scale.
pub fn find_closest_probability(target: f64, table: &[FeelingEntry]) -> Option<FeelingMatch<'_>> {
    if !(target > 0.0) || table.is_empty() {
        return None;
    }
    if target >= 100.0 {
        return Some(FeelingMatch::Certain);
    }
    let log_target = target.ln();
    table
        .iter()
        .filter(|e| e.rate > 0.0 && e.rate.is_finite())
        .map(|e| ((e.rate.ln() - log_target).abs(), e))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, e)| FeelingMatch::Closest(e))
}
