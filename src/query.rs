/// Chance, in percent, of holding the target within `planned_pulls`.
///
/// Past the end of the array the last computed CDF value is returned. For
/// truncated (no hard pity) distributions this is always below 100%.
pub fn planned_success_rate(cdf: &[f64], planned_pulls: f64) -> f64 {
    if cdf.is_empty() || !(planned_pulls > 0.0) {
        return 0.0;
    }
    let index = (planned_pulls.floor() as usize).min(cdf.len() - 1);
    (cdf[index] * 100.0).clamp(0.0, 100.0)
}
