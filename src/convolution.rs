use crate::acquisition::{SingleAcquisition, EPS};
use log::debug;

/// Longest multi-copy distribution.
pub const MAX_COMBINED_LEN: usize = 50_000;

/// Distribution of the sum of two independent waiting times.
pub fn convolve(f: &[f64], g: &[f64]) -> Vec<f64> {
    let len = (f.len() + g.len()).min(MAX_COMBINED_LEN);
    let mut combined = vec![0.0; len];
    for (i, &a) in f.iter().enumerate() {
        if a < EPS {
            continue;
        }
        for (j, &b) in g.iter().enumerate().skip(1) {
            let n = i + j;
            if n >= len {
                break;
            }
            if b < EPS {
                continue;
            }
            combined[n] += a * b;
        }
    }
    combined
}

/// Pulls needed for `copies` targets. The first copy starts from the current
/// state; every later copy starts fresh (pity 0, no guarantee).
pub fn multi_copy_distribution(
    single: &SingleAcquisition<'_>,
    start_pity: u32,
    start_guarantee: bool,
    copies: u32,
) -> Vec<f64> {
    let first = single.distribution(start_pity, start_guarantee);
    if copies <= 1 {
        return first;
    }

    let fresh = single.distribution(0, false);
    let mut combined = first;
    for copy in 1..copies {
        combined = convolve(&combined, &fresh);
        debug!("copy {}: combined distribution has {} entries", copy + 1, combined.len());
    }
    combined
}
