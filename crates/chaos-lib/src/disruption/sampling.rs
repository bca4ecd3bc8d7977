//! Random draws used by the disruption job

use crate::models::PodRef;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

/// Uniform whole-second delay in `[0, bound]`, both ends inclusive
pub fn draw_jitter<R: Rng + ?Sized>(rng: &mut R, bound: Duration) -> Duration {
    let max_secs = bound.as_secs();
    if max_secs == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs(rng.gen_range(0..=max_secs))
}

/// Pick up to `count` distinct pods uniformly without replacement.
///
/// Returns every candidate when fewer than `count` are available.
pub fn select_targets<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: &[PodRef],
    count: usize,
) -> Vec<PodRef> {
    candidates.choose_multiple(rng, count).cloned().collect()
}
