//! Timed linear volume fades.
//!
//! A fade is a pure interpolation plan executed as a sequence of discrete
//! set-volume commands on a detached thread. A newer fade started before an
//! older one finishes is not cancelled; the last scheduled write wins.

/// Total fade duration in milliseconds.
pub const FADE_DURATION_MS: u64 = 7_000;
/// Delay between successive volume steps in milliseconds.
pub const FADE_STEP_MS: u64 = 50;

/// Computes the sequence of volume-percent steps for a fade.
///
/// Each step is a linear interpolation clamped to [0, 200]; the final step
/// is forced to the exact target to eliminate rounding drift.
pub fn fade_plan(from: u16, to: u16) -> Vec<u16> {
    let steps = (FADE_DURATION_MS / FADE_STEP_MS) as usize;
    let from = f64::from(from.min(200));
    let to_clamped = to.min(200);
    let step = (f64::from(to_clamped) - from) / steps as f64;

    let mut plan = Vec::with_capacity(steps);
    for i in 1..=steps {
        let value = (from + step * i as f64).round().clamp(0.0, 200.0);
        plan.push(value as u16);
    }
    if let Some(last) = plan.last_mut() {
        *last = to_clamped;
    }
    plan
}
