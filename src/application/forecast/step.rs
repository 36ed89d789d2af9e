// Sampling cadence inference
use crate::domain::reading::Reading;

/// Median spacing of `sorted` in whole minutes, never below one.
///
/// Falls back to `default_minutes` when there are fewer than two readings.
pub fn infer_step_minutes(sorted: &[Reading], default_minutes: u32) -> u32 {
    if sorted.len() < 2 {
        return default_minutes;
    }

    let mut deltas: Vec<f64> = sorted
        .windows(2)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 60_000.0)
        .collect();
    deltas.sort_by(|a, b| a.total_cmp(b));

    let mid = deltas.len() / 2;
    let median = if deltas.len() % 2 == 1 {
        deltas[mid]
    } else {
        (deltas[mid - 1] + deltas[mid]) / 2.0
    };

    median.round().max(1.0) as u32
}
