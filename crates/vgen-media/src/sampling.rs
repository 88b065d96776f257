//! Uniform frame subsampling.

/// Pick at most `max` evenly spaced indices out of `0..len`.
///
/// Indices are `round(i * (len - 1) / (max - 1))` for `i` in `0..max`,
/// deduplicated and strictly increasing. The first index is always `0`, and
/// the last is `len - 1` when `max >= 2`. Returns every index when `len <= max`.
pub fn sample_indices(len: usize, max: usize) -> Vec<usize> {
    if len == 0 || max == 0 {
        return Vec::new();
    }
    if len <= max {
        return (0..len).collect();
    }
    if max == 1 {
        return vec![0];
    }

    let span = (len - 1) as f64;
    let steps = (max - 1) as f64;
    let mut indices: Vec<usize> = (0..max)
        .map(|i| ((i as f64 * span / steps).round() as usize).min(len - 1))
        .collect();
    indices.dedup();
    indices
}
