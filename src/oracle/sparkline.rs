//! Sparkline Builder
//!
//! Produces short [0, 1] series for charting, either from real history or a
//! synthesized random walk when history is unavailable.

use rand::Rng;

/// Default length of a synthesized sparkline
pub const SYNTHETIC_POINTS: usize = 20;

const WALK_START: f64 = 0.5;
const WALK_MAX_STEP: f64 = 0.1;

/// Scale a series to [0, 1] via `(v - min) / range`.
///
/// A flat series has its range forced to 1, so every point maps to 0.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut range = max - min;
    if range == 0.0 {
        range = 1.0;
    }

    values.iter().map(|v| (v - min) / range).collect()
}

/// Bounded random walk seeded at 0.5, clamped to [0, 1] after every step
pub fn random_walk<R: Rng + ?Sized>(rng: &mut R, points: usize) -> Vec<f64> {
    let mut current = WALK_START;
    (0..points)
        .map(|_| {
            let step = rng.gen_range(-WALK_MAX_STEP..=WALK_MAX_STEP);
            current = (current + step).clamp(0.0, 1.0);
            current
        })
        .collect()
}

/// Random walk from the thread-local generator
pub fn synthesize(points: usize) -> Vec<f64> {
    random_walk(&mut rand::thread_rng(), points)
}

/// Normalized history, or a synthesized walk when the history is empty
pub fn from_history_or_synthetic(history: &[f64], points: usize) -> Vec<f64> {
    if history.is_empty() {
        synthesize(points)
    } else {
        normalize(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn normalize_flat_series_is_all_zero() {
        assert_eq!(normalize(&[5.0, 5.0, 5.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn normalize_maps_min_to_zero_and_max_to_one() {
        let out = normalize(&[10.0, 15.0, 20.0]);
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn normalize_empty_is_empty() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn random_walk_stays_in_unit_range_with_bounded_steps() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let walk = random_walk(&mut rng, SYNTHETIC_POINTS);
            assert_eq!(walk.len(), SYNTHETIC_POINTS);
            let mut prev = WALK_START;
            for v in &walk {
                assert!((0.0..=1.0).contains(v));
                assert!((v - prev).abs() <= WALK_MAX_STEP + 1e-12);
                prev = *v;
            }
        }
    }

    #[test]
    fn history_fallback_synthesizes_when_empty() {
        assert_eq!(from_history_or_synthetic(&[], 20).len(), 20);
        assert_eq!(from_history_or_synthetic(&[1.0, 3.0], 20), vec![0.0, 1.0]);
    }
}
