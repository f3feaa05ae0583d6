//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Round half away from zero and clamp to the i64 range, returning 0 for
/// non-finite values.
#[must_use]
pub fn round_f64_to_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).round();
    cast::<f64, i64>(clamped).unwrap_or(0)
}

/// Floor and clamp to the i64 range, returning 0 for non-finite values.
#[must_use]
pub fn floor_f64_to_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).floor();
    cast::<f64, i64>(clamped).unwrap_or(0)
}

/// Clamp an untrusted value into `[min, max]` with round-half-away-from-zero
/// semantics. Non-finite input resolves to the minimum bound; swapped bounds
/// are normalized first.
#[must_use]
pub fn clamp_to_bounds(value: f64, min: i64, max: i64) -> i64 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    if !value.is_finite() {
        return min;
    }
    let rounded = value.round();
    let clamped = rounded.clamp(i64_to_f64(min), i64_to_f64(max));
    cast::<f64, i64>(clamped).unwrap_or(min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounders_handle_non_finite() {
        assert_eq!(round_f64_to_i64(f64::NAN), 0);
        assert_eq!(round_f64_to_i64(1.5), 2);
        assert_eq!(round_f64_to_i64(-1.5), -2);
        assert_eq!(floor_f64_to_i64(f64::INFINITY), 0);
        assert_eq!(floor_f64_to_i64(3.9), 3);
    }

    #[test]
    fn clamp_defaults_non_finite_to_min() {
        assert_eq!(clamp_to_bounds(f64::NAN, 1, 10), 1);
        assert_eq!(clamp_to_bounds(f64::NEG_INFINITY, 1, 10), 1);
        assert_eq!(clamp_to_bounds(f64::INFINITY, 1, 10), 1);
    }

    #[test]
    fn clamp_rounds_half_away_from_zero() {
        assert_eq!(clamp_to_bounds(4.5, 0, 10), 5);
        assert_eq!(clamp_to_bounds(-4.5, -10, 0), -5);
    }

    #[test]
    fn clamp_normalizes_swapped_bounds() {
        assert_eq!(clamp_to_bounds(5.0, 10, 1), 5);
        assert_eq!(clamp_to_bounds(-5.0, 10, 1), 1);
        assert_eq!(clamp_to_bounds(1e18, 1, 1_000_000), 1_000_000);
    }
}
