/// Floor used wherever a denominator could collapse to zero.
pub const EPS: f64 = 1e-12;

/// Floor division that rounds towards negative infinity (unlike `/` on i64).
#[inline]
pub fn floor_div(value: i64, divisor: i64) -> i64 {
    debug_assert!(divisor > 0);
    value.div_euclid(divisor)
}

/// Start of the `step`-wide cell containing `value`, on a lattice through `origin`.
#[inline]
pub fn floor_to_lattice(value: i64, step: i64, origin: i64) -> i64 {
    origin + floor_div(value - origin, step) * step
}

#[inline]
pub fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Max of a set of values; NaN never wins.
#[inline]
pub fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Min of a set of values; NaN never wins.
#[inline]
pub fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Index of the value at percentile `pct` (0..=100) of an already sorted slice.
pub fn percentile_index(len: usize, pct: f64) -> usize {
    if len == 0 {
        return 0;
    }
    let idx = ((pct / 100.0) * (len - 1) as f64).floor() as usize;
    idx.min(len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_div_negative() {
        assert_eq!(floor_div(-1, 60), -1);
        assert_eq!(floor_div(59, 60), 0);
        assert_eq!(floor_div(60, 60), 1);
    }

    #[test]
    fn test_floor_to_lattice() {
        assert_eq!(floor_to_lattice(125, 60, 30), 90);
        assert_eq!(floor_to_lattice(29, 60, 30), -30);
        assert_eq!(floor_to_lattice(90, 60, 30), 90);
    }

    #[test]
    fn test_percentile_index() {
        assert_eq!(percentile_index(8, 25.0), 1);
        assert_eq!(percentile_index(8, 50.0), 3);
        assert_eq!(percentile_index(8, 75.0), 5);
        assert_eq!(percentile_index(1, 75.0), 0);
    }

    #[test]
    fn test_min_max_ignore_nan() {
        assert_eq!(max_of(&[1.0, f64::NAN, 3.0]), 3.0);
        assert_eq!(min_of(&[1.0, f64::NAN, 3.0]), 1.0);
    }
}
