//! Small numeric helpers shared by the scalers

/// Linear map of `value` from `[in_low, in_high]` to `[out_low, out_high]`.
///
/// No clamping; a degenerate input range produces a non-finite result.
#[inline]
pub fn map(value: f32, in_low: f32, in_high: f32, out_low: f32, out_high: f32) -> f32 {
    (value - in_low) / (in_high - in_low) * (out_high - out_low) + out_low
}

/// Linear map clamped to the output range.
///
/// Works with reversed output ranges. When the input range is empty or
/// inverted (`in_high <= in_low`) the midpoint of the output range is returned.
pub fn map_clamped(value: f32, in_low: f32, in_high: f32, out_low: f32, out_high: f32) -> f32 {
    if !(in_high > in_low) {
        return 0.5 * (out_low + out_high);
    }

    let mapped = map(value, in_low, in_high, out_low, out_high);
    let (lo, hi) = if out_low <= out_high {
        (out_low, out_high)
    } else {
        (out_high, out_low)
    };

    if mapped.is_nan() {
        return 0.5 * (out_low + out_high);
    }
    mapped.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_map_identity_and_rescale() {
        assert_relative_eq!(map(5.0, 0.0, 10.0, 0.0, 1.0), 0.5);
        assert_relative_eq!(map(0.25, 0.0, 1.0, -1.0, 1.0), -0.5);
        // unclamped extrapolation
        assert_relative_eq!(map(20.0, 0.0, 10.0, 0.0, 1.0), 2.0);
    }

    #[test]
    fn test_map_clamped_bounds() {
        assert_eq!(map_clamped(20.0, 0.0, 10.0, 0.0, 1.0), 1.0);
        assert_eq!(map_clamped(-3.0, 0.0, 10.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_map_clamped_reversed_output() {
        assert_eq!(map_clamped(20.0, 0.0, 10.0, 1.0, 0.0), 0.0);
        assert_relative_eq!(map_clamped(2.5, 0.0, 10.0, 1.0, 0.0), 0.75);
    }

    #[test]
    fn test_map_clamped_degenerate_input() {
        assert_eq!(map_clamped(3.0, 2.0, 2.0, 0.0, 1.0), 0.5);
        assert_eq!(map_clamped(3.0, 4.0, 2.0, 0.0, 1.0), 0.5);
    }
}
