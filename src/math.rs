//! Numeric helpers shared by the accumulator and frame synthesis

/// Clamp `value` into the inclusive range `[min, max]`
pub fn clamp(value: i64, min: i64, max: i64) -> i64 {
    value.max(min).min(max)
}

/// Scale a pointer displacement by a sensitivity and round to the nearest integer
///
/// Rounds half away from zero. Saturates instead of overflowing on absurd
/// inputs, since the result is clamped by the caller anyway.
pub fn scale_delta(delta: i64, sensitivity: f64) -> i64 {
    let scaled = (delta as f64 * sensitivity).round();
    if scaled.is_nan() {
        0
    } else {
        // `as` saturates at the i64 bounds for out-of-range floats
        scaled as i64
    }
}
