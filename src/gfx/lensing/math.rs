//! Small math helpers shared by the lensing pipeline

/// Linearly remap `value` from `[in_min, in_max]` to `[out_min, out_max]`.
///
/// The input range must not be degenerate; `in_min == in_max` would divide
/// by zero.
pub fn value_map(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    debug_assert!(
        in_min != in_max,
        "degenerate remap range [{in_min}, {in_max}]"
    );
    out_min + (value - in_min) * (out_max - out_min) / (in_max - in_min)
}

/// Wrap an angle into `[0, 2π)` by adding a full turn if negative.
///
/// Matches the table's angle convention: `atan2` output is shifted, not
/// reduced modulo 2π, so inputs are expected in `(-2π, 2π)`.
pub fn wrap_angle(angle: f32) -> f32 {
    if angle < 0.0 {
        angle + std::f32::consts::TAU
    } else {
        angle
    }
}
