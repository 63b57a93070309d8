/// Fit a parabola through three equally spaced cost samples and return the
/// fractional offset of the minimum relative to the center sample.
///
/// Returns 0 when the samples are degenerate; the offset is clamped to
/// [-0.5, 0.5].
pub fn parabola_offset(prev: f32, center: f32, next: f32) -> f32 {
    let curvature = prev + next - 2.0 * center;
    if curvature.abs() > 1e-6 {
        ((prev - next) / (2.0 * curvature)).clamp(-0.5, 0.5)
    } else {
        0.0
    }
}

/// Second difference of three cost samples, used as a curvature estimate
/// for refinement confidence.
pub fn parabola_curvature(prev: f32, center: f32, next: f32) -> f32 {
    prev + next - 2.0 * center
}
