//! Scalar robust aggregators used by the per-pixel merge loops.

/// Trimmed mean: drop `floor(n * ratio)` samples from each end of the
/// sorted values, capped so at least one sample survives.
pub fn trimmed_mean(values: &mut [f32], ratio: f32) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return values[0];
    }

    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let trim = ((n as f32 * ratio) as usize).min((n - 1) / 2);

    let kept = &values[trim..n - trim];
    kept.iter().sum::<f32>() / kept.len() as f32
}

/// Huber M-estimator: start from the median, iterate re-weighted means
/// until convergence.
pub fn huber_mean(values: &[f32], delta: f32) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return values[0];
    }

    let mut sorted = values.to_vec();
    let mid = sorted.len() / 2;
    sorted.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let mut estimate = sorted[mid];

    for _ in 0..10 {
        let mut weighted_sum = 0.0f32;
        let mut weight_sum = 0.0f32;

        for &v in values {
            let weight = huber_weight(v - estimate, delta);
            weighted_sum += weight * v;
            weight_sum += weight;
        }

        let next = if weight_sum > 0.0 {
            weighted_sum / weight_sum
        } else {
            estimate
        };

        if (next - estimate).abs() < 1e-6 {
            estimate = next;
            break;
        }
        estimate = next;
    }

    estimate
}

/// Median via selection; even counts average the two middle values.
pub fn median(values: &mut [f32]) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }

    let mid = n / 2;
    let upper = *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1;

    if n % 2 == 1 {
        upper
    } else {
        let lower = values[..mid]
            .iter()
            .copied()
            .max_by(|a, b| a.total_cmp(b))
            .unwrap_or(upper);
        (lower + upper) / 2.0
    }
}

/// Huber weight: 1 inside the delta band, delta/|e| outside.
pub fn huber_weight(residual: f32, delta: f32) -> f32 {
    let abs_r = residual.abs();
    if abs_r <= delta {
        1.0
    } else {
        delta / abs_r
    }
}

/// Tukey biweight: (1 - (e/c)^2)^2 inside the band, 0 outside.
pub fn tukey_biweight(residual: f32, c: f32) -> f32 {
    let u = residual / c;
    if u.abs() > 1.0 {
        return 0.0;
    }
    let t = 1.0 - u * u;
    t * t
}
