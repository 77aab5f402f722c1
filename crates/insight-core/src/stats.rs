//! Numeric statistics shared by the analytics engine.

// ── Moments ───────────────────────────────────────────────────────────────────

/// Arithmetic mean.  Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`, not `n - 1`).
///
/// Returns 0.0 for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

// ── Pearson correlation ───────────────────────────────────────────────────────

/// Pearson correlation coefficient between two equally-long series:
/// `Σ((x-x̄)(y-ȳ)) / (n·σx·σy)` with population standard deviations.
///
/// Returns `None` when the series are empty, differ in length, or either
/// has zero variance (correlation is undefined there).
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.is_empty() || xs.len() != ys.len() {
        return None;
    }
    let x_mean = mean(xs);
    let y_mean = mean(ys);
    let x_dev = population_std_dev(xs);
    let y_dev = population_std_dev(ys);
    if x_dev == 0.0 || y_dev == 0.0 {
        return None;
    }

    let covariance_sum: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    Some(covariance_sum / (xs.len() as f64 * x_dev * y_dev))
}

// ── Order statistics ──────────────────────────────────────────────────────────

/// Compute the `p`-th percentile of a **sorted** slice using linear
/// interpolation.  Returns 0.0 for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (sorted.len() as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Midpoint median: the element at index `n / 2` of the sorted input.
///
/// This is the upper-median convention the latency reporting has always
/// used, not the interpolated median.  Returns 0.0 for an empty slice.
pub fn midpoint_median(values: &mut Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values[values.len() / 2]
}

// ── Tests ─────────────────────────────────────────────────────────────────────
