//! Numeric helpers shared by the transformer and analyzer
//!
//! All helpers operate on slices of present values; callers strip missing
//! cells before calling in. Degenerate input yields `None` rather than NaN.

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median (average of the two middle values for even lengths)
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Standard deviation with `ddof` delta degrees of freedom
/// (0 = population, 1 = sample)
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let avg = mean(values)?;
    let sum_sq = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>();
    Some((sum_sq / (values.len() - ddof) as f64).sqrt())
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Pearson correlation coefficient over pairs where both sides are present.
/// Undefined (None) with fewer than two pairs or zero variance on either side.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;
    let numerator: f64 = pairs
        .iter()
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum();
    let denominator_x: f64 = pairs.iter().map(|(a, _)| (a - mean_x).powi(2)).sum();
    let denominator_y: f64 = pairs.iter().map(|(_, b)| (b - mean_y).powi(2)).sum();
    let denominator = (denominator_x * denominator_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        None
    } else {
        Some((numerator / denominator).clamp(-1.0, 1.0))
    }
}

/// Trailing moving average aligned with the input: entry `i` averages
/// `values[i + 1 - window..=i]`, and is `None` for the first `window - 1`
/// entries or whenever the window holds a missing value.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let sum = slice.iter().try_fold(0.0, |acc, v| v.map(|v| acc + v))?;
            Some(sum / window as f64)
        })
        .collect()
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
