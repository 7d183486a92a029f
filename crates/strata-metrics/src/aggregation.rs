//! Aggregations of a list of metric values into one number.
//!
//! Dispersion and inequality measures after Zhang et al. Every function
//! accepts values that are not finite; entropy-style measures propagate NaN
//! while the zero guards below absorb degenerate inputs.

use crate::summation::{exact_sum, sorted_exact_sum, ExactSum};

/// Inequality parameter of [`generalized_entropy`].
const GE_ALPHA: f64 = 0.5;

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut values = values.to_vec();
    values.sort_by(f64::total_cmp);
    values
}

fn plain_sum(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc, v| acc + v)
}

fn mean(values: &[f64]) -> f64 {
    exact_sum(sorted(values)) / values.len() as f64
}

/// Value and floored mean both integral: ratio by integer division.
fn ratio_to_mean(value: f64, mean: f64) -> f64 {
    let floored = mean.floor();
    if value.fract() == 0.0 && floored > 0.0 {
        value / floored
    } else {
        value / mean
    }
}

/// Middle order statistic; the average of the two middle values for an even
/// count.
///
/// # Examples
///
/// ```
/// use strata_metrics::aggregation::median;
///
/// assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
/// assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
/// ```
pub fn median(values: &[f64]) -> f64 {
    let values = sorted(values);
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 0 {
        0.5 * (values[n / 2] + values[(n - 1) / 2])
    } else {
        values[n / 2]
    }
}

/// Population standard deviation.
pub fn stddev(values: &[f64]) -> f64 {
    let m = mean(values);
    let squares: Vec<f64> = sorted(values).iter().map(|v| (v - m).powi(2)).collect();
    (plain_sum(&squares) / values.len() as f64).sqrt()
}

/// Coefficient of variation, `stddev / mean`; 0 unless the mean is positive.
pub fn cov(values: &[f64]) -> f64 {
    let m = mean(values);
    if m > 0.0 {
        stddev(values) / m
    } else {
        0.0
    }
}

/// Gini index.
///
/// Returns 0 when `n * sum` is 0.
///
/// # Examples
///
/// ```
/// use strata_metrics::aggregation::gini;
///
/// assert_eq!(gini(&[0.0, 0.0]), 0.0);
/// assert!(gini(&[0.0, f64::NAN]).is_nan());
/// ```
pub fn gini(values: &[f64]) -> f64 {
    let values = sorted(values);
    let n = values.len() as f64;
    let total = plain_sum(&values);
    if n * total == 0.0 {
        return 0.0;
    }
    let first = 2.0 / (n * total);
    let ranked: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(i, v)| v * (i + 1) as f64)
        .collect();
    let second = plain_sum(&ranked) - (n + 1.0) * total;
    first * second
}

/// Hoover index, `1/2 * sum |v_i / S - 1/n|`.
///
/// The shares `v_i / S` are rounded once; the distances to `1/n` and their
/// sum are carried out without further rounding. Returns 0 when the sum is 0
/// or NaN.
pub fn hoover(values: &[f64]) -> f64 {
    let values = sorted(values);
    let total = plain_sum(&values);
    if total == 0.0 || total.is_nan() {
        return 0.0;
    }
    let n = values.len() as f64;

    // sum |f - 1/n| == sum(sign * f) - (sum of signs) / n
    let mut acc = ExactSum::new();
    let mut signs = 0.0;
    for value in values {
        let share = value / total;
        let side = share.mul_add(n, -1.0);
        if side > 0.0 {
            acc.add(share);
            signs += 1.0;
        } else if side < 0.0 {
            acc.add(-share);
            signs -= 1.0;
        }
    }
    let quotient = signs / n;
    let residual = (-quotient).mul_add(n, signs) / n;
    acc.add(-quotient);
    acc.add(-residual);
    0.5 * acc.value()
}

/// Atkinson index with inequality aversion 1/2.
///
/// Returns 0 when the mean is 0.
pub fn atkinson(values: &[f64]) -> f64 {
    let m = mean(values);
    if m == 0.0 {
        return 0.0;
    }
    let roots: Vec<f64> = sorted(values)
        .into_iter()
        .filter(|v| *v > 0.0)
        .map(f64::sqrt)
        .collect();
    let inner = exact_sum(roots) / values.len() as f64;
    1.0 - (inner * inner) / m
}

/// Shannon entropy of the value frequencies.
///
/// Every value contributes `freq/n * ln(freq/n)` of its own frequency.
/// Returns NaN if any value is NaN.
///
/// # Examples
///
/// ```
/// use strata_metrics::aggregation::shannon_entropy;
///
/// assert_eq!(shannon_entropy(&[0.0, 0.0]), 0.0);
/// assert!(shannon_entropy(&[1.0, f64::NAN]).is_nan());
/// ```
pub fn shannon_entropy(values: &[f64]) -> f64 {
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let values = sorted(values);
    let n = values.len() as f64;

    let mut terms = Vec::with_capacity(values.len());
    let mut start = 0;
    while start < values.len() {
        let mut end = start + 1;
        while end < values.len() && values[end] == values[start] {
            end += 1;
        }
        let freq = (end - start) as f64 / n;
        for _ in start..end {
            terms.push(freq * freq.ln());
        }
        start = end;
    }
    -(1.0 / n) * exact_sum(terms)
}

/// Generalized entropy with alpha 1/2.
///
/// Returns 0 when the mean is 0. NaN values and non-positive ratios are
/// skipped.
pub fn generalized_entropy(values: &[f64]) -> f64 {
    let m = mean(values);
    if m == 0.0 {
        return 0.0;
    }
    let n = values.len() as f64;
    let prefix = -1.0 / (n * GE_ALPHA * (1.0 - GE_ALPHA));
    let terms: Vec<f64> = sorted(values)
        .into_iter()
        .filter(|v| !v.is_nan() && !m.is_nan())
        .map(|v| ratio_to_mean(v, m))
        .filter(|ratio| *ratio > 0.0)
        .map(|ratio| ratio.powf(GE_ALPHA) - 1.0)
        .collect();
    prefix * exact_sum(terms)
}

/// Theil index.
///
/// Returns 0 when the mean is 0. NaN values and non-positive ratios are
/// skipped.
pub fn theil(values: &[f64]) -> f64 {
    let m = mean(values);
    if m == 0.0 {
        return 0.0;
    }
    let terms: Vec<f64> = sorted(values)
        .into_iter()
        .filter(|v| !v.is_nan() && !m.is_nan())
        .map(|v| ratio_to_mean(v, m))
        .filter(|ratio| *ratio > 0.0)
        .map(|ratio| ratio * ratio.ln())
        .collect();
    sorted_exact_sum(terms) / values.len() as f64
}
