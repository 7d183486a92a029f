//! Hassan complexity-of-change metrics with the line-weighted extension of
//! D'Ambros et al.

use std::collections::BTreeMap;

use serde::Serialize;
use strata_core::{ChangeHistory, HassanConfig};

use crate::summation::sorted_exact_sum;

/// History of complexity metric and its weighted and decayed variants.
///
/// All five values are 0 for a file that did not change in the bounded
/// period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HassanMetrics {
    /// Sum of the period entropies of every period the file changed in.
    pub hcm: f64,
    /// Period entropies weighted by the file's share of changed lines.
    pub whcm: f64,
    /// Linearly decayed history.
    pub ldhcm: f64,
    /// Logarithmically decayed history.
    pub lgdhcm: f64,
    /// Exponentially decayed history.
    pub edhcm: f64,
}

/// Compute Hassan metrics for every file in `histories`.
///
/// Uses `lines_added`, `lines_deleted` and `days_from_release` of each
/// history. Periods of `window_days` are laid out backward from the release;
/// surplus days at the old end are dropped.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use strata_core::{ChangeHistory, HassanConfig};
/// use strata_metrics::hassan;
///
/// let history = ChangeHistory {
///     lines_added: vec![10],
///     lines_deleted: vec![0],
///     days_from_release: vec![3],
///     ..Default::default()
/// };
/// let histories = BTreeMap::from([("A.java".to_string(), history)]);
/// let metrics = hassan(&histories, &HassanConfig::default());
///
/// // A single changed file carries no entropy.
/// assert_eq!(metrics["A.java"].hcm, 0.0);
/// ```
pub fn hassan(
    histories: &BTreeMap<String, ChangeHistory>,
    config: &HassanConfig,
) -> BTreeMap<String, HassanMetrics> {
    let window = config.window_days.max(1);

    let max_age = histories
        .values()
        .flat_map(|h| h.days_from_release.iter().copied())
        .max()
        .unwrap_or(0)
        .max(0);
    // files changed anywhere in the bounded period; base of the entropy log
    let changed_files = histories
        .values()
        .filter(|h| !h.days_from_release.is_empty())
        .count();

    let end = max_age + max_age.rem_euclid(window);
    let bounds: Vec<i64> = (0..end).step_by(window as usize).collect();

    let mut hcm: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    let mut whcm: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    // oldest period first
    for pair in bounds.windows(2).rev() {
        let (lo, hi) = (pair[0], pair[1]);

        let mut touched: BTreeMap<&str, u64> = BTreeMap::new();
        let mut period_lines = 0u64;
        for (file, history) in histories {
            for (idx, day) in history.days_from_release.iter().enumerate() {
                if !(lo..hi).contains(day) {
                    continue;
                }
                let lines = history.lines_added.get(idx).copied().unwrap_or(0)
                    + history.lines_deleted.get(idx).copied().unwrap_or(0);
                *touched.entry(file.as_str()).or_default() += lines;
                period_lines += lines;
            }
        }

        let mut entropies = Vec::new();
        if changed_files > 1 && period_lines > 0 {
            let base = (changed_files as f64).ln();
            for lines in touched.values() {
                let p = *lines as f64 / period_lines as f64;
                if p > 0.0 {
                    entropies.push(-p * p.ln() / base);
                }
            }
        }
        let period_entropy = sorted_exact_sum(entropies);

        for (file, lines) in touched {
            hcm.entry(file).or_default().push(period_entropy);
            if period_lines > 0 {
                let share = lines as f64 / period_lines as f64;
                whcm.entry(file).or_default().push(share * period_entropy);
            }
        }
    }

    histories
        .keys()
        .map(|file| {
            let mut metrics = HassanMetrics::default();
            if let Some(history) = hcm.get(file.as_str()) {
                let age = history.len() as f64;
                let mut linear = Vec::with_capacity(history.len());
                let mut logarithmic = Vec::with_capacity(history.len());
                let mut exponential = Vec::with_capacity(history.len());
                for (idx, value) in history.iter().enumerate() {
                    let pos = (idx + 1) as f64;
                    linear.push(value / (config.phi1 * (age + 1.0 - pos)));
                    logarithmic.push(value / (config.phi2 * (age + 1.01 - pos).ln()));
                    exponential.push(value / (config.phi3 * (age - pos)).exp());
                }
                metrics.hcm = sorted_exact_sum(history.clone());
                metrics.ldhcm = sorted_exact_sum(linear);
                metrics.lgdhcm = sorted_exact_sum(logarithmic);
                metrics.edhcm = sorted_exact_sum(exponential);
            }
            if let Some(weighted) = whcm.get(file.as_str()) {
                metrics.whcm = sorted_exact_sum(weighted.clone());
            }
            (file.clone(), metrics)
        })
        .collect()
}
