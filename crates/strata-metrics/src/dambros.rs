//! Churn and entropy of source code metrics after D'Ambros et al.
//!
//! Uses a single delta matrix with the file path as an extra dimension
//! instead of one matrix per file.

use std::collections::BTreeMap;

use serde::Serialize;
use strata_core::{DambrosConfig, DeltaMatrix, DeltaMetric, StrataError};

use crate::summation::exact_sum;

/// The ten churn and entropy values of one file for one static metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DambrosMetrics {
    /// Partial churn: sum of absolute deltas.
    pub pchu: f64,
    /// Weighted partial churn.
    pub wpchu: f64,
    /// Exponentially decayed churn.
    pub edpchu: f64,
    /// Linearly decayed churn.
    pub ldpchu: f64,
    /// Logarithmically decayed churn.
    pub lgdpchu: f64,
    /// History of column entropies.
    pub hh: f64,
    /// Column entropies weighted by the file's share.
    pub hwh: f64,
    pub edhh: f64,
    pub ldhh: f64,
    pub lgdhh: f64,
}

/// Valid deltas: present and non-zero.
fn valid(cell: &Option<f64>) -> Option<f64> {
    cell.filter(|v| *v != 0.0).map(f64::abs)
}

/// Column totals and column entropy sums of one metric.
struct Columns {
    totals: BTreeMap<usize, f64>,
    entropies: BTreeMap<usize, f64>,
}

impl Columns {
    fn new(rows: &BTreeMap<String, Vec<Option<f64>>>) -> Self {
        let mut values: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for row in rows.values() {
            for (j, cell) in row.iter().enumerate() {
                if let Some(v) = valid(cell) {
                    values.entry(j).or_default().push(v);
                }
            }
        }
        let totals: BTreeMap<usize, f64> = values
            .iter()
            .map(|(j, vs)| (*j, vs.iter().fold(0.0, |acc, v| acc + v)))
            .collect();

        let mut terms: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for row in rows.values() {
            for (j, cell) in row.iter().enumerate() {
                let Some(v) = valid(cell) else { continue };
                let count = values.get(&j).map_or(0, Vec::len);
                let p = v / totals[&j];
                let column = terms.entry(j).or_default();
                if count > 1 && p > 0.0 {
                    column.push(-p * p.ln() / (count as f64).ln());
                }
            }
        }
        let entropies = terms
            .into_iter()
            .map(|(j, ts)| (j, ts.iter().fold(0.0, |acc, t| acc + t)))
            .collect();

        Self { totals, entropies }
    }
}

/// Compute D'Ambros metrics for each of `files` over every metric in `deltas`.
///
/// # Errors
///
/// Returns [`StrataError::MissingDeltas`] if a file has no row for a metric.
///
/// # Examples
///
/// ```
/// use strata_core::{DambrosConfig, DeltaMatrix, DeltaMetric};
/// use strata_metrics::dambros;
///
/// let mut deltas = DeltaMatrix::default();
/// deltas.push(DeltaMetric::Wmc, "A.java", Some(3.0));
/// deltas.push(DeltaMetric::Wmc, "A.java", None);
///
/// let metrics = dambros(["A.java"], &deltas, &DambrosConfig::default()).unwrap();
/// assert_eq!(metrics["A.java"][&DeltaMetric::Wmc].pchu, 3.0);
///
/// assert!(dambros(["B.java"], &deltas, &DambrosConfig::default()).is_err());
/// ```
pub fn dambros<'a, I>(
    files: I,
    deltas: &DeltaMatrix,
    config: &DambrosConfig,
) -> strata_core::Result<BTreeMap<String, BTreeMap<DeltaMetric, DambrosMetrics>>>
where
    I: IntoIterator<Item = &'a str>,
{
    let columns: BTreeMap<DeltaMetric, Columns> = deltas
        .metrics()
        .filter_map(|m| deltas.rows(m).map(|rows| (m, Columns::new(rows))))
        .collect();

    let mut result = BTreeMap::new();
    for file in files {
        let mut per_metric = BTreeMap::new();
        for (metric, cols) in &columns {
            let row = deltas
                .series(*metric, file)
                .ok_or_else(|| StrataError::MissingDeltas {
                    metric: metric.to_string(),
                    file: file.to_string(),
                })?;
            per_metric.insert(*metric, file_metrics(row, cols, config));
        }
        result.insert(file.to_string(), per_metric);
    }
    Ok(result)
}

fn file_metrics(row: &[Option<f64>], cols: &Columns, config: &DambrosConfig) -> DambrosMetrics {
    let c = row.len() as f64;
    let alpha = config.alpha;

    let mut pchu = Vec::new();
    let mut wpchu = Vec::new();
    let mut edpchu = Vec::new();
    let mut ldpchu = Vec::new();
    let mut lgdpchu = Vec::new();
    let mut hh = Vec::new();
    let mut hwh = Vec::new();
    let mut edhh = Vec::new();
    let mut ldhh = Vec::new();
    let mut lgdhh = Vec::new();

    for (j, cell) in row.iter().enumerate() {
        let Some(v) = valid(cell) else { continue };
        let pos = (j + 1) as f64;
        let exp_decay = (config.phi1 * (c - pos)).exp();
        let lin_decay = config.phi2 * (c + 1.0 - pos);
        let log_decay = config.phi3 * (c + 1.01 - pos).ln();

        let weighted = 1.0 + alpha * v;
        pchu.push(v);
        wpchu.push(weighted);
        edpchu.push(weighted / exp_decay);
        ldpchu.push(weighted / lin_decay);
        lgdpchu.push(weighted / log_decay);

        let p = v / cols.totals[&j];
        let entropy = cols.entropies.get(&j).copied().unwrap_or(0.0);
        hh.push(entropy);
        hwh.push(p * entropy);
        edhh.push(entropy / exp_decay);
        ldhh.push(entropy / lin_decay);
        lgdhh.push(entropy / log_decay);
    }

    DambrosMetrics {
        pchu: exact_sum(pchu),
        wpchu: exact_sum(wpchu),
        edpchu: exact_sum(edpchu),
        ldpchu: exact_sum(ldpchu),
        lgdpchu: exact_sum(lgdpchu),
        hh: exact_sum(hh),
        hwh: exact_sum(hwh),
        edhh: exact_sum(edhh),
        ldhh: exact_sum(ldhh),
        lgdhh: exact_sum(lgdhh),
    }
}
