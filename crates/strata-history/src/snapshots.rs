//! Periodic static-metric snapshots and the delta matrix built from them.

use std::collections::BTreeMap;

use strata_core::{ClassMetrics, DeltaMatrix, DeltaMetric, SourceMetric};

use crate::renames::AliasTable;

/// Static metrics of every release file at one commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticSnapshot {
    files: BTreeMap<String, BTreeMap<DeltaMetric, f64>>,
}

impl StaticSnapshot {
    /// Average the class states per release file and derive the tracked
    /// metrics from the averages.
    ///
    /// Classes in files that do not denote a release file are ignored. A
    /// source metric is averaged over the classes that report it.
    pub fn from_class_states(states: &[ClassMetrics], aliases: &AliasTable) -> Self {
        let mut sums: BTreeMap<&str, BTreeMap<SourceMetric, (f64, usize)>> = BTreeMap::new();
        for class in states {
            let Some(target) = aliases.resolve(&class.path) else {
                continue;
            };
            let file = sums.entry(target).or_default();
            for (metric, value) in &class.values {
                let slot = file.entry(*metric).or_insert((0.0, 0));
                slot.0 += value;
                slot.1 += 1;
            }
        }

        let files = sums
            .into_iter()
            .map(|(file, metrics)| {
                let averages: BTreeMap<SourceMetric, f64> = metrics
                    .into_iter()
                    .map(|(m, (sum, count))| (m, sum / count as f64))
                    .collect();
                let derived = DeltaMetric::ALL
                    .iter()
                    .filter_map(|m| m.derive(&averages).map(|v| (*m, v)))
                    .collect();
                (file.to_string(), derived)
            })
            .collect();
        Self { files }
    }

    /// Metrics of one release file, if it had any classes.
    pub fn file(&self, path: &str) -> Option<&BTreeMap<DeltaMetric, f64>> {
        self.files.get(path)
    }

    /// Whether no file has metrics.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<(String, BTreeMap<DeltaMetric, f64>)> for StaticSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, BTreeMap<DeltaMetric, f64>)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Build the delta matrix from snapshots ordered oldest first.
///
/// Snapshots are paired `(0, 1), (2, 3), ...`; an odd trailing snapshot is
/// dropped. For each pair a file missing from either snapshot gets an absent
/// cell for every metric; otherwise each metric gets the absolute difference,
/// or an absent cell if either snapshot lacks that metric.
pub fn delta_matrix(snapshots: &[StaticSnapshot], files: &[String]) -> DeltaMatrix {
    let mut deltas = DeltaMatrix::with_files(&DeltaMetric::ALL, files.iter().map(String::as_str));
    for pair in snapshots.chunks_exact(2) {
        let (older, newer) = (&pair[0], &pair[1]);
        for file in files {
            let (Some(a), Some(b)) = (older.file(file), newer.file(file)) else {
                for metric in DeltaMetric::ALL {
                    deltas.push(metric, file, None);
                }
                continue;
            };
            for metric in DeltaMetric::ALL {
                let cell = match (a.get(&metric), b.get(&metric)) {
                    (Some(x), Some(y)) => Some((x - y).abs()),
                    _ => None,
                };
                deltas.push(metric, file, cell);
            }
        }
    }
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(path: &str, values: &[(SourceMetric, f64)]) -> ClassMetrics {
        ClassMetrics {
            path: path.into(),
            values: values.iter().copied().collect(),
        }
    }

    #[test]
    fn classes_are_averaged_per_release_file() {
        let aliases = AliasTable::new(["A.java"]);
        let states = [
            class("A.java", &[(SourceMetric::Wmc, 4.0), (SourceMetric::Tna, 3.0), (SourceMetric::Tnpa, 1.0)]),
            class("A.java", &[(SourceMetric::Wmc, 2.0), (SourceMetric::Tna, 5.0), (SourceMetric::Tnpa, 1.0)]),
            class("Other.java", &[(SourceMetric::Wmc, 100.0)]),
        ];
        let snapshot = StaticSnapshot::from_class_states(&states, &aliases);
        let a = snapshot.file("A.java").unwrap();
        assert_eq!(a[&DeltaMetric::Wmc], 3.0);
        assert_eq!(a[&DeltaMetric::TnaMinusTnpa], 3.0);
        assert!(!a.contains_key(&DeltaMetric::Dit));
        assert!(snapshot.file("Other.java").is_none());
    }

    #[test]
    fn pairs_give_absolute_deltas() {
        let files = vec!["A.java".to_string(), "B.java".to_string()];
        let snap = |wmc: f64| -> StaticSnapshot {
            [("A.java".to_string(), BTreeMap::from([(DeltaMetric::Wmc, wmc)]))]
                .into_iter()
                .collect()
        };
        let snapshots = [snap(10.0), snap(4.0), snap(1.0), snap(3.0), snap(7.0)];
        let deltas = delta_matrix(&snapshots, &files);

        assert_eq!(deltas.series(DeltaMetric::Wmc, "A.java"), Some(&[Some(6.0), Some(2.0)][..]));
        assert_eq!(deltas.series(DeltaMetric::Dit, "A.java"), Some(&[None, None][..]));
        assert_eq!(deltas.series(DeltaMetric::Wmc, "B.java"), Some(&[None, None][..]));
    }

    #[test]
    fn no_snapshots_give_empty_rows() {
        let files = vec!["A.java".to_string()];
        let deltas = delta_matrix(&[], &files);
        assert_eq!(deltas.series(DeltaMetric::Tloc, "A.java"), Some(&[][..]));
    }
}
