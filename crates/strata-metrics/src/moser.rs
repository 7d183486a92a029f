//! Process metrics after Moser et al.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use strata_core::ChangeHistory;

/// Change metrics of one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoserMetrics {
    pub authors: usize,
    pub revisions: usize,
    pub sum_lines_added: u64,
    pub max_lines_added: u64,
    pub avg_lines_added: f64,
    pub sum_lines_deleted: u64,
    pub max_lines_deleted: u64,
    pub avg_lines_deleted: f64,
    /// Lines added minus lines deleted over all revisions.
    pub sum_code_churn: i64,
    /// Largest added-minus-deleted of a single revision.
    pub max_code_churn: i64,
    pub avg_code_churn: f64,
    pub max_changeset: u64,
    pub avg_changeset: f64,
    /// Commits whose message mentions a refactoring.
    pub refactorings: usize,
    /// Commits whose message mentions a fix.
    pub bugfix: usize,
    /// Days from first occurrence to release.
    pub age: i64,
    /// Change ages weighted by lines added.
    pub weighted_age: f64,
}

impl MoserMetrics {
    /// Compute the metrics of one history.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_core::ChangeHistory;
    /// use strata_metrics::MoserMetrics;
    ///
    /// let history = ChangeHistory {
    ///     authors: vec!["a".into(), "b".into(), "a".into()],
    ///     revisions: vec!["r1".into(), "r2".into(), "r3".into()],
    ///     lines_added: vec![4, 0, 2],
    ///     lines_deleted: vec![0, 3, 0],
    ///     changesets: vec![1, 1, 4],
    ///     commit_messages: vec!["init".into(), "Fix NPE".into(), "refactor io".into()],
    ///     ages: vec![0, 5, 10],
    ///     age: 10,
    ///     ..Default::default()
    /// };
    /// let m = MoserMetrics::from_history(&history);
    /// assert_eq!(m.authors, 2);
    /// assert_eq!(m.sum_code_churn, 3);
    /// assert_eq!(m.bugfix, 1);
    /// assert_eq!(m.refactorings, 1);
    /// assert_eq!(m.weighted_age, 20.0 / 6.0);
    /// ```
    pub fn from_history(history: &ChangeHistory) -> Self {
        let revisions = history.revisions.len();
        let sum_lines_added: u64 = history.lines_added.iter().sum();
        let sum_lines_deleted: u64 = history.lines_deleted.iter().sum();
        let sum_code_churn = sum_lines_added as i64 - sum_lines_deleted as i64;
        let max_code_churn = history
            .lines_added
            .iter()
            .zip(&history.lines_deleted)
            .map(|(a, d)| *a as i64 - *d as i64)
            .max()
            .unwrap_or(0);

        let messages: Vec<String> = history
            .commit_messages
            .iter()
            .map(|m| m.to_lowercase())
            .collect();
        let refactorings = messages.iter().filter(|m| m.contains("refactor")).count();
        let bugfix = messages
            .iter()
            .filter(|m| m.contains("fix") && !m.contains(" prefix ") && !m.contains(" postfix "))
            .count();

        let mut metrics = Self {
            authors: history.authors.iter().collect::<BTreeSet<_>>().len(),
            revisions,
            sum_lines_added,
            max_lines_added: history.lines_added.iter().copied().max().unwrap_or(0),
            sum_lines_deleted,
            max_lines_deleted: history.lines_deleted.iter().copied().max().unwrap_or(0),
            sum_code_churn,
            max_code_churn,
            max_changeset: history.changesets.iter().copied().max().unwrap_or(0),
            refactorings,
            bugfix,
            age: history.age,
            ..Default::default()
        };

        if sum_lines_added > 0 {
            let weighted: i64 = history
                .ages
                .iter()
                .zip(&history.lines_added)
                .map(|(age, added)| age * *added as i64)
                .sum();
            metrics.weighted_age = weighted as f64 / sum_lines_added as f64;
        }

        if revisions > 0 {
            let n = revisions as f64;
            let changesets: u64 = history.changesets.iter().sum();
            metrics.avg_lines_added = sum_lines_added as f64 / n;
            metrics.avg_lines_deleted = sum_lines_deleted as f64 / n;
            metrics.avg_code_churn = sum_code_churn as f64 / n;
            metrics.avg_changeset = changesets as f64 / n;
        }
        metrics
    }
}

/// Compute Moser metrics for every file in `histories`.
pub fn moser(histories: &BTreeMap<String, ChangeHistory>) -> BTreeMap<String, MoserMetrics> {
    histories
        .iter()
        .map(|(file, history)| (file.clone(), MoserMetrics::from_history(history)))
        .collect()
}
