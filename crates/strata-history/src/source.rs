//! Access to a stored commit history.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_core::{
    ChangeTypeCounts, ClassMetrics, CommitNode, FileAction, Issue, Refactoring, StrataError,
};

/// Read access to a mined history.
///
/// All calls are blocking and are made from a single thread. Lookups of
/// unknown ids return empty results rather than errors.
pub trait HistorySource {
    /// Every commit in the store.
    fn commits(&self) -> strata_core::Result<Vec<CommitNode>>;

    /// File actions of one commit.
    fn file_actions(&self, commit: &str) -> strata_core::Result<Vec<FileAction>>;

    /// Paths of all files present at `revision`.
    fn files_at(&self, revision: &str) -> strata_core::Result<Vec<String>>;

    /// File actions blamed for the fixing action `fix_action_id` under `label`.
    fn inducing_actions(
        &self,
        fix_action_id: &str,
        label: &str,
    ) -> strata_core::Result<Vec<FileAction>>;

    /// Issue by store id.
    fn issue(&self, id: &str) -> strata_core::Result<Option<Issue>>;

    /// Refactorings detected in one commit.
    fn refactorings(&self, commit: &str) -> strata_core::Result<Vec<Refactoring>>;

    /// Change classification counts per path between two commits.
    fn change_types(
        &self,
        old_commit: &str,
        new_commit: &str,
    ) -> strata_core::Result<BTreeMap<String, ChangeTypeCounts>>;

    /// Class-level static metrics at one commit.
    fn class_states(&self, commit: &str) -> strata_core::Result<Vec<ClassMetrics>>;
}

/// Change classifications of one commit pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitClassification {
    pub old_commit: String,
    pub new_commit: String,
    /// Counts per path, keyed by classification type.
    pub files: BTreeMap<String, ChangeTypeCounts>,
}

/// History held in memory, loadable from JSON.
///
/// # Examples
///
/// ```
/// use strata_history::{HistorySource, MemoryHistory};
///
/// let json = r#"{
///     "commits": [
///         {"hash": "h1", "author": "alice", "committerDate": "2018-01-01T00:00:00Z"}
///     ],
///     "fileActions": [
///         {"id": "fa1", "commit": "h1", "path": "A/A.java", "mode": "A", "linesAdded": 3}
///     ],
///     "files": {"h1": ["A/A.java"]}
/// }"#;
/// let history = MemoryHistory::from_json(json).unwrap();
/// assert_eq!(history.commits().unwrap().len(), 1);
/// assert_eq!(history.file_actions("h1").unwrap()[0].lines_added, 3);
/// assert!(history.file_actions("unknown").unwrap().is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryHistory {
    #[serde(default)]
    pub commits: Vec<CommitNode>,
    #[serde(default)]
    pub file_actions: Vec<FileAction>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    /// Refactorings by commit hash.
    #[serde(default)]
    pub refactorings: BTreeMap<String, Vec<Refactoring>>,
    #[serde(default)]
    pub classifications: Vec<CommitClassification>,
    /// Class states by commit hash.
    #[serde(default)]
    pub class_states: BTreeMap<String, Vec<ClassMetrics>>,
    /// File paths present at each listed revision.
    #[serde(default)]
    pub files: BTreeMap<String, Vec<String>>,
}

impl MemoryHistory {
    /// Parse a history from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Serialization`] if the JSON does not match and
    /// [`StrataError::History`] if a commit hash appears twice.
    pub fn from_json(content: &str) -> strata_core::Result<Self> {
        let history: Self = serde_json::from_str(content)?;
        let mut seen = HashSet::new();
        for commit in &history.commits {
            if !seen.insert(commit.hash.as_str()) {
                return Err(StrataError::History(format!(
                    "commit {} is listed twice",
                    commit.hash
                )));
            }
        }
        Ok(history)
    }

    /// Load a history from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::FileNotFound`] if `path` does not exist,
    /// [`StrataError::Io`] if it cannot be read and
    /// [`StrataError::Serialization`] if the JSON does not match.
    pub fn from_file(path: &Path) -> strata_core::Result<Self> {
        if !path.exists() {
            return Err(StrataError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

impl HistorySource for MemoryHistory {
    fn commits(&self) -> strata_core::Result<Vec<CommitNode>> {
        Ok(self.commits.clone())
    }

    fn file_actions(&self, commit: &str) -> strata_core::Result<Vec<FileAction>> {
        Ok(self
            .file_actions
            .iter()
            .filter(|fa| fa.commit == commit)
            .cloned()
            .collect())
    }

    fn files_at(&self, revision: &str) -> strata_core::Result<Vec<String>> {
        Ok(self.files.get(revision).cloned().unwrap_or_default())
    }

    fn inducing_actions(
        &self,
        fix_action_id: &str,
        label: &str,
    ) -> strata_core::Result<Vec<FileAction>> {
        Ok(self
            .file_actions
            .iter()
            .filter(|fa| {
                fa.induces
                    .iter()
                    .any(|edge| edge.fix_action_id == fix_action_id && edge.label == label)
            })
            .cloned()
            .collect())
    }

    fn issue(&self, id: &str) -> strata_core::Result<Option<Issue>> {
        Ok(self.issues.iter().find(|i| i.id == id).cloned())
    }

    fn refactorings(&self, commit: &str) -> strata_core::Result<Vec<Refactoring>> {
        Ok(self.refactorings.get(commit).cloned().unwrap_or_default())
    }

    fn change_types(
        &self,
        old_commit: &str,
        new_commit: &str,
    ) -> strata_core::Result<BTreeMap<String, ChangeTypeCounts>> {
        Ok(self
            .classifications
            .iter()
            .find(|c| c.old_commit == old_commit && c.new_commit == new_commit)
            .map(|c| c.files.clone())
            .unwrap_or_default())
    }

    fn class_states(&self, commit: &str) -> strata_core::Result<Vec<ClassMetrics>> {
        Ok(self.class_states.get(commit).cloned().unwrap_or_default())
    }
}
