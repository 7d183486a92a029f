//! History read straight from a git repository via git2.
//!
//! Commits, file actions and file listings come from the object database.
//! Git carries no issue tracker, refactoring or change classification data,
//! so those lookups are always empty and no commit counts as a bugfix.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::DateTime;
use git2::{Delta, DiffFindOptions, DiffOptions, ObjectType, Repository, Sort, TreeWalkMode, TreeWalkResult};
use strata_core::{
    ChangeTypeCounts, ClassMetrics, CommitNode, FileAction, FileMode, FilesConfig, Issue,
    Refactoring, SourceMetric, StrataError,
};
use tracing::debug;

use crate::source::HistorySource;

/// [`HistorySource`] backed by a local git repository.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use strata_core::FilesConfig;
/// use strata_history::{GitHistory, HistorySource};
///
/// let history = GitHistory::open(Path::new("."), FilesConfig::default()).unwrap();
/// let head = history.resolve_revision("HEAD").unwrap();
/// for path in history.files_at(&head).unwrap() {
///     println!("{path}");
/// }
/// ```
pub struct GitHistory {
    repo: Repository,
    files: FilesConfig,
    actions: RefCell<HashMap<String, Vec<FileAction>>>,
}

impl GitHistory {
    /// Open the repository at `path`.
    ///
    /// `files` decides which paths get a line-count class state.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Git`] if the repository cannot be opened.
    pub fn open(path: &Path, files: FilesConfig) -> strata_core::Result<Self> {
        let repo = Repository::open(path)
            .map_err(|e| StrataError::Git(format!("failed to open repository: {e}")))?;
        Ok(Self {
            repo,
            files,
            actions: RefCell::new(HashMap::new()),
        })
    }

    /// Full hash of the commit a revision spec (`HEAD`, a tag, a short hash)
    /// points to.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Git`] if the spec does not name a commit.
    pub fn resolve_revision(&self, spec: &str) -> strata_core::Result<String> {
        let object = self
            .repo
            .revparse_single(spec)
            .map_err(|e| StrataError::Git(format!("failed to resolve revision '{spec}': {e}")))?;
        let commit = object
            .peel_to_commit()
            .map_err(|e| StrataError::Git(format!("'{spec}' is not a commit: {e}")))?;
        Ok(commit.id().to_string())
    }

    fn find_commit(&self, hash: &str) -> strata_core::Result<git2::Commit<'_>> {
        let oid = git2::Oid::from_str(hash)
            .map_err(|e| StrataError::Git(format!("invalid commit hash '{hash}': {e}")))?;
        self.repo
            .find_commit(oid)
            .map_err(|e| StrataError::Git(format!("failed to find commit {hash}: {e}")))
    }

    fn diff_actions(&self, commit: &git2::Commit<'_>) -> strata_core::Result<Vec<FileAction>> {
        let hash = commit.id().to_string();
        let commit_tree = commit
            .tree()
            .map_err(|e| StrataError::Git(format!("failed to get commit tree: {e}")))?;
        let parent_tree = if commit.parent_count() > 0 {
            let parent = commit
                .parent(0)
                .map_err(|e| StrataError::Git(format!("failed to get parent: {e}")))?;
            Some(
                parent
                    .tree()
                    .map_err(|e| StrataError::Git(format!("failed to get parent tree: {e}")))?,
            )
        } else {
            None
        };

        let mut diff_opts = DiffOptions::new();
        let mut diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), Some(&mut diff_opts))
            .map_err(|e| StrataError::Git(format!("failed to compute diff: {e}")))?;

        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true).copies(true);
        diff.find_similar(Some(&mut find_opts))
            .map_err(|e| StrataError::Git(format!("failed to find renames: {e}")))?;

        let mut actions = Vec::new();
        for (idx, delta) in diff.deltas().enumerate() {
            let new_path = path_string(delta.new_file().path());
            let old_path = path_string(delta.old_file().path());
            let (mode, path, old) = match delta.status() {
                Delta::Added => (FileMode::Add, new_path, None),
                Delta::Deleted => (FileMode::Delete, old_path, None),
                Delta::Modified | Delta::Typechange => (FileMode::Modify, new_path, None),
                Delta::Renamed => (FileMode::Rename, new_path, Some(old_path)),
                Delta::Copied => (FileMode::Copy, new_path, Some(old_path)),
                _ => continue,
            };
            if path.is_empty() {
                continue;
            }

            let (hunks, lines_added, lines_deleted) = match git2::Patch::from_diff(&diff, idx)
                .map_err(|e| StrataError::Git(format!("failed to build patch: {e}")))?
            {
                Some(patch) => {
                    let (_, added, deleted) = patch
                        .line_stats()
                        .map_err(|e| StrataError::Git(format!("failed to count lines: {e}")))?;
                    (patch.num_hunks() as u64, added as u64, deleted as u64)
                }
                None => (0, 0, 0),
            };

            actions.push(FileAction {
                id: format!("{hash}:{path}"),
                commit: hash.clone(),
                path,
                mode,
                lines_added,
                lines_deleted,
                hunks,
                old_path: old,
                induces: vec![],
            });
        }
        Ok(actions)
    }

    fn blob_paths(&self, hash: &str) -> strata_core::Result<Vec<(String, git2::Oid)>> {
        let tree = self
            .find_commit(hash)?
            .tree()
            .map_err(|e| StrataError::Git(format!("failed to get commit tree: {e}")))?;
        let mut paths = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    paths.push((format!("{root}{name}"), entry.id()));
                }
            }
            TreeWalkResult::Ok
        })
        .map_err(|e| StrataError::Git(format!("failed to walk tree: {e}")))?;
        Ok(paths)
    }
}

fn path_string(path: Option<&Path>) -> String {
    path.map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl HistorySource for GitHistory {
    fn commits(&self) -> strata_core::Result<Vec<CommitNode>> {
        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| StrataError::Git(format!("failed to create revwalk: {e}")))?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(|e| StrataError::Git(format!("failed to sort revwalk: {e}")))?;
        revwalk
            .push_head()
            .map_err(|e| StrataError::Git(format!("failed to push HEAD: {e}")))?;
        for glob in ["refs/heads", "refs/tags"] {
            revwalk
                .push_glob(glob)
                .map_err(|e| StrataError::Git(format!("failed to push {glob}: {e}")))?;
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(|e| StrataError::Git(format!("revwalk error: {e}")))?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(|e| StrataError::Git(format!("failed to find commit: {e}")))?;
            let seconds = commit.committer().when().seconds();
            let committer_date = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
                StrataError::Git(format!("commit {oid} has an invalid timestamp {seconds}"))
            })?;
            let author = commit.author();
            commits.push(CommitNode {
                hash: oid.to_string(),
                parents: commit.parent_ids().map(|p| p.to_string()).collect(),
                author: format!(
                    "{} <{}>",
                    author.name().unwrap_or("unknown"),
                    author.email().unwrap_or("unknown")
                ),
                committer_date,
                message: commit.message().unwrap_or("").to_string(),
                fixed_issue_ids: vec![],
                validated_bugfix: false,
            });
        }
        debug!(commits = commits.len(), "read commits from repository");
        Ok(commits)
    }

    fn file_actions(&self, commit: &str) -> strata_core::Result<Vec<FileAction>> {
        if let Some(cached) = self.actions.borrow().get(commit) {
            return Ok(cached.clone());
        }
        let actions = self.diff_actions(&self.find_commit(commit)?)?;
        self.actions
            .borrow_mut()
            .insert(commit.to_string(), actions.clone());
        Ok(actions)
    }

    fn files_at(&self, revision: &str) -> strata_core::Result<Vec<String>> {
        Ok(self
            .blob_paths(revision)?
            .into_iter()
            .map(|(path, _)| path)
            .collect())
    }

    fn inducing_actions(
        &self,
        _fix_action_id: &str,
        _label: &str,
    ) -> strata_core::Result<Vec<FileAction>> {
        Ok(Vec::new())
    }

    fn issue(&self, _id: &str) -> strata_core::Result<Option<Issue>> {
        Ok(None)
    }

    fn refactorings(&self, _commit: &str) -> strata_core::Result<Vec<Refactoring>> {
        Ok(Vec::new())
    }

    fn change_types(
        &self,
        _old_commit: &str,
        _new_commit: &str,
    ) -> strata_core::Result<BTreeMap<String, ChangeTypeCounts>> {
        Ok(BTreeMap::new())
    }

    /// One pseudo-class per tracked file carrying its line count as `tloc`.
    fn class_states(&self, commit: &str) -> strata_core::Result<Vec<ClassMetrics>> {
        let mut states = Vec::new();
        for (path, oid) in self.blob_paths(commit)? {
            if !self.files.is_tracked(&path) {
                continue;
            }
            let blob = self
                .repo
                .find_blob(oid)
                .map_err(|e| StrataError::Git(format!("failed to read blob {path}: {e}")))?;
            if blob.is_binary() {
                continue;
            }
            let lines = blob.content().split(|b| *b == b'\n').filter(|l| !l.is_empty()).count();
            states.push(ClassMetrics {
                path,
                values: BTreeMap::from([(SourceMetric::Tloc, lines as f64)]),
            });
        }
        Ok(states)
    }
}
