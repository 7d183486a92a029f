//! Change path resolution for one target release.
//!
//! Two backward walks start at the release commit. The full ancestry builds
//! the alias table and the first-occurrence dates of every release file. The
//! bounded ancestry (commits younger than the change window) collects the
//! per-file change histories and the static-metric snapshots. Bug-inducing
//! links come from validated bug fixes made after the release.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use strata_core::{
    BugInducingLink, ChangeHistory, ChangeTypeCounts, CommitNode, DeltaMatrix, FileAction,
    FileMode, FilesConfig, MiningConfig, StrataError, SzzType,
};
use tracing::{debug, info, warn};

use crate::graph::{traverse, CommitGraph, Direction};
use crate::renames::{resolve_renames, AliasTable};
use crate::snapshots::{delta_matrix, StaticSnapshot};
use crate::source::HistorySource;

/// Bounds of the change window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePathSummary {
    /// Revision hash of the release.
    pub release: String,
    /// Committer date of the release.
    pub release_date: DateTime<Utc>,
    /// Commits older than this are outside the window.
    pub cutoff: DateTime<Utc>,
    /// Every commit on the bounded change paths.
    pub commits: BTreeSet<String>,
}

/// Everything one mining run produces for a release.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningRun {
    /// Change history per release file.
    pub histories: BTreeMap<String, ChangeHistory>,
    /// Bug-inducing links per release file. Files without links are absent.
    pub bug_links: BTreeMap<String, Vec<BugInducingLink>>,
    /// Date each release file first appeared.
    pub first_occurrences: BTreeMap<String, DateTime<Utc>>,
    /// Static-metric deltas between paired snapshots.
    pub deltas: DeltaMatrix,
    pub summary: ChangePathSummary,
}

/// Release files of `release` selected by `files`, sorted.
///
/// # Errors
///
/// Propagates errors of the history source.
pub fn tracked_files<S>(
    source: &S,
    release: &str,
    files: &FilesConfig,
) -> strata_core::Result<Vec<String>>
where
    S: HistorySource + ?Sized,
{
    let mut tracked: Vec<String> = source
        .files_at(release)?
        .into_iter()
        .filter(|path| files.is_tracked(path))
        .collect();
    tracked.sort();
    tracked.dedup();
    Ok(tracked)
}

/// Mine the change histories of `tracked_files` for the release commit
/// `release`.
///
/// # Errors
///
/// Returns [`StrataError::UnknownCommit`] if the release is not in `graph`,
/// [`StrataError::FirstOccurrenceUnresolved`] if no addition can be found for
/// a release file, [`StrataError::Config`] if the change window cannot be
/// applied to the release date, and propagates errors of the history source.
pub fn build_histories<S>(
    graph: &CommitGraph,
    release: &str,
    tracked_files: &[String],
    source: &S,
    config: &MiningConfig,
) -> strata_core::Result<MiningRun>
where
    S: HistorySource + ?Sized,
{
    let release_node = graph
        .commit(release)
        .ok_or_else(|| StrataError::UnknownCommit(release.to_string()))?;
    info!(
        release,
        files = tracked_files.len(),
        commits = graph.len(),
        "building change histories"
    );

    let mut run = Run {
        graph,
        source,
        config,
        release: release_node,
        aliases: AliasTable::new(tracked_files.iter().cloned()),
        first_occurrences: BTreeMap::new(),
        histories: tracked_files
            .iter()
            .map(|f| (f.clone(), ChangeHistory::default()))
            .collect(),
        snapshots: Vec::new(),
    };

    let ancestors = run.ordered_ancestors()?;
    run.resolve_first_occurrences(&ancestors, tracked_files)?;
    let summary = run.walk_change_paths()?;

    let mut snapshots = std::mem::take(&mut run.snapshots);
    snapshots.reverse();
    let deltas = delta_matrix(&snapshots, tracked_files);
    let bug_links = run.bug_links()?;

    info!(
        aliases = run.aliases.len(),
        window_commits = summary.commits.len(),
        snapshots = snapshots.len(),
        linked_files = bug_links.len(),
        "change histories complete"
    );

    Ok(MiningRun {
        histories: run.histories,
        bug_links,
        first_occurrences: run.first_occurrences,
        deltas,
        summary,
    })
}

/// Whole days from `earlier` to `later`, rounded down.
fn days_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    (later - earlier).num_seconds().div_euclid(86_400)
}

/// State of one mining run.
struct Run<'a, S: ?Sized> {
    graph: &'a CommitGraph,
    source: &'a S,
    config: &'a MiningConfig,
    release: &'a CommitNode,
    aliases: AliasTable,
    first_occurrences: BTreeMap<String, DateTime<Utc>>,
    histories: BTreeMap<String, ChangeHistory>,
    /// Newest first.
    snapshots: Vec<StaticSnapshot>,
}

impl<'a, S> Run<'a, S>
where
    S: HistorySource + ?Sized,
{
    /// Ancestors of the release, the release included, newest first with
    /// ties broken by hash.
    fn ordered_ancestors(&self) -> strata_core::Result<Vec<&'a CommitNode>> {
        let paths = traverse(self.graph, &self.release.hash, Direction::Backward, |_| false)?;
        let hashes: HashSet<&str> = paths.iter().flatten().map(String::as_str).collect();
        let mut commits = hashes
            .into_iter()
            .map(|h| {
                self.graph
                    .commit(h)
                    .ok_or_else(|| StrataError::UnknownCommit(h.to_string()))
            })
            .collect::<strata_core::Result<Vec<_>>>()?;
        commits.sort_by(|a, b| {
            b.committer_date
                .cmp(&a.committer_date)
                .then_with(|| a.hash.cmp(&b.hash))
        });
        Ok(commits)
    }

    fn resolve_first_occurrences(
        &mut self,
        ancestors: &[&'a CommitNode],
        tracked_files: &[String],
    ) -> strata_core::Result<()> {
        let mut additions: HashMap<String, Vec<DateTime<Utc>>> = HashMap::new();
        for commit in ancestors {
            if commit.is_merge() {
                continue;
            }
            let actions = self.source.file_actions(&commit.hash)?;
            let renames = resolve_renames(&actions);
            for (old, new) in &renames.true_renames {
                self.aliases.record_rename(old, new, &commit.hash);
            }

            let added = renames.added_files.into_iter().chain(
                actions
                    .into_iter()
                    .filter(|fa| fa.mode.introduces_path())
                    .map(|fa| fa.path),
            );
            for path in added {
                additions.entry(path).or_default().push(commit.committer_date);
            }
        }

        let mut latest: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for (path, dates) in &additions {
            let Some(target) = self.aliases.resolve(path) else {
                continue;
            };
            let Some(max) = dates.iter().max() else {
                continue;
            };
            let entry = latest.entry(target).or_insert(*max);
            if *max > *entry {
                *entry = *max;
            }
        }
        let latest: HashMap<String, DateTime<Utc>> = latest
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        for file in tracked_files {
            let date = match latest.get(file) {
                Some(date) => *date,
                None => {
                    debug!(file = %file, "no recorded addition, scanning history");
                    first_occurrence_fallback(self.source, ancestors, file)?
                }
            };
            self.first_occurrences.insert(file.clone(), date);
        }
        debug!(
            files = self.first_occurrences.len(),
            aliases = self.aliases.len(),
            "first occurrences resolved"
        );
        Ok(())
    }

    fn walk_change_paths(&mut self) -> strata_core::Result<ChangePathSummary> {
        let release_date = self.release.committer_date;
        let cutoff = release_date
            .checked_sub_months(Months::new(self.config.change_window_months))
            .ok_or_else(|| {
                StrataError::Config(format!(
                    "change window of {} months reaches before the earliest date",
                    self.config.change_window_months
                ))
            })?;
        let graph = self.graph;
        let paths = traverse(graph, &self.release.hash, Direction::Backward, |h| {
            graph.commit(h).is_some_and(|c| c.committer_date < cutoff)
        })?;

        let window = Duration::days(self.config.snapshot_window_days);
        let mut last_snapshot = release_date + window + Duration::days(1);
        let mut processed: HashSet<&str> = HashSet::new();

        for hash in paths.iter().flatten() {
            if !processed.insert(hash.as_str()) {
                continue;
            }
            let commit = graph
                .commit(hash)
                .ok_or_else(|| StrataError::UnknownCommit(hash.clone()))?;
            if commit.is_merge() {
                continue;
            }

            let actions = self.source.file_actions(hash)?;
            if self.record_changes(commit, &actions)? {
                self.record_refactorings(commit)?;
            }
            if let Some(parent) = commit.parents.first() {
                self.record_change_types(parent, commit)?;
            }

            if last_snapshot - window >= commit.committer_date {
                last_snapshot = commit.committer_date;
                let states = self.source.class_states(hash)?;
                self.snapshots
                    .push(StaticSnapshot::from_class_states(&states, &self.aliases));
                debug!(commit = %hash, "static snapshot taken");
            }
        }

        for (file, history) in &mut self.histories {
            history.authors.reverse();
            history.revisions.reverse();
            history.lines_added.reverse();
            history.lines_deleted.reverse();
            history.changesets.reverse();
            history.commit_messages.reverse();
            history.ages.reverse();
            history.days_from_release.reverse();
            history.refactorings.reverse();
            history.change_types.reverse();
            if let Some(first) = self.first_occurrences.get(file) {
                history.age = days_between(release_date, *first);
            }
        }

        Ok(ChangePathSummary {
            release: self.release.hash.clone(),
            release_date,
            cutoff,
            commits: paths.into_iter().flatten().collect(),
        })
    }

    /// Record every action on a release file. Returns whether any was found.
    fn record_changes(
        &mut self,
        commit: &CommitNode,
        actions: &[FileAction],
    ) -> strata_core::Result<bool> {
        let changeset: u64 = actions.iter().map(|fa| fa.hunks).sum();
        let release_date = self.release.committer_date;
        let mut touched = false;

        for fa in actions {
            let Some(target) = self.aliases.resolve(&fa.path) else {
                continue;
            };
            let first = *self.first_occurrences.get(target).ok_or_else(|| {
                StrataError::FirstOccurrenceUnresolved {
                    path: target.to_string(),
                }
            })?;
            let Some(history) = self.histories.get_mut(target) else {
                continue;
            };
            touched = true;

            history.authors.push(commit.author.clone());
            history.revisions.push(commit.hash.clone());
            history.lines_added.push(fa.lines_added);
            history.lines_deleted.push(fa.lines_deleted);
            history.changesets.push(changeset);
            history.commit_messages.push(commit.message.clone());
            history.ages.push(days_between(commit.committer_date, first));
            history
                .days_from_release
                .push(days_between(release_date, commit.committer_date));
        }
        Ok(touched)
    }

    fn record_refactorings(&mut self, commit: &CommitNode) -> strata_core::Result<()> {
        let unique: BTreeSet<_> = self
            .source
            .refactorings(&commit.hash)?
            .into_iter()
            .filter(|r| self.aliases.contains(&r.path))
            .map(|r| (r.path, r.kind, r.entity))
            .collect();
        for (path, kind, _) in unique {
            let Some(target) = self.aliases.resolve(&path) else {
                continue;
            };
            if let Some(history) = self.histories.get_mut(target) {
                history.refactorings.push(kind);
            }
        }
        Ok(())
    }

    fn record_change_types(&mut self, parent: &str, commit: &CommitNode) -> strata_core::Result<()> {
        for (path, counts) in self.source.change_types(parent, &commit.hash)? {
            let Some(target) = self.aliases.resolve(&path) else {
                continue;
            };
            let mut merged = ChangeTypeCounts::new();
            for (kind, count) in counts {
                *merged.entry(kind.to_lowercase()).or_default() += count;
            }
            if let Some(history) = self.histories.get_mut(target) {
                history.change_types.push(merged);
            }
        }
        Ok(())
    }

    /// Links from post-release bug fixes back to release files.
    ///
    /// A fix action whose blamed commits do not all lead to the release
    /// contributes nothing, except that a blamed commit which is itself an
    /// earlier fix of the same issues is skipped on its own.
    fn bug_links(&self) -> strata_core::Result<BTreeMap<String, Vec<BugInducingLink>>> {
        let release_date = self.release.committer_date;
        let label = self.config.inducing_label.as_str();

        let mut fixes: Vec<&CommitNode> = self
            .graph
            .commits()
            .filter(|c| {
                c.validated_bugfix
                    && !c.fixed_issue_ids.is_empty()
                    && c.parents.len() == 1
                    && c.committer_date > release_date
            })
            .collect();
        fixes.sort_by(|a, b| {
            a.committer_date
                .cmp(&b.committer_date)
                .then_with(|| a.hash.cmp(&b.hash))
        });
        debug!(fixes = fixes.len(), "collecting bug-inducing links");

        // blamed commit -> blamed path -> links
        let mut inducing: BTreeMap<String, BTreeMap<String, Vec<BugInducingLink>>> =
            BTreeMap::new();

        for fix in fixes {
            for fa in self.source.file_actions(&fix.hash)? {
                if fa.mode != FileMode::Modify || !self.aliases.contains(&fa.path) {
                    continue;
                }

                let mut have_path = true;
                let mut blamed_commits = Vec::new();

                for ifa in self.source.inducing_actions(&fa.id, label)? {
                    if !self.aliases.contains(&ifa.path) {
                        continue;
                    }
                    if !self.graph.has_path(&ifa.commit, &self.release.hash) {
                        have_path = false;
                    }
                    let blamed = self.graph.commit(&ifa.commit);
                    let partial_fix = blamed.is_some_and(|b| {
                        fix.fixed_issue_ids
                            .iter()
                            .all(|issue| b.fixed_issue_ids.contains(issue))
                    });
                    if partial_fix && !have_path {
                        have_path = true;
                        continue;
                    }
                    blamed_commits.push(ifa.commit.clone());

                    for edge in &ifa.induces {
                        if edge.fix_action_id != fa.id
                            || edge.label != label
                            || edge.szz_type == SzzType::HardSuspect
                        {
                            continue;
                        }
                        let links = inducing
                            .entry(ifa.commit.clone())
                            .or_default()
                            .entry(ifa.path.clone())
                            .or_default();
                        for issue_id in &fix.fixed_issue_ids {
                            let Some(issue) = self.source.issue(issue_id)? else {
                                warn!(issue = %issue_id, fix = %fix.hash, "fixed issue missing from store, skipping");
                                continue;
                            };
                            links.push(BugInducingLink {
                                file: ifa.path.clone(),
                                issue: issue.external_id,
                                bugfix_commit: fix.hash.clone(),
                                bugfix_date: fix.committer_date,
                                severity: lowercase_or_none(issue.priority.as_deref()),
                                issue_type: lowercase_or_none(issue.issue_type.as_deref()),
                                issue_created_at: issue.created_at,
                            });
                        }
                    }
                }

                if !have_path {
                    debug!(fix = %fix.hash, action = %fa.id, "blamed commits do not all reach the release, dropping");
                    for blamed in &blamed_commits {
                        inducing.remove(blamed);
                    }
                }
            }
        }

        let mut by_file: BTreeMap<String, Vec<BugInducingLink>> = BTreeMap::new();
        for files in inducing.into_values() {
            for (path, links) in files {
                let Some(target) = self.aliases.resolve(&path) else {
                    continue;
                };
                let entry = by_file.entry(target.to_string()).or_default();
                for mut link in links {
                    link.file = target.to_string();
                    if !entry.contains(&link) {
                        entry.push(link);
                    }
                }
            }
        }
        Ok(by_file)
    }
}

fn lowercase_or_none(value: Option<&str>) -> String {
    value.map_or_else(|| "none".to_string(), str::to_lowercase)
}

/// Scan the ancestry newest first, following renames back from `file`, until
/// the commit that introduced it.
fn first_occurrence_fallback<S>(
    source: &S,
    ancestors: &[&CommitNode],
    file: &str,
) -> strata_core::Result<DateTime<Utc>>
where
    S: HistorySource + ?Sized,
{
    let mut needle = file.to_string();
    for commit in ancestors {
        let actions = source.file_actions(&commit.hash)?;
        if actions
            .iter()
            .any(|fa| fa.mode.introduces_path() && fa.path == needle)
        {
            return Ok(commit.committer_date);
        }
        let renames = resolve_renames(&actions);
        for (old, new) in renames.true_renames {
            if new == needle {
                needle = old;
            }
        }
        if renames.added_files.contains(&needle) {
            return Ok(commit.committer_date);
        }
    }
    Err(StrataError::FirstOccurrenceUnresolved {
        path: file.to_string(),
    })
}
