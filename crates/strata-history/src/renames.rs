//! File identity across renames.
//!
//! Git's rename detection can report one old path renamed to several new
//! paths in a single commit. Only the new path closest to the old one by edit
//! distance is kept as the rename; the others are treated as additions.

use std::collections::{HashMap, HashSet};

use strata_core::{FileAction, FileMode};
use tracing::warn;

/// Renames of one commit split into kept renames and implied additions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameResolution {
    /// `(old_path, new_path)` pairs kept as renames.
    pub true_renames: Vec<(String, String)>,
    /// New paths of discarded candidates, counted as added files.
    pub added_files: Vec<String>,
}

/// Resolve the rename actions of one commit.
///
/// Non-rename actions and renames without an old path are ignored. Groups
/// keep the order in which their old path first appears.
///
/// # Examples
///
/// ```
/// use strata_core::{FileAction, FileMode};
/// use strata_history::resolve_renames;
///
/// let rename = |old: &str, new: &str| FileAction {
///     id: new.into(),
///     commit: "c1".into(),
///     path: new.into(),
///     mode: FileMode::Rename,
///     lines_added: 0,
///     lines_deleted: 0,
///     hunks: 0,
///     old_path: Some(old.into()),
///     induces: vec![],
/// };
/// let actions = [
///     rename("org/apache/math/A.java", "org/apache/math3/A.java"),
///     rename("org/apache/math/A.java", "org/other/Z.java"),
/// ];
/// let resolved = resolve_renames(&actions);
/// assert_eq!(resolved.true_renames[0].1, "org/apache/math3/A.java");
/// assert_eq!(resolved.added_files, vec!["org/other/Z.java"]);
/// ```
pub fn resolve_renames<'a, I>(actions: I) -> RenameResolution
where
    I: IntoIterator<Item = &'a FileAction>,
{
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for action in actions {
        if action.mode != FileMode::Rename {
            continue;
        }
        let Some(old) = action.old_path.as_deref() else {
            continue;
        };
        match groups.iter_mut().find(|(o, _)| *o == old) {
            Some((_, news)) => news.push(action.path.as_str()),
            None => groups.push((old, vec![action.path.as_str()])),
        }
    }

    let mut resolution = RenameResolution::default();
    for (old, news) in groups {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (i, new) in news.iter().enumerate() {
            let d = normalized_distance(old, new);
            if d < best_distance {
                best_distance = d;
                best = i;
            }
        }
        resolution
            .true_renames
            .push((old.to_string(), news[best].to_string()));
        for (i, new) in news.iter().enumerate() {
            if i != best && *new != news[best] {
                resolution.added_files.push(new.to_string());
            }
        }
    }
    resolution
}

/// Levenshtein distance divided by the character count of the longer string.
///
/// # Examples
///
/// ```
/// use strata_history::normalized_distance;
///
/// assert_eq!(normalized_distance("abc", "abc"), 0.0);
/// assert_eq!(normalized_distance("abcd", "abxd"), 0.25);
/// assert_eq!(normalized_distance("", ""), 0.0);
/// ```
pub fn normalized_distance(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    levenshtein(a, b) as f64 / longest as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = usize::from(ca != *cb);
            row[j + 1] = (above + 1).min(row[j] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Maps every historical path of a release file to its release path.
///
/// Release paths map to themselves. Targets are always release paths and a
/// path is never moved from one target to another.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
    release: HashSet<String>,
}

impl AliasTable {
    /// Table seeded with the release files.
    pub fn new<I, S>(release_files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let release: HashSet<String> = release_files.into_iter().map(Into::into).collect();
        let aliases = release.iter().map(|f| (f.clone(), f.clone())).collect();
        Self { aliases, release }
    }

    /// Release path that `path` denotes, if any.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        self.aliases.get(path).map(String::as_str)
    }

    /// Whether `path` denotes a release file.
    pub fn contains(&self, path: &str) -> bool {
        self.aliases.contains_key(path)
    }

    /// Whether `path` is a release path.
    pub fn is_release_file(&self, path: &str) -> bool {
        self.release.contains(path)
    }

    /// Number of known aliases, release paths included.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Record that `old` was renamed to `new` in `commit`.
    ///
    /// `old` inherits the target of `new`. If `old` already points to a
    /// different release file the rename is logged and ignored. Returns
    /// whether an alias was recorded.
    pub fn record_rename(&mut self, old: &str, new: &str, commit: &str) -> bool {
        let Some(target) = self.aliases.get(new).cloned() else {
            return false;
        };
        if let Some(existing) = self.aliases.get(old) {
            if *existing != target {
                warn!(
                    commit,
                    alias = old,
                    current = %existing,
                    rejected = %target,
                    "alias already points to another release file, skipping rename"
                );
                return false;
            }
        }
        self.aliases.insert(old.to_string(), target);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rename(old: &str, new: &str) -> FileAction {
        FileAction {
            id: format!("{old}->{new}"),
            commit: "c1".into(),
            path: new.into(),
            mode: FileMode::Rename,
            lines_added: 0,
            lines_deleted: 0,
            hunks: 0,
            old_path: Some(old.into()),
            induces: vec![],
        }
    }

    #[test]
    fn single_target_is_a_true_rename() {
        let resolved = resolve_renames(&[rename("A.java", "B.java")]);
        assert_eq!(
            resolved.true_renames,
            vec![("A.java".to_string(), "B.java".to_string())]
        );
        assert!(resolved.added_files.is_empty());
    }

    #[test]
    fn closest_candidate_wins_and_rest_are_added() {
        let resolved = resolve_renames(&[
            rename("src/A.java", "test/Other.java"),
            rename("src/A.java", "src/A2.java"),
            rename("lib/X.java", "lib/Y.java"),
        ]);
        assert_eq!(resolved.true_renames.len(), 2);
        assert_eq!(resolved.true_renames[0].1, "src/A2.java");
        assert_eq!(resolved.true_renames[1].1, "lib/Y.java");
        assert_eq!(resolved.added_files, vec!["test/Other.java"]);
    }

    #[test]
    fn ties_resolve_to_first_candidate() {
        let resolved = resolve_renames(&[rename("a/X.java", "b/X.java"), rename("a/X.java", "c/X.java")]);
        assert_eq!(resolved.true_renames[0].1, "b/X.java");
        assert_eq!(resolved.added_files, vec!["c/X.java"]);
    }

    #[test]
    fn other_modes_are_ignored() {
        let mut modify = rename("A.java", "A.java");
        modify.mode = FileMode::Modify;
        assert_eq!(resolve_renames(&[modify]), RenameResolution::default());
    }

    #[test]
    fn levenshtein_counts_edits() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
        assert_eq!(normalized_distance("kitten", "sitting"), 3.0 / 7.0);
    }

    #[test]
    fn chained_renames_reach_release_file() {
        let mut aliases = AliasTable::new(["B/B.java"]);
        assert!(aliases.record_rename("C/C.java", "B/B.java", "h3"));
        assert!(aliases.record_rename("D/D.java", "C/C.java", "h2"));
        assert_eq!(aliases.resolve("D/D.java"), Some("B/B.java"));
        assert!(aliases.is_release_file("B/B.java"));
        assert!(!aliases.is_release_file("D/D.java"));
    }

    #[test]
    fn unrelated_rename_is_not_recorded() {
        let mut aliases = AliasTable::new(["A.java"]);
        assert!(!aliases.record_rename("X.java", "Y.java", "h1"));
        assert!(!aliases.contains("X.java"));
    }

    #[test]
    fn conflicting_alias_keeps_prior_target() {
        let mut aliases = AliasTable::new(["A.java", "B.java"]);
        assert!(!aliases.record_rename("A.java", "B.java", "h1"));
        assert_eq!(aliases.resolve("A.java"), Some("A.java"));
        assert_eq!(aliases.len(), 2);
    }
}
