//! Commit DAG and its breadth-first path decomposition.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef, Reversed};
use strata_core::{CommitNode, StrataError};
use tracing::warn;

/// Which way to walk the commit graph.
///
/// # Examples
///
/// ```
/// use strata_history::Direction;
///
/// let dir: Direction = "forward".parse().unwrap();
/// assert_eq!(dir, Direction::Forward);
/// assert!("sideways".parse::<Direction>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    /// Towards parents.
    #[default]
    Backward,
    /// Towards children.
    Forward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Backward => write!(f, "backward"),
            Direction::Forward => write!(f, "forward"),
        }
    }
}

impl FromStr for Direction {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backward" => Ok(Direction::Backward),
            "forward" => Ok(Direction::Forward),
            other => Err(StrataError::InvalidDirection(other.to_string())),
        }
    }
}

impl From<Direction> for petgraph::Direction {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Backward => petgraph::Direction::Incoming,
            Direction::Forward => petgraph::Direction::Outgoing,
        }
    }
}

/// Commit DAG with edges from parent to child.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use strata_core::CommitNode;
/// use strata_history::CommitGraph;
///
/// let commit = |hash: &str, parents: &[&str]| CommitNode {
///     hash: hash.into(),
///     parents: parents.iter().map(|p| p.to_string()).collect(),
///     author: "alice".into(),
///     committer_date: Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap(),
///     message: String::new(),
///     fixed_issue_ids: vec![],
///     validated_bugfix: false,
/// };
/// let graph = CommitGraph::from_commits(vec![commit("a", &[]), commit("b", &["a"])]);
/// assert!(graph.has_path("a", "b"));
/// assert!(!graph.has_path("b", "a"));
/// ```
#[derive(Debug, Default)]
pub struct CommitGraph {
    graph: DiGraph<CommitNode, ()>,
    index: HashMap<String, NodeIndex>,
}

impl CommitGraph {
    /// Build the graph from every commit of a history.
    ///
    /// All nodes are added before any edge. Edges are added per commit in
    /// parent order; a parent missing from `commits` is logged and skipped.
    pub fn from_commits<I>(commits: I) -> Self
    where
        I: IntoIterator<Item = CommitNode>,
    {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for commit in commits {
            let hash = commit.hash.clone();
            let idx = graph.add_node(commit);
            index.entry(hash).or_insert(idx);
        }

        let mut edges = Vec::new();
        for child in graph.node_indices() {
            for parent in &graph[child].parents {
                match index.get(parent) {
                    Some(&p) => edges.push((p, child)),
                    None => warn!(
                        commit = %graph[child].hash,
                        parent = %parent,
                        "parent of a commit is missing, skipping edge"
                    ),
                }
            }
        }
        for (parent, child) in edges {
            graph.add_edge(parent, child, ());
        }

        Self { graph, index }
    }

    /// Number of commits.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no commits.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Look up a commit by hash.
    pub fn commit(&self, hash: &str) -> Option<&CommitNode> {
        self.index.get(hash).map(|idx| &self.graph[*idx])
    }

    /// All commits, in insertion order.
    pub fn commits(&self) -> impl Iterator<Item = &CommitNode> {
        self.graph.node_weights()
    }

    /// Neighbors of `hash` in edge insertion order.
    pub fn neighbors(&self, hash: &str, direction: Direction) -> Vec<&str> {
        match self.index.get(hash) {
            Some(idx) => self
                .neighbor_indices(*idx, direction)
                .into_iter()
                .map(|n| self.graph[n].hash.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    fn neighbor_indices(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, direction.into())
            .map(|e| {
                let other = match direction {
                    Direction::Backward => e.source(),
                    Direction::Forward => e.target(),
                };
                (e.id(), other)
            })
            .collect();
        edges.sort_by_key(|(edge, _)| *edge);
        edges.into_iter().map(|(_, node)| node).collect()
    }

    /// Whether `to` is reachable from `from` along parent-to-child edges.
    ///
    /// Unknown commits have no path.
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(a), Some(b)) => petgraph::algo::has_path_connecting(&self.graph, *a, *b, None),
            _ => false,
        }
    }

    /// `hash` and every commit it descends from.
    pub fn ancestors(&self, hash: &str) -> HashSet<&str> {
        let mut found = HashSet::new();
        let Some(&start) = self.index.get(hash) else {
            return found;
        };
        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, start);
        while let Some(idx) = bfs.next(reversed) {
            found.insert(self.graph[idx].hash.as_str());
        }
        found
    }
}

/// Decompose the part of the graph reachable from `source` into paths.
///
/// Every reachable edge is covered exactly once. Each neighbor is appended to
/// the earliest-created path that currently ends in its parent, or starts a
/// new `[parent, neighbor]` path. When `stop` returns true for a neighbor, the
/// edge is marked as visited but the neighbor is neither added nor expanded.
///
/// # Errors
///
/// Returns [`StrataError::UnknownCommit`] if `source` is not in the graph.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use strata_core::CommitNode;
/// use strata_history::{traverse, CommitGraph, Direction};
///
/// let commit = |hash: &str, parents: &[&str]| CommitNode {
///     hash: hash.into(),
///     parents: parents.iter().map(|p| p.to_string()).collect(),
///     author: "alice".into(),
///     committer_date: Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap(),
///     message: String::new(),
///     fixed_issue_ids: vec![],
///     validated_bugfix: false,
/// };
/// // a - b - d (merge of b and c), a - c
/// let graph = CommitGraph::from_commits(vec![
///     commit("a", &[]),
///     commit("b", &["a"]),
///     commit("c", &["a"]),
///     commit("d", &["b", "c"]),
/// ]);
/// let paths = traverse(&graph, "d", Direction::Backward, |_| false).unwrap();
/// assert_eq!(paths, vec![vec!["d", "b", "a"], vec!["d", "c", "a"]]);
/// ```
pub fn traverse<F>(
    graph: &CommitGraph,
    source: &str,
    direction: Direction,
    mut stop: F,
) -> strata_core::Result<Vec<Vec<String>>>
where
    F: FnMut(&str) -> bool,
{
    let start = *graph
        .index
        .get(source)
        .ok_or_else(|| StrataError::UnknownCommit(source.to_string()))?;

    let mut paths: Vec<Vec<NodeIndex>> = vec![vec![start]];
    // path ids by the node they currently end in
    let mut tails: HashMap<NodeIndex, BTreeSet<usize>> = HashMap::from([(start, BTreeSet::from([0]))]);
    let mut visited: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    let mut expanded: HashSet<NodeIndex> = HashSet::new();
    let mut worklist = VecDeque::from([start]);

    while let Some(parent) = worklist.pop_front() {
        if !expanded.insert(parent) {
            continue;
        }
        for child in graph.neighbor_indices(parent, direction) {
            if !visited.insert((parent, child)) {
                continue;
            }
            if stop(&graph.graph[child].hash) {
                continue;
            }

            let earliest = tails
                .get_mut(&parent)
                .and_then(|ids| ids.pop_first());
            let path_id = match earliest {
                Some(id) => {
                    paths[id].push(child);
                    id
                }
                None => {
                    paths.push(vec![parent, child]);
                    paths.len() - 1
                }
            };
            tails.entry(child).or_default().insert(path_id);
            worklist.push_back(child);
        }
    }

    Ok(paths
        .into_iter()
        .map(|path| {
            path.into_iter()
                .map(|idx| graph.graph[idx].hash.clone())
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn commit(hash: &str, parents: &[&str], day: i64) -> CommitNode {
        CommitNode {
            hash: hash.into(),
            parents: parents.iter().map(|p| p.to_string()).collect(),
            author: "alice".into(),
            committer_date: Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap() + Duration::days(day),
            message: String::new(),
            fixed_issue_ids: vec![],
            validated_bugfix: false,
        }
    }

    fn diamond() -> CommitGraph {
        CommitGraph::from_commits(vec![
            commit("a", &[], 0),
            commit("b", &["a"], 1),
            commit("c", &["a"], 2),
            commit("d", &["b", "c"], 3),
            commit("e", &["d"], 4),
        ])
    }

    fn edges(paths: &[Vec<String>]) -> HashSet<(String, String)> {
        paths
            .iter()
            .flat_map(|p| p.windows(2).map(|w| (w[0].clone(), w[1].clone())))
            .collect()
    }

    #[test]
    fn direction_parses_and_rejects() {
        assert_eq!("backward".parse::<Direction>().unwrap(), Direction::Backward);
        let err = "up".parse::<Direction>().unwrap_err();
        assert!(matches!(err, StrataError::InvalidDirection(ref d) if d == "up"));
    }

    #[test]
    fn missing_parent_is_skipped() {
        let graph = CommitGraph::from_commits(vec![commit("b", &["gone"], 1)]);
        assert_eq!(graph.len(), 1);
        assert!(graph.neighbors("b", Direction::Backward).is_empty());
    }

    #[test]
    fn neighbors_keep_parent_order() {
        let graph = diamond();
        assert_eq!(graph.neighbors("d", Direction::Backward), vec!["b", "c"]);
        assert_eq!(graph.neighbors("a", Direction::Forward), vec!["b", "c"]);
    }

    #[test]
    fn backward_paths_cover_every_edge_once() {
        let graph = diamond();
        let paths = traverse(&graph, "e", Direction::Backward, |_| false).unwrap();
        assert_eq!(
            paths,
            vec![vec!["e", "d", "b", "a"], vec!["d", "c", "a"]]
        );
        let covered: usize = paths.iter().map(|p| p.len() - 1).sum();
        assert_eq!(covered, 5);
        assert_eq!(edges(&paths).len(), 5);
    }

    #[test]
    fn forward_paths_fork_at_branches() {
        let graph = diamond();
        let paths = traverse(&graph, "a", Direction::Forward, |_| false).unwrap();
        assert_eq!(paths, vec![vec!["a", "b", "d", "e"], vec!["a", "c", "d"]]);
    }

    #[test]
    fn stop_predicate_truncates_branch() {
        let graph = diamond();
        let paths = traverse(&graph, "e", Direction::Backward, |h| h == "c").unwrap();
        assert_eq!(paths, vec![vec!["e", "d", "b", "a"]]);
        assert!(!paths.iter().flatten().any(|h| h == "c"));
    }

    #[test]
    fn unknown_source_fails() {
        let err = traverse(&diamond(), "zzz", Direction::Backward, |_| false).unwrap_err();
        assert!(matches!(err, StrataError::UnknownCommit(_)));
    }

    #[test]
    fn ancestors_include_the_commit_itself() {
        let graph = diamond();
        let found = graph.ancestors("d");
        assert_eq!(found.len(), 4);
        assert!(found.contains("d"));
        assert!(!found.contains("e"));
    }

    #[test]
    fn reachability_follows_edges() {
        let graph = diamond();
        assert!(graph.has_path("c", "e"));
        assert!(!graph.has_path("c", "b"));
        assert!(!graph.has_path("c", "unknown"));
    }
}
