//! Commit history mining: change paths, rename tracking and per-file
//! change histories.
//!
//! A [`CommitGraph`] is built from the commits of a [`HistorySource`]
//! ([`MemoryHistory`] for exported stores, [`GitHistory`] for a local
//! repository). [`build_histories`] then walks the graph backwards from a
//! release and produces a [`MiningRun`] that the metric reducers consume.

mod git;
mod graph;
mod renames;
mod resolver;
mod snapshots;
mod source;

pub use git::GitHistory;
pub use graph::{traverse, CommitGraph, Direction};
pub use renames::{normalized_distance, resolve_renames, AliasTable, RenameResolution};
pub use resolver::{build_histories, tracked_files, ChangePathSummary, MiningRun};
pub use snapshots::{delta_matrix, StaticSnapshot};
pub use source::{CommitClassification, HistorySource, MemoryHistory};
