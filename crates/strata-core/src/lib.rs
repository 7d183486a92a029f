//! Core types, configuration, and error handling for Strata.
//!
//! This crate provides the shared foundation used by the other Strata crates:
//! - [`StrataError`]: unified error type using `thiserror`
//! - [`StrataConfig`]: configuration loaded from `.strata.toml`
//! - History model: [`CommitNode`], [`FileAction`], [`Issue`], [`Refactoring`]
//! - Mining results: [`ChangeHistory`], [`BugInducingLink`], [`DeltaMatrix`]

mod config;
mod error;
mod types;

pub use config::{DambrosConfig, FilesConfig, HassanConfig, MiningConfig, StrataConfig};
pub use error::StrataError;
pub use types::{
    BugInducingLink, ChangeHistory, ChangeTypeCounts, ClassMetrics, CommitNode, DeltaMatrix,
    DeltaMetric, FileAction, FileMode, InducingEdge, Issue, OutputFormat, Refactoring,
    SourceMetric, SzzType,
};

/// A convenience `Result` type for Strata operations.
pub type Result<T> = std::result::Result<T, StrataError>;
