use std::path::PathBuf;

/// Errors that can occur while mining history or computing metrics.
///
/// Only fatal conditions live here. Recoverable data problems (a parent
/// commit missing from the store, two files competing for one alias) are
/// logged with `tracing` and skipped. The binary crate converts to
/// `miette::Report` at the boundary.
///
/// # Examples
///
/// ```
/// use strata_core::StrataError;
///
/// let err = StrataError::InvalidDirection("sideways".into());
/// assert!(err.to_string().contains("sideways"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum StrataError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Traversal direction other than `backward` or `forward`.
    #[error("no such direction: {0}, please use backward or forward")]
    #[diagnostic(help("valid directions are `backward` (parents) and `forward` (children)"))]
    InvalidDirection(String),

    /// A commit that the run depends on is not in the history store.
    #[error("unknown commit: {0}")]
    UnknownCommit(String),

    /// No addition event could be found for a release file.
    #[error("no first occurrence found for {path}")]
    FirstOccurrenceUnresolved {
        /// Canonical path of the release file.
        path: String,
    },

    /// The delta matrix has no row for a file the metrics were asked about.
    #[error("could not find file {file} in deltas for metric {metric}")]
    MissingDeltas {
        /// Metric column that was looked up.
        metric: String,
        /// File that had no row.
        file: String,
    },

    /// The history store returned inconsistent data.
    #[error("history store error: {0}")]
    History(String),
}
