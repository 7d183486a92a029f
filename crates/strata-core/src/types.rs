use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit as retrieved from the history store.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use strata_core::CommitNode;
///
/// let commit = CommitNode {
///     hash: "abc123".into(),
///     parents: vec!["def456".into()],
///     author: "alice <alice@example.com>".into(),
///     committer_date: Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap(),
///     message: "fix: null check".into(),
///     fixed_issue_ids: vec![],
///     validated_bugfix: false,
/// };
/// assert!(!commit.is_merge());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitNode {
    /// Full revision hash.
    pub hash: String,
    /// Parent revision hashes, first parent first.
    #[serde(default)]
    pub parents: Vec<String>,
    /// Author identity.
    pub author: String,
    /// Committer timestamp.
    pub committer_date: DateTime<Utc>,
    /// Full commit message.
    #[serde(default)]
    pub message: String,
    /// Issues this commit is manually linked to as fixing.
    #[serde(default)]
    pub fixed_issue_ids: Vec<String>,
    /// Whether the commit carries a validated bug-fix label.
    #[serde(default)]
    pub validated_bugfix: bool,
}

impl CommitNode {
    /// A commit with two or more parents.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// How a file was touched by a commit.
///
/// # Examples
///
/// ```
/// use strata_core::FileMode;
///
/// let mode: FileMode = "R".parse().unwrap();
/// assert_eq!(mode, FileMode::Rename);
/// assert_eq!(mode.to_string(), "rename");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    /// New file.
    #[serde(alias = "A")]
    Add,
    /// Existing file modified.
    #[serde(alias = "M")]
    Modify,
    /// File removed.
    #[serde(alias = "D")]
    Delete,
    /// File moved from `old_path`.
    #[serde(alias = "R")]
    Rename,
    /// File copied from `old_path`, which keeps existing.
    #[serde(alias = "C")]
    Copy,
}

impl FileMode {
    /// Add and copy both introduce a new path.
    pub fn introduces_path(self) -> bool {
        matches!(self, FileMode::Add | FileMode::Copy)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileMode::Add => write!(f, "add"),
            FileMode::Modify => write!(f, "modify"),
            FileMode::Delete => write!(f, "delete"),
            FileMode::Rename => write!(f, "rename"),
            FileMode::Copy => write!(f, "copy"),
        }
    }
}

impl FromStr for FileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "a" | "add" => Ok(FileMode::Add),
            "m" | "modify" => Ok(FileMode::Modify),
            "d" | "delete" => Ok(FileMode::Delete),
            "r" | "rename" => Ok(FileMode::Rename),
            "c" | "copy" => Ok(FileMode::Copy),
            other => Err(format!("unknown file mode: {other}")),
        }
    }
}

/// Classification of an SZZ inducing link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SzzType {
    /// The blamed change introduced the defect.
    Inducing,
    /// The blamed change was an earlier, incomplete fix of the same issue.
    PartialFix,
    /// Blamed change made after the issue was reported.
    WeakSuspect,
    /// Blamed change made after the issue was reported and unlikely to be inducing.
    HardSuspect,
}

/// An edge from an inducing file action to the file action that fixed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InducingEdge {
    /// Id of the fixing file action.
    pub fix_action_id: String,
    /// Label of the blame run that produced the edge.
    pub label: String,
    /// Classification of the edge.
    pub szz_type: SzzType,
}

/// A single file change within a commit.
///
/// # Examples
///
/// ```
/// use strata_core::{FileAction, FileMode};
///
/// let action = FileAction {
///     id: "fa1".into(),
///     commit: "abc123".into(),
///     path: "src/B.java".into(),
///     mode: FileMode::Rename,
///     lines_added: 0,
///     lines_deleted: 0,
///     hunks: 0,
///     old_path: Some("src/A.java".into()),
///     induces: vec![],
/// };
/// assert_eq!(action.old_path.as_deref(), Some("src/A.java"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAction {
    /// Store id of this action.
    pub id: String,
    /// Revision hash of the commit.
    pub commit: String,
    /// Path of the file after the change.
    pub path: String,
    /// Kind of change.
    pub mode: FileMode,
    /// Lines added.
    #[serde(default)]
    pub lines_added: u64,
    /// Lines deleted.
    #[serde(default)]
    pub lines_deleted: u64,
    /// Diff hunks of this action.
    #[serde(default)]
    pub hunks: u64,
    /// Source path for renames and copies.
    #[serde(default)]
    pub old_path: Option<String>,
    /// Fixing actions this change was blamed for.
    #[serde(default)]
    pub induces: Vec<InducingEdge>,
}

/// An issue from the issue tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Store id.
    pub id: String,
    /// Tracker key, e.g. `IS-1`.
    pub external_id: String,
    /// Priority as reported by the tracker.
    #[serde(default)]
    pub priority: Option<String>,
    /// Issue type as reported by the tracker.
    #[serde(default)]
    pub issue_type: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A refactoring detected on a code entity in one commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refactoring {
    /// Path of the file containing the entity after the refactoring.
    pub path: String,
    /// Refactoring type, e.g. `extract_method`.
    pub kind: String,
    /// Qualified name of the refactored entity.
    pub entity: String,
}

/// Fine-grained change classification counts of one file between two commits.
pub type ChangeTypeCounts = BTreeMap<String, u64>;

/// Class-level static metric names reported by the static analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMetric {
    /// Weighted methods per class.
    Wmc,
    /// Depth of inheritance tree.
    Dit,
    /// Response set for class.
    Rfc,
    /// Number of children.
    Noc,
    /// Coupling between object classes.
    Cbo,
    /// Lack of cohesion in methods 5.
    Lcom5,
    /// Number of incoming invocations.
    Nii,
    /// Number of outgoing invocations.
    Noi,
    /// Total number of attributes.
    Tna,
    /// Total number of public attributes.
    Tnpa,
    /// Total number of local attributes.
    Tnla,
    /// Total lines of code.
    Tloc,
    /// Total number of methods.
    Tnm,
    /// Total number of local public methods.
    Tnlpm,
    /// Total number of public methods.
    Tnpm,
    /// Total number of local methods.
    Tnlm,
}

/// Static metrics tracked in the D'Ambros delta matrix.
///
/// # Examples
///
/// ```
/// use strata_core::DeltaMetric;
///
/// assert_eq!(DeltaMetric::ALL.len(), 17);
/// assert_eq!(DeltaMetric::TnaMinusTnpa.to_string(), "tna-tnpa");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeltaMetric {
    #[serde(rename = "wmc")]
    Wmc,
    #[serde(rename = "dit")]
    Dit,
    #[serde(rename = "rfc")]
    Rfc,
    #[serde(rename = "noc")]
    Noc,
    #[serde(rename = "cbo")]
    Cbo,
    #[serde(rename = "lcom5")]
    Lcom5,
    #[serde(rename = "nii")]
    Nii,
    #[serde(rename = "noi")]
    Noi,
    #[serde(rename = "tna")]
    Tna,
    #[serde(rename = "tnpa")]
    Tnpa,
    #[serde(rename = "tna-tnpa")]
    TnaMinusTnpa,
    #[serde(rename = "tna-tnla")]
    TnaMinusTnla,
    #[serde(rename = "tloc")]
    Tloc,
    #[serde(rename = "tnm")]
    Tnm,
    #[serde(rename = "tnlpm")]
    Tnlpm,
    #[serde(rename = "tnm-tnpm")]
    TnmMinusTnpm,
    #[serde(rename = "tnm-tnlm")]
    TnmMinusTnlm,
}

impl DeltaMetric {
    /// Every tracked metric, in column order.
    pub const ALL: [DeltaMetric; 17] = [
        DeltaMetric::Wmc,
        DeltaMetric::Dit,
        DeltaMetric::Rfc,
        DeltaMetric::Noc,
        DeltaMetric::Cbo,
        DeltaMetric::Lcom5,
        DeltaMetric::Nii,
        DeltaMetric::Noi,
        DeltaMetric::Tna,
        DeltaMetric::Tnpa,
        DeltaMetric::TnaMinusTnpa,
        DeltaMetric::TnaMinusTnla,
        DeltaMetric::Tloc,
        DeltaMetric::Tnm,
        DeltaMetric::Tnlpm,
        DeltaMetric::TnmMinusTnpm,
        DeltaMetric::TnmMinusTnlm,
    ];

    /// Short lowercase name used in metric keys.
    pub fn as_str(self) -> &'static str {
        match self {
            DeltaMetric::Wmc => "wmc",
            DeltaMetric::Dit => "dit",
            DeltaMetric::Rfc => "rfc",
            DeltaMetric::Noc => "noc",
            DeltaMetric::Cbo => "cbo",
            DeltaMetric::Lcom5 => "lcom5",
            DeltaMetric::Nii => "nii",
            DeltaMetric::Noi => "noi",
            DeltaMetric::Tna => "tna",
            DeltaMetric::Tnpa => "tnpa",
            DeltaMetric::TnaMinusTnpa => "tna-tnpa",
            DeltaMetric::TnaMinusTnla => "tna-tnla",
            DeltaMetric::Tloc => "tloc",
            DeltaMetric::Tnm => "tnm",
            DeltaMetric::Tnlpm => "tnlpm",
            DeltaMetric::TnmMinusTnpm => "tnm-tnpm",
            DeltaMetric::TnmMinusTnlm => "tnm-tnlm",
        }
    }

    /// Compute this metric from per-file averaged source metrics.
    ///
    /// Returns `None` when an input metric is missing.
    pub fn derive(self, averages: &BTreeMap<SourceMetric, f64>) -> Option<f64> {
        let get = |m: SourceMetric| averages.get(&m).copied();
        match self {
            DeltaMetric::Wmc => get(SourceMetric::Wmc),
            DeltaMetric::Dit => get(SourceMetric::Dit),
            DeltaMetric::Rfc => get(SourceMetric::Rfc),
            DeltaMetric::Noc => get(SourceMetric::Noc),
            DeltaMetric::Cbo => get(SourceMetric::Cbo),
            DeltaMetric::Lcom5 => get(SourceMetric::Lcom5),
            DeltaMetric::Nii => get(SourceMetric::Nii),
            DeltaMetric::Noi => get(SourceMetric::Noi),
            DeltaMetric::Tna => get(SourceMetric::Tna),
            DeltaMetric::Tnpa => get(SourceMetric::Tnpa),
            DeltaMetric::TnaMinusTnpa => Some(get(SourceMetric::Tna)? - get(SourceMetric::Tnpa)?),
            DeltaMetric::TnaMinusTnla => Some(get(SourceMetric::Tna)? - get(SourceMetric::Tnla)?),
            DeltaMetric::Tloc => get(SourceMetric::Tloc),
            DeltaMetric::Tnm => get(SourceMetric::Tnm),
            DeltaMetric::Tnlpm => get(SourceMetric::Tnlpm),
            DeltaMetric::TnmMinusTnpm => Some(get(SourceMetric::Tnm)? - get(SourceMetric::Tnpm)?),
            DeltaMetric::TnmMinusTnlm => Some(get(SourceMetric::Tnm)? - get(SourceMetric::Tnlm)?),
        }
    }
}

impl fmt::Display for DeltaMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metrics of one class at one commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMetrics {
    /// Path of the file declaring the class.
    pub path: String,
    /// Reported metric values.
    pub values: BTreeMap<SourceMetric, f64>,
}

/// Longitudinal change record of one release file.
///
/// All lists run oldest to newest and are index-aligned: entry `i` of every
/// per-change list describes the same commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeHistory {
    /// Author identity per change.
    pub authors: Vec<String>,
    /// Revision hash per change.
    pub revisions: Vec<String>,
    /// Lines added per change.
    pub lines_added: Vec<u64>,
    /// Lines deleted per change.
    pub lines_deleted: Vec<u64>,
    /// Hunks of the whole commit per change.
    pub changesets: Vec<u64>,
    /// Commit message per change.
    pub commit_messages: Vec<String>,
    /// Days since the file first occurred, per change.
    pub ages: Vec<i64>,
    /// Days before the release, per change.
    pub days_from_release: Vec<i64>,
    /// Refactoring types applied to the file.
    pub refactorings: Vec<String>,
    /// Change classification counts per commit pair.
    pub change_types: Vec<ChangeTypeCounts>,
    /// Days between first occurrence and release.
    pub age: i64,
}

impl ChangeHistory {
    /// Number of recorded changes.
    pub fn revision_count(&self) -> usize {
        self.revisions.len()
    }
}

/// A defect traced from a post-release bug fix back to a release file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugInducingLink {
    /// Canonical release path.
    pub file: String,
    /// Tracker key of the fixed issue.
    pub issue: String,
    /// Revision hash of the bug-fixing commit.
    pub bugfix_commit: String,
    /// Committer date of the bug-fixing commit.
    pub bugfix_date: DateTime<Utc>,
    /// Lowercased issue priority.
    pub severity: String,
    /// Lowercased issue type.
    pub issue_type: String,
    /// Issue creation date.
    pub issue_created_at: Option<DateTime<Utc>>,
}

/// Per-period absolute deltas of static metrics.
///
/// A cell is `None` when the file (or the metric) was missing from one or both
/// snapshots of that period.
///
/// # Examples
///
/// ```
/// use strata_core::{DeltaMatrix, DeltaMetric};
///
/// let mut deltas = DeltaMatrix::default();
/// deltas.push(DeltaMetric::Wmc, "A.java", Some(40.0));
/// deltas.push(DeltaMetric::Wmc, "A.java", None);
/// assert_eq!(deltas.series(DeltaMetric::Wmc, "A.java"), Some(&[Some(40.0), None][..]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaMatrix {
    cells: BTreeMap<DeltaMetric, BTreeMap<String, Vec<Option<f64>>>>,
}

impl DeltaMatrix {
    /// Matrix with an empty row for every metric and file.
    pub fn with_files<'a, I>(metrics: &[DeltaMetric], files: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let files: Vec<&str> = files.into_iter().collect();
        let cells = metrics
            .iter()
            .map(|m| {
                let rows = files.iter().map(|f| ((*f).to_string(), Vec::new())).collect();
                (*m, rows)
            })
            .collect();
        Self { cells }
    }

    /// Append one period's cell for `file`.
    pub fn push(&mut self, metric: DeltaMetric, file: &str, cell: Option<f64>) {
        self.cells
            .entry(metric)
            .or_default()
            .entry(file.to_string())
            .or_default()
            .push(cell);
    }

    /// Metrics present in the matrix.
    pub fn metrics(&self) -> impl Iterator<Item = DeltaMetric> + '_ {
        self.cells.keys().copied()
    }

    /// All rows of one metric.
    pub fn rows(&self, metric: DeltaMetric) -> Option<&BTreeMap<String, Vec<Option<f64>>>> {
        self.cells.get(&metric)
    }

    /// The ordered deltas of one file for one metric.
    pub fn series(&self, metric: DeltaMetric, file: &str) -> Option<&[Option<f64>]> {
        self.cells
            .get(&metric)
            .and_then(|rows| rows.get(file))
            .map(Vec::as_slice)
    }
}

/// Output format for CLI subcommands.
///
/// # Examples
///
/// ```
/// use strata_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
