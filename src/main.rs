use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use strata_core::{BugInducingLink, DeltaMetric, OutputFormat, StrataConfig};
use strata_history::{
    build_histories, traverse, tracked_files, ChangePathSummary, CommitGraph, Direction,
    GitHistory, HistorySource, MemoryHistory,
};
use strata_metrics::{aggregation, dambros, hassan, moser, DambrosMetrics, HassanMetrics, MoserMetrics};

#[derive(Parser)]
#[command(
    name = "strata",
    version,
    about = "Software evolution metrics mined from commit history",
    long_about = "Strata walks the commit history behind a release and turns it into per-file\n\
                   change histories, bug-inducing links and evolution metrics (Hassan\n\
                   complexity of change, Moser process metrics, D'Ambros churn and entropy).\n\n\
                   Examples:\n  \
                     strata metrics --repo . --release v1.0      Metrics for a tagged release\n  \
                     strata metrics --history store.json --release abc123\n  \
                     strata paths --repo . --from HEAD           Decompose the history into paths\n  \
                     strata aggregate 2 10 3                     Inequality measures of a list\n  \
                     strata init                                 Create a .strata.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .strata.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable tables and summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Log progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Mine change histories for a release and compute metrics
    #[command(long_about = "Mine change histories for a release and compute metrics.\n\n\
        Walks every ancestor of the release to resolve renames and first occurrences,\n\
        then the commits inside the change window to collect per-file histories.\n\
        Bug-inducing links need issue data and are only available with --history.\n\n\
        Examples:\n  strata metrics --repo . --release v2.1\n  strata metrics --history export.json --release 4f2a9c --format json")]
    Metrics {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Release revision (hash, tag or branch)
        #[arg(long)]
        release: String,

        /// Read the history from an exported JSON store instead of git
        #[arg(long)]
        history: Option<PathBuf>,

        /// Maximum files to show in text and markdown output (default: all)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Decompose the commit graph into paths
    #[command(long_about = "Decompose the commit graph into paths.\n\n\
        Starting from one commit, every reachable edge is covered by exactly one path.\n\n\
        Examples:\n  strata paths --repo . --from HEAD\n  strata paths --repo . --from v1.0 --direction forward")]
    Paths {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Start revision
        #[arg(long)]
        from: String,

        /// backward (towards parents) or forward (towards children)
        #[arg(long, default_value = "backward")]
        direction: String,

        /// Read the history from an exported JSON store instead of git
        #[arg(long)]
        history: Option<PathBuf>,
    },
    /// Compute dispersion and inequality measures of a list of numbers
    Aggregate {
        /// Values to aggregate
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },
    /// Create a default .strata.toml configuration file
    #[command(long_about = "Create a default .strata.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .strata.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mstrata\x1b[0m v{version}, evolution metrics from commit history\n");
        println!("Quick start:");
        println!("  \x1b[36mstrata init\x1b[0m                           Create a .strata.toml config file");
        println!("  \x1b[36mstrata metrics --repo . --release v1\x1b[0m  Metrics for a release\n");
        println!("All commands:");
        println!("  \x1b[32mmetrics\x1b[0m    Change histories, bug links and metrics for a release");
        println!("  \x1b[32mpaths\x1b[0m      Path decomposition of the commit graph");
        println!("  \x1b[32maggregate\x1b[0m  Dispersion and inequality of a list of numbers");
        println!("  \x1b[32minit\x1b[0m       Create default configuration\n");
    } else {
        println!("strata v{version}, evolution metrics from commit history\n");
        println!("Quick start:");
        println!("  strata init                           Create a .strata.toml config file");
        println!("  strata metrics --repo . --release v1  Metrics for a release\n");
        println!("All commands:");
        println!("  metrics    Change histories, bug links and metrics for a release");
        println!("  paths      Path decomposition of the commit graph");
        println!("  aggregate  Dispersion and inequality of a list of numbers");
        println!("  init       Create default configuration\n");
    }

    println!("Run 'strata <command> --help' for details.");
}

const DEFAULT_CONFIG: &str = r#"# Strata Configuration

[mining]
# Months before the release that bound the change window
# change_window_months = 6
# Minimum days between two static-metric snapshots
# snapshot_window_days = 14
# SZZ label of the inducing links to follow
# inducing_label = "JLMIV++"

[files]
# extensions = ["java"]
# Skip test sources
# production_only = true

[hassan]
# window_days = 14
# phi1 = 1.0
# phi2 = 1.0
# phi3 = 1.0

[dambros]
# alpha = 0.01
# phi1 = 1.0
# phi2 = 1.0
# phi3 = 1.0
"#;

/// History source and the full hash of the requested revision.
fn open_history(
    repo: &Path,
    history: Option<&Path>,
    revision: &str,
    config: &StrataConfig,
) -> Result<(Box<dyn HistorySource>, String)> {
    if let Some(path) = history {
        let store = MemoryHistory::from_file(path)?;
        return Ok((Box::new(store), revision.to_string()));
    }

    if git2::Repository::discover(repo).is_err() {
        miette::bail!(miette::miette!(
            help = "Run strata from inside a git repository, pass --repo, or load an export with --history",
            "Not a git repository: {}",
            repo.display()
        ));
    }
    let git = GitHistory::open(repo, config.files.clone())?;
    let hash = git.resolve_revision(revision)?;
    Ok((Box::new(git), hash))
}

fn spinner(message: &'static str) -> Result<Option<indicatif::ProgressBar>> {
    if !std::io::stderr().is_terminal() {
        return Ok(None);
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .into_diagnostic()?,
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Ok(Some(pb))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileReport<'a> {
    path: &'a str,
    first_occurrence: Option<DateTime<Utc>>,
    revisions: usize,
    moser: &'a MoserMetrics,
    hassan: &'a HassanMetrics,
    dambros: &'a BTreeMap<DeltaMetric, DambrosMetrics>,
    bug_links: &'a [BugInducingLink],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricsReport<'a> {
    summary: &'a ChangePathSummary,
    files: Vec<FileReport<'a>>,
}

fn print_metrics(report: &MetricsReport<'_>, format: OutputFormat, limit: usize) -> Result<()> {
    let summary = report.summary;
    let linked = report.files.iter().filter(|f| !f.bug_links.is_empty()).count();
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Release {}\n", short(&summary.release));
            println!(
                "**Released:** {} | **Window from:** {} | **Commits in window:** {} | **Files:** {} | **Files with bugs:** {}\n",
                summary.release_date.format("%Y-%m-%d"),
                summary.cutoff.format("%Y-%m-%d"),
                summary.commits.len(),
                report.files.len(),
                linked,
            );
            println!("| File | Revisions | Authors | Churn | Age | HCM | WHCM | Bugs |");
            println!("|------|-----------|---------|-------|-----|-----|------|------|");
            for f in report.files.iter().take(limit) {
                println!(
                    "| `{}` | {} | {} | {} | {} | {:.4} | {:.4} | {} |",
                    f.path,
                    f.revisions,
                    f.moser.authors,
                    f.moser.sum_code_churn,
                    f.moser.age,
                    f.hassan.hcm,
                    f.hassan.whcm,
                    f.bug_links.len(),
                );
            }
        }
        OutputFormat::Text => {
            println!(
                "Release {} ({}), change window from {}: {} commits",
                short(&summary.release),
                summary.release_date.format("%Y-%m-%d"),
                summary.cutoff.format("%Y-%m-%d"),
                summary.commits.len(),
            );
            println!("{} files, {} with bug-inducing links\n", report.files.len(), linked);
            println!(
                "  {:<50} {:>5} {:>7} {:>7} {:>5} {:>8} {:>8} {:>4}",
                "File", "Revs", "Authors", "Churn", "Age", "HCM", "WHCM", "Bugs"
            );
            for f in report.files.iter().take(limit) {
                println!(
                    "  {:<50} {:>5} {:>7} {:>7} {:>5} {:>8.4} {:>8.4} {:>4}",
                    f.path,
                    f.revisions,
                    f.moser.authors,
                    f.moser.sum_code_churn,
                    f.moser.age,
                    f.hassan.hcm,
                    f.hassan.whcm,
                    f.bug_links.len(),
                );
            }
        }
    }
    Ok(())
}

/// First eight characters of a revision.
fn short(hash: &str) -> &str {
    match hash.char_indices().nth(8) {
        Some((end, _)) => &hash[..end],
        None => hash,
    }
}

fn print_aggregates(values: &[f64], format: OutputFormat) -> Result<()> {
    let results = [
        ("median", aggregation::median(values)),
        ("stddev", aggregation::stddev(values)),
        ("cov", aggregation::cov(values)),
        ("gini", aggregation::gini(values)),
        ("hoover", aggregation::hoover(values)),
        ("atkinson", aggregation::atkinson(values)),
        ("shannonEntropy", aggregation::shannon_entropy(values)),
        ("generalizedEntropy", aggregation::generalized_entropy(values)),
        ("theil", aggregation::theil(values)),
    ];
    match format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = results
                .iter()
                .map(|(name, v)| ((*name).to_string(), serde_json::Value::from(*v)))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::Value::Object(map)).into_diagnostic()?
            );
        }
        OutputFormat::Markdown => {
            println!("| Measure | Value |");
            println!("|---------|-------|");
            for (name, v) in results {
                println!("| {name} | {v} |");
            }
        }
        OutputFormat::Text => {
            for (name, v) in results {
                println!("{name:<20} {v}");
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = match &cli.config {
        Some(path) => StrataConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".strata.toml");
            if default_path.exists() {
                StrataConfig::from_file(default_path)?
            } else {
                StrataConfig::default()
            }
        }
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
        }
        Some(Command::Metrics {
            ref repo,
            ref release,
            ref history,
            limit,
        }) => {
            let (source, release) = open_history(repo, history.as_deref(), release, &config)?;
            let pb = spinner("Mining change histories...")?;

            let mined = (|| -> strata_core::Result<_> {
                let graph = CommitGraph::from_commits(source.commits()?);
                let files = tracked_files(source.as_ref(), &release, &config.files)?;
                let mined = build_histories(&graph, &release, &files, source.as_ref(), &config.mining)?;
                Ok((files, mined))
            })();
            let (files, mined) = match mined {
                Ok(ok) => ok,
                Err(e) => {
                    if let Some(pb) = &pb {
                        pb.finish_with_message("Failed");
                    }
                    return Err(e.into());
                }
            };
            if let Some(pb) = pb {
                pb.finish_with_message("Done");
            }
            tracing::info!(
                files = files.len(),
                commits = mined.summary.commits.len(),
                "mined change histories"
            );

            let moser = moser(&mined.histories);
            let hassan = hassan(&mined.histories, &config.hassan);
            let dambros = dambros(files.iter().map(String::as_str), &mined.deltas, &config.dambros)?;

            let mut reports = Vec::new();
            for (path, history) in &mined.histories {
                let (Some(m), Some(h), Some(d)) =
                    (moser.get(path), hassan.get(path), dambros.get(path))
                else {
                    continue;
                };
                reports.push(FileReport {
                    path,
                    first_occurrence: mined.first_occurrences.get(path).copied(),
                    revisions: history.revision_count(),
                    moser: m,
                    hassan: h,
                    dambros: d,
                    bug_links: mined.bug_links.get(path).map(Vec::as_slice).unwrap_or_default(),
                });
            }
            let report = MetricsReport {
                summary: &mined.summary,
                files: reports,
            };
            print_metrics(&report, cli.format, limit.unwrap_or(usize::MAX))?;
        }
        Some(Command::Paths {
            ref repo,
            ref from,
            ref direction,
            ref history,
        }) => {
            let direction: Direction = direction.parse()?;
            let (source, from) = open_history(repo, history.as_deref(), from, &config)?;
            let graph = CommitGraph::from_commits(source.commits()?);
            let paths = traverse(&graph, &from, direction, |_| false)?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&paths).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("# Paths {direction} from {}\n", short(&from));
                    for (i, path) in paths.iter().enumerate() {
                        let nodes: Vec<String> = path.iter().map(|h| format!("`{}`", short(h))).collect();
                        println!("{}. {}", i + 1, nodes.join(" → "));
                    }
                }
                OutputFormat::Text => {
                    println!("{} paths {direction} from {}", paths.len(), short(&from));
                    for (i, path) in paths.iter().enumerate() {
                        let nodes: Vec<&str> = path.iter().map(|h| short(h)).collect();
                        println!("  {:>4}: {}", i + 1, nodes.join(" -> "));
                    }
                }
            }
        }
        Some(Command::Aggregate { ref values }) => {
            print_aggregates(values, cli.format)?;
        }
        Some(Command::Init) => {
            let path = Path::new(".strata.toml");
            if path.exists() {
                miette::bail!(".strata.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .strata.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "strata", &mut std::io::stdout());
        }
    }

    Ok(())
}
