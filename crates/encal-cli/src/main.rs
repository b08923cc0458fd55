//! encal - calibration database and replay operator tool
//!
//! Subcommands cover the two operator workflows: maintaining stored
//! calibration graphs / querying run metadata, and launching or killing
//! batch replays against the external analyzer executable.

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use encal_db::{DbClient, DbConnectionBuilder, PromptCredentials};
use encal_replay::{
    octet_batch, source_batch, xenon_map_batch, xenon_sim_batch, BatchExecutor, JobBatch,
    ParallelExecutor,
};

use crate::config::StoreConfig;

#[derive(Parser)]
#[command(name = "encal", about = "Calibration database and replay operator tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store, fetch and delete calibration graphs
    #[command(subcommand)]
    Graph(GraphCommand),

    /// Query run metadata
    #[command(subcommand)]
    Runs(RunsCommand),

    /// Launch or kill batch replays
    #[command(subcommand)]
    Replay(ReplayCommand),
}

#[derive(Subcommand)]
enum GraphCommand {
    /// Print all points of a graph
    Get {
        graph_id: i64,
        /// Emit points as JSON instead of tab-separated rows
        #[arg(long)]
        json: bool,
    },
    /// Upload a graph from a whitespace-separated points file
    Upload {
        description: String,
        /// File with one point per line: `x x_err y y_err` or `x y`
        #[arg(long)]
        points_file: PathBuf,
    },
    /// Delete a graph and its points
    Delete { graph_id: i64 },
}

#[derive(Subcommand)]
enum RunsCommand {
    /// List run numbers of the given type(s) within a range
    List {
        /// Run type, repeatable (e.g. --type Asymmetry --type Background)
        #[arg(long = "type", required = true)]
        types: Vec<String>,
        #[arg(long, default_value_t = 0)]
        rmin: i32,
        #[arg(long, default_value_t = 1_000_000)]
        rmax: i32,
    },
    /// Print the start time of one run
    StartTime { run_number: i32 },
    /// List GMS run numbers, optionally with their start times
    Gms {
        #[arg(long)]
        times: bool,
    },
}

#[derive(Args)]
struct ReplayOpts {
    /// Path of the analyzer executable, as invoked from the work dir
    #[arg(long)]
    analyzer: String,

    /// Working directory the analyzer runs in
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,
}

#[derive(Args)]
struct RunRange {
    #[arg(long, default_value_t = 0)]
    rmin: i32,
    #[arg(long, default_value_t = 100_000)]
    rmax: i32,
}

#[derive(Subcommand)]
enum ReplayCommand {
    /// Replay octet data
    Octets(ReplayOpts),
    /// Re-simulate octets
    Simocts(ReplayOpts),
    /// Replay source calibration runs
    Sources {
        #[command(flatten)]
        opts: ReplayOpts,
        /// Source run group, repeatable (e.g. --group 21300-21328)
        #[arg(long = "group", required = true, value_parser = parse_group)]
        groups: Vec<(i32, i32)>,
        #[command(flatten)]
        range: RunRange,
    },
    /// Generate the xenon position map
    Xenon {
        #[command(flatten)]
        opts: ReplayOpts,
        #[command(flatten)]
        range: RunRange,
    },
    /// Simulate xenon position-map runs
    Xesim {
        #[command(flatten)]
        opts: ReplayOpts,
        #[command(flatten)]
        range: RunRange,
    },
    /// Kill running replays
    Kill(ReplayOpts),
}

fn parse_group(s: &str) -> Result<(i32, i32), String> {
    let (first, last) = s
        .split_once('-')
        .ok_or_else(|| format!("expected FIRST-LAST, got `{}`", s))?;
    let first: i32 = first.trim().parse().map_err(|_| format!("bad run number `{}`", first))?;
    let last: i32 = last.trim().parse().map_err(|_| format!("bad run number `{}`", last))?;
    if last < first {
        return Err(format!("group ends before it starts: {}-{}", first, last));
    }
    Ok((first, last))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Graph(cmd) => run_graph(cmd).await,
        Commands::Runs(cmd) => run_runs(cmd).await,
        Commands::Replay(cmd) => run_replay(cmd).await,
    }
}

/// Open the calibration store from environment configuration, prompting
/// for a password only when none is configured
async fn open_store() -> Result<DbClient> {
    let cfg = StoreConfig::from_env()?;

    let mut builder = DbConnectionBuilder::new(&cfg.database)
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.username);
    if let Some(password) = &cfg.password {
        builder = builder.password(password);
    }

    DbClient::connect(builder, &PromptCredentials)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to database {} on {}",
                cfg.database, cfg.host
            )
        })
}

async fn run_graph(cmd: GraphCommand) -> Result<()> {
    let db = open_store().await?;

    match cmd {
        GraphCommand::Get { graph_id, json } => {
            let points = db.get_graph(graph_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&points)?);
            } else {
                for p in &points {
                    println!(
                        "{}\t{}\t{}\t{}",
                        p.x_value,
                        fmt_opt(p.x_error),
                        p.y_value,
                        fmt_opt(p.y_error)
                    );
                }
            }
        }
        GraphCommand::Upload {
            description,
            points_file,
        } => {
            let points = read_points(&points_file)?;
            let graph_id = db.upload_graph(&description, &points).await?;
            info!(graph_id, points = points.len(), "uploaded graph");
            println!("{}", graph_id);
        }
        GraphCommand::Delete { graph_id } => {
            db.delete_graph(graph_id).await?;
            info!(graph_id, "deleted graph");
        }
    }

    Ok(())
}

async fn run_runs(cmd: RunsCommand) -> Result<()> {
    let db = open_store().await?;

    match cmd {
        RunsCommand::List { types, rmin, rmax } => {
            for run in db.get_run_type(&types, rmin, rmax).await? {
                println!("{}", run);
            }
        }
        RunsCommand::StartTime { run_number } => {
            let ts = db
                .get_run_start_time(run_number)
                .await
                .with_context(|| format!("No start time for run {}", run_number))?;
            let utc = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| "out of range".to_string());
            println!("{}\t{}", ts, utc);
        }
        RunsCommand::Gms { times } => {
            if times {
                for pair in db.get_gms_run_times().await? {
                    println!("{}\t{}", pair.run_number, pair.start_time);
                }
            } else {
                for run in db.get_gms_runs().await? {
                    println!("{}", run);
                }
            }
        }
    }

    Ok(())
}

async fn run_replay(cmd: ReplayCommand) -> Result<()> {
    let (opts, batch) = match cmd {
        ReplayCommand::Octets(opts) => {
            let batch = octet_batch(&opts.analyzer, false);
            (opts, batch)
        }
        ReplayCommand::Simocts(opts) => {
            let batch = octet_batch(&opts.analyzer, true);
            (opts, batch)
        }
        ReplayCommand::Sources {
            opts,
            groups,
            range,
        } => {
            let batch = source_batch(&opts.analyzer, &groups, range.rmin, range.rmax);
            (opts, batch)
        }
        ReplayCommand::Xenon { opts, range } => {
            let batch = xenon_map_batch(&opts.analyzer, range.rmin, range.rmax);
            (opts, batch)
        }
        ReplayCommand::Xesim { opts, range } => {
            let batch = xenon_sim_batch(&opts.analyzer, range.rmin, range.rmax);
            (opts, batch)
        }
        ReplayCommand::Kill(opts) => {
            let executor = ParallelExecutor::new(&opts.work_dir);
            executor
                .kill(analyzer_name(&opts.analyzer))
                .await
                .context("Failed to kill running replays")?;
            return Ok(());
        }
    };

    execute_batch(&opts, batch).await
}

async fn execute_batch(opts: &ReplayOpts, batch: JobBatch) -> Result<()> {
    let executor = ParallelExecutor::new(&opts.work_dir);
    executor
        .run(&batch)
        .await
        .with_context(|| format!("Replay batch `{}` failed", batch.name))?;
    Ok(())
}

/// Process name used for killall, stripped of any leading path
fn analyzer_name(analyzer: &str) -> &str {
    Path::new(analyzer)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(analyzer)
}

/// Read one point per line, columns whitespace-separated; blank lines and
/// `#` comments are skipped
fn read_points(path: &Path) -> Result<Vec<Vec<f64>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read points file {}", path.display()))?;

    let mut points = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<f64>()
                    .with_context(|| format!("Bad number `{}` on line {}", token, lineno + 1))
            })
            .collect::<Result<Vec<f64>>>()?;
        points.push(row);
    }
    Ok(points)
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "NULL".to_string(), |v| v.to_string())
}
