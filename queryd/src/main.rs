//! Thin binary entry point that delegates to the `queryd-core` pipeline.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use queryd_core::{Query, Router, RouterConfig};

mod analytics;

#[derive(Parser, Debug)]
#[command(name = "queryd", version, about = "Cost-aware query-routing CLI")]
struct Cli {
    /// Workspace root to route queries against. Defaults to the current directory.
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Positional query text, used when no subcommand is given.
    #[arg(trailing_var_arg = true)]
    text: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Route a single query through the pipeline (the default path).
    Query {
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Vector-index administration. The index itself is an external
    /// collaborator; this surfaces whatever the configured `VectorDb` reports.
    Maintenance {
        #[command(subcommand)]
        action: MaintenanceAction,
    },
    /// Per-query analytics capture (spec §6 `validate` subcommand).
    Validate {
        #[command(subcommand)]
        action: ValidateAction,
    },
}

#[derive(Subcommand, Debug)]
enum MaintenanceAction {
    Stats,
    Optimize,
    Compact,
    Cleanup,
}

#[derive(Subcommand, Debug)]
enum ValidateAction {
    Start,
    Report,
    Search { term: String },
}

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("⚠️ failed to start queryd runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("⚠️ {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let workspace = match cli.workspace.clone() {
        Some(path) => path,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };

    let config_path = workspace.join("queryd.toml");
    let config = RouterConfig::load(Some(&config_path)).context("failed to load queryd.toml")?;
    let validation_mode = config.validation_mode;

    let logger = Arc::new(queryd_core::capabilities::TracingLogger);
    let router = Router::with_workspace(
        config,
        None,
        Vec::new(),
        logger,
        Arc::new(queryd_commons::StaticWorkspacePaths::new(workspace.clone())),
    );

    match cli.command {
        Some(Commands::Query { text }) => run_query(&router, &workspace, &text, validation_mode).await,
        Some(Commands::Maintenance { action }) => run_maintenance(&router, action),
        Some(Commands::Validate { action }) => run_validate(&workspace, action),
        None => run_query(&router, &workspace, &cli.text, validation_mode).await,
    }
}

async fn run_query(router: &Router, workspace: &PathBuf, words: &[String], validation_mode: bool) -> Result<()> {
    let text = words.join(" ");
    if text.trim().is_empty() {
        anyhow::bail!("usage: queryd <text> | queryd query <text>");
    }

    let query = Query::new(format!("cli-{}", std::process::id()), text, workspace.clone());
    let started = std::time::Instant::now();
    let response = router.process_query(query.clone()).await;
    let elapsed = started.elapsed();

    if validation_mode {
        analytics::record_query(workspace, &query, &response, elapsed)
            .context("failed to append analytics record")?;
    }

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_maintenance(router: &Router, action: MaintenanceAction) -> Result<()> {
    match action {
        MaintenanceAction::Stats => {
            let metrics = router.metrics();
            let cache_stats = router.cache_stats(std::time::Duration::from_secs(300));
            println!(
                "queries={} success_rate={:.2} cumulative_cost={:.4} cache_total={} cache_valid={}",
                metrics.query_count,
                metrics.success_rate,
                metrics.cumulative_cost,
                cache_stats.total,
                cache_stats.valid
            );
        }
        MaintenanceAction::Optimize | MaintenanceAction::Compact | MaintenanceAction::Cleanup => {
            println!("no vector index is configured; nothing to do");
        }
    }
    Ok(())
}

fn run_validate(workspace: &PathBuf, action: ValidateAction) -> Result<()> {
    match action {
        ValidateAction::Start => {
            analytics::ensure_analytics_dir(workspace)?;
            println!("validation mode recording to {}", analytics::analytics_dir(workspace).display());
        }
        ValidateAction::Report => {
            let report = analytics::build_report(workspace)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ValidateAction::Search { term } => {
            for line in analytics::search(workspace, &term)? {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
