//! bizval-worker - analysis queue consumer
//!
//! Runs next to bizval-fn against the same bizval.db. Several workers may
//! run at once; queue leasing keeps them from picking up the same job.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bizval_common::config::{self, TomlConfig};
use bizval_common::db::{self, settings};
use bizval_worker::{LlmAnalyzer, Runner, WorkerSettings};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for bizval-worker
#[derive(Parser, Debug)]
#[command(name = "bizval-worker")]
#[command(about = "Business valuation analysis worker")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to ~/.config/bizval/config.toml)
    #[arg(short, long, env = "BIZVAL_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding bizval.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Process one batch per queue and exit
    #[arg(long)]
    once: bool,
}

fn init_tracing(toml_config: &TomlConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml_config =
        config::load_toml_config(cli.config.as_deref()).context("Failed to load config")?;
    init_tracing(&toml_config);

    info!(
        "Starting bizval-worker v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = config::resolve_root_folder(cli.root_folder.as_deref(), &toml_config);
    let db_path = config::prepare_root_folder(&root_folder)
        .with_context(|| format!("Failed to prepare root folder {}", root_folder.display()))?;
    info!("Database: {}", db_path.display());

    let pool = db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let api_key = config::resolve_secret(config::ENV_LLM_API_KEY, toml_config.llm.api_key.as_deref())
        .with_context(|| {
            format!(
                "No model API key configured; set {} or [llm] api_key",
                config::ENV_LLM_API_KEY
            )
        })?;

    let requests_per_minute: u32 = settings::get_parsed(&pool, "llm_requests_per_minute", 30).await?;
    let analyzer = LlmAnalyzer::new(
        &toml_config.llm.api_url,
        api_key,
        toml_config.llm.model.clone(),
        toml_config.llm.timeout_secs,
        requests_per_minute,
    )?;
    info!(
        "Model: {} at {} ({} requests/min)",
        toml_config.llm.model, toml_config.llm.api_url, requests_per_minute
    );

    let runner = Runner::new(pool.clone(), Arc::new(analyzer));
    let cancel = CancellationToken::new();

    if cli.once {
        let settings = WorkerSettings::load(&pool).await?;
        let stats = runner.run_once(&settings, &cancel).await;
        info!(
            completed = stats.completed,
            failed = stats.failed,
            retried = stats.retried,
            discarded = stats.discarded,
            errors = stats.errors,
            "Single pass finished"
        );
        return Ok(());
    }

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, finishing current job");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    runner.run(cancel).await;
    Ok(())
}
