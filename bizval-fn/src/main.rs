//! bizval-fn - HTTP function server
//!
//! Serves the queue functions, calculators, checkout and record CRUD over
//! the shared bizval.db. `issue-token` creates API tokens for users.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bizval_common::config::{self, TomlConfig};
use bizval_common::db::{self, settings, users};
use bizval_fn::billing::{CheckoutProvider, StripeCheckout};
use bizval_fn::{build_router, AppState, DEFAULT_MAX_BODY_BYTES};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for bizval-fn
#[derive(Parser, Debug)]
#[command(name = "bizval-fn")]
#[command(about = "Business valuation function server")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to ~/.config/bizval/config.toml)
    #[arg(short, long, env = "BIZVAL_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding bizval.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:5740
    #[arg(short, long)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Issue an API token for a user, creating the user if needed
    IssueToken {
        #[arg(long)]
        email: String,
    },
}

fn init_tracing(toml_config: &TomlConfig) {
    // RUST_LOG wins over the config file
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
        "Starting bizval-fn v{} [{}] built {} ({})",
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

    match cli.command.unwrap_or(Command::Serve) {
        Command::IssueToken { email } => {
            let (user, token) = users::issue_token(&pool, &email).await?;
            info!(user_id = %user.id, "Issued API token for {}", user.email);
            // Only chance to see the token; it is stored hashed
            println!("{}", token);
            Ok(())
        }
        Command::Serve => serve(pool, &toml_config, cli.bind.as_deref()).await,
    }
}

async fn serve(pool: sqlx::SqlitePool, toml_config: &TomlConfig, bind: Option<&str>) -> Result<()> {
    let checkout = build_checkout(toml_config);

    let max_body_bytes =
        settings::get_parsed(&pool, "http_max_body_size_bytes", DEFAULT_MAX_BODY_BYTES).await?;

    let state = AppState::new(pool, checkout);
    let app = build_router(state, max_body_bytes);

    let addr = config::resolve_bind(bind, toml_config);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("bizval-fn listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn build_checkout(toml_config: &TomlConfig) -> Option<Arc<dyn CheckoutProvider>> {
    let Some(secret_key) = config::resolve_secret(
        config::ENV_BILLING_SECRET_KEY,
        toml_config.billing.secret_key.as_deref(),
    ) else {
        warn!("No billing secret key configured; create-checkout will answer 503");
        return None;
    };

    match StripeCheckout::new(&toml_config.billing.api_base, secret_key) {
        Ok(client) => {
            info!("Checkout provider: {}", toml_config.billing.api_base);
            Some(Arc::new(client))
        }
        Err(e) => {
            error!("Checkout provider unavailable: {}", e);
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
