//! news-curator binary entrypoint.
//! `run` executes one pipeline run and exits; `serve` exposes the HTTP trigger surface.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_curator::api::{self, AppState};
use news_curator::bootstrap::{CuratorRuntime, RunTrigger};
use news_curator::config;
use news_curator::telemetry::Telemetry;
use news_curator::RunMode;

#[derive(Parser)]
#[command(name = "news-curator", version, about = "Preference-learning news curation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once.
    Run {
        #[arg(long, value_enum, env = "CURATOR_MODE", default_value_t = RunMode::Candidate)]
        mode: RunMode,
    },
    /// Serve /health, /run and /metrics.
    Serve {
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
}

/// Compact logs by default; JSON lines with CURATOR_LOG_JSON=1.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_curator=info,warn"));
    let json = std::env::var("CURATOR_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_default().context("loading pipeline config")?;
    let utc_offset_hours = cfg.utc_offset_hours;

    match cli.command {
        Command::Run { mode } => {
            let runtime = CuratorRuntime::from_config(cfg)?;
            let message = runtime.trigger(mode, chrono::Utc::now()).await?;
            tracing::info!(mode = mode.as_str(), %message, "run finished");
            println!("{message}");
        }
        Command::Serve { port } => {
            let telemetry = Telemetry::init()?;
            let runtime = Arc::new(CuratorRuntime::from_config(cfg)?);
            let app = api::router(AppState::new(runtime, utc_offset_hours)).merge(telemetry.router());

            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            tracing::info!(%addr, "listening");
            axum::serve(listener, app).await.context("http server")?;
        }
    }
    Ok(())
}
