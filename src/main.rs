// ABOUTME: Entry point for the seeuthere web shell binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and starts the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use seeuthere_web::{AppState, ShellConfig, create_router};

#[derive(Parser, Debug)]
#[command(name = "seeuthere")]
#[command(about = "Server-rendered web shell for the seeuthere midpoint finder")]
struct Args {
    /// Socket address to listen on (overrides SEEUTHERE_BIND)
    #[arg(long)]
    bind: Option<String>,

    /// Backend API root (overrides SEEUTHERE_API_BASE_URL)
    #[arg(long)]
    api_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "seeuthere=debug,seeuthere_web=debug,tower_http=debug",
                )
            }),
        )
        .init();

    let args = Args::parse();
    let config = ShellConfig::from_env_with(args.bind, args.api_base_url)
        .context("invalid configuration")?;

    tracing::info!(
        bind = %config.bind,
        api = %config.api_base_url,
        environment = %config.environment,
        devtools = config.devtools,
        "seeuthere starting up"
    );
    if config.is_production() && config.devtools {
        tracing::warn!("query devtools are enabled in production");
    }

    let bind = config.bind;
    let state = Arc::new(AppState::from_config(config));
    spawn_visitor_reaper(Arc::clone(&state));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!(addr = %bind, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Periodically drop idle visitor entries so abandoned sessions do not
/// linger until the next add.
fn spawn_visitor_reaper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let removed = state.visitors.sweep().await;
            if removed > 0 {
                tracing::debug!(removed, "expired idle visitors");
            }
        }
    });
}
