//! ccbridge Server
//!
//! Serves the query relay and user directory over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use ccbridge_core::config;
use ccbridge_server::api::{AppState, build_router};
use ccbridge_server::orchestrator::Orchestrator;
use ccbridge_server::session::ClaudeConnector;

#[derive(Parser, Debug)]
#[command(name = "ccbridge-server")]
#[command(version, about = "HTTP bridge to Claude Code sessions")]
struct Args {
    /// Listen address (overrides config)
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Additional JSON config file
    #[arg(long, env = "CCBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter (e.g. "info", "debug", "warn"); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "CCBRIDGE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env_file = config::load_env_file();

    let cwd = std::env::current_dir()?;
    let mut config = config::load_config(Some(&cwd), args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    if let Some(level) = args.log_level {
        config.server.log_level = level;
    }

    let level = &config.server.log_level;
    ccbridge_core::tracing_init::init_tracing(
        &format!("ccbridge_server={level},ccbridge_core={level},tower_http={level}"),
        args.log_json,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.addr,
        env_file = ?env_file,
        working_dir = %config.session.working_directory().display(),
        claude_bin = %config.session.claude_bin.display(),
        "Starting ccbridge-server"
    );
    if config.github.token.is_none() {
        warn!("GITHUB_MCP_PAT is not set; queries using the GitHub MCP server will fail");
    }

    let connector = ClaudeConnector::with_terminate_timeout(
        config.session.claude_bin.clone(),
        config.session.terminate_timeout_secs,
    );
    let addr = config.server.addr;
    let orchestrator = Orchestrator::new(Arc::new(connector), Arc::new(config));
    let app = build_router(AppState::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP server ready");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        () = sigterm => {
            info!("Received SIGTERM shutdown signal");
        }
    }
}
