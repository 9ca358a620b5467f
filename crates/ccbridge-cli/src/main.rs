//! ccbridge CLI
//!
//! Sends one query to a Claude Code session and streams the rendered
//! response blocks to stdout. Logs go to stderr.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use ccbridge_cli::headless::{self, HeadlessOverrides};
use ccbridge_core::config;
use ccbridge_server::orchestrator::Orchestrator;
use ccbridge_server::session::ClaudeConnector;

#[derive(Parser, Debug)]
#[command(name = "ccbridge")]
#[command(version, about = "Run one Claude Code query headlessly", long_about = None)]
struct Cli {
    /// Query to send
    query: String,

    /// Working directory for the session
    #[arg(short = 'd', long)]
    cwd: Option<PathBuf>,

    /// Maximum agent turns (1-50)
    #[arg(long)]
    max_turns: Option<u32>,

    /// Additional JSON config file
    #[arg(long, env = "CCBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter for stderr output
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "CCBRIDGE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = &cli.log_level;
    ccbridge_core::tracing_init::init_tracing(
        &format!("ccbridge={level},ccbridge_cli={level},ccbridge_server={level},ccbridge_core={level}"),
        cli.log_json,
    );
    config::load_env_file();

    let project_dir = match &cli.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let mut config = config::load_config(Some(&project_dir), cli.config.as_deref())?;
    HeadlessOverrides {
        cwd: cli.cwd.clone(),
        max_turns: cli.max_turns,
    }
    .apply(&mut config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        working_dir = %config.session.working_directory().display(),
        max_turns = config.session.max_turns,
        "Starting ccbridge"
    );

    let connector = ClaudeConnector::with_terminate_timeout(
        config.session.claude_bin.clone(),
        config.session.terminate_timeout_secs,
    );
    let orchestrator = Orchestrator::new(Arc::new(connector), Arc::new(config));

    if let Err(e) = headless::run(&orchestrator, &cli.query, io::stdout()).await {
        error!(error = %e, "Query failed");
        return Err(e.into());
    }
    Ok(())
}
