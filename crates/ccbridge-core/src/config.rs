//! Configuration resolution for ccbridge.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/ccbridge/settings.json)
//! 3. Project config (.ccbridge/settings.json)
//! 4. Explicit config file (`--config`)
//! 5. Environment variables (a `.env` file is loaded first)
//! 6. CLI arguments (highest priority, applied by the binaries)
//!
//! Files are deep-merged as JSON before deserialization, so a file only
//! needs the keys it overrides.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Upper bound for any configured turn budget.
pub const MAX_TURNS_LIMIT: u32 = 50;

/// Default remote endpoint of the GitHub MCP server.
pub const GITHUB_MCP_URL: &str = "https://api.githubcopilot.com/mcp/";

/// Complete ccbridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub github: GithubSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub log_level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            log_level: "info".to_string(),
        }
    }
}

/// How the assistant handles tool permission prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    Plan,
    /// Never prompt; every allowed tool runs without confirmation.
    #[default]
    BypassPermissions,
}

impl PermissionMode {
    /// Value passed to `--permission-mode`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}

impl std::str::FromStr for PermissionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(Self::Default),
            "acceptEdits" => Ok(Self::AcceptEdits),
            "plan" => Ok(Self::Plan),
            "bypassPermissions" => Ok(Self::BypassPermissions),
            other => Err(Error::Config(format!("Unknown permission mode: {other}"))),
        }
    }
}

/// Assistant session settings shared by every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub system_prompt: String,
    pub allowed_tools: Vec<String>,
    /// Turn budget for synchronous queries.
    pub max_turns: u32,
    /// Turn budget for background queries.
    pub background_max_turns: u32,
    /// Working directory for the assistant. `None` means the process cwd.
    pub project_dir: Option<PathBuf>,
    /// Extra directories the assistant may access. Empty means the project dir.
    pub add_dirs: Vec<PathBuf>,
    pub permission_mode: PermissionMode,
    pub model: Option<String>,
    /// Path to the `claude` CLI binary.
    pub claude_bin: PathBuf,
    /// Seconds to wait for graceful subprocess shutdown before SIGKILL.
    pub terminate_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            system_prompt: "You are a performance engineer".to_string(),
            allowed_tools: ["Bash", "Read", "WebSearch", "mcp__github"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_turns: 5,
            background_max_turns: MAX_TURNS_LIMIT,
            project_dir: None,
            add_dirs: Vec::new(),
            permission_mode: PermissionMode::default(),
            model: None,
            claude_bin: PathBuf::from("claude"),
            terminate_timeout_secs: 5,
        }
    }
}

impl SessionSettings {
    /// Resolved working directory for assistant sessions.
    pub fn working_directory(&self) -> PathBuf {
        self.project_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default()
    }
}

/// GitHub MCP integration settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    pub mcp_url: String,
    /// Bearer token; only ever read from the environment.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            mcp_url: GITHUB_MCP_URL.to_string(),
            token: None,
        }
    }
}

impl std::fmt::Debug for GithubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubSettings")
            .field("mcp_url", &self.mcp_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        for (name, turns) in [
            ("max_turns", self.session.max_turns),
            ("background_max_turns", self.session.background_max_turns),
        ] {
            if !(1..=MAX_TURNS_LIMIT).contains(&turns) {
                return Err(Error::Config(format!(
                    "session.{name} must be between 1 and {MAX_TURNS_LIMIT}, got {turns}"
                )));
            }
        }
        if self.session.system_prompt.trim().is_empty() {
            return Err(Error::Config("session.system_prompt is empty".into()));
        }
        Ok(())
    }
}

/// Load variables from a `.env` file in the current directory, if present.
///
/// Variables already set in the process environment take precedence.
pub fn load_env_file() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            merge_values(&mut merged, load_config_file(&global_path)?);
        }
    }

    if let Some(dir) = project_dir {
        let project_path = dir.join(".ccbridge").join("settings.json");
        if project_path.exists() {
            merge_values(&mut merged, load_config_file(&project_path)?);
        }
    }

    if let Some(path) = explicit {
        merge_values(&mut merged, load_config_file(path)?);
    }

    let mut config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ccbridge").join("settings.json"))
}

fn load_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Recursively merge `overlay` into `base`. Objects merge by key; any other
/// overlay value replaces the base value.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.parse()
        .map_err(|_| Error::Config(format!("Invalid value for {key}: {val}")))
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(val) = lookup("GITHUB_MCP_PAT").filter(|v| !v.is_empty()) {
        config.github.token = Some(val);
    }
    if let Some(val) = lookup("CCBRIDGE_PROJECT_DIR") {
        config.session.project_dir = Some(PathBuf::from(val));
    }
    if let Some(val) = lookup("CCBRIDGE_MAX_TURNS") {
        config.session.max_turns = parse_env("CCBRIDGE_MAX_TURNS", &val)?;
    }
    if let Some(val) = lookup("CCBRIDGE_BACKGROUND_MAX_TURNS") {
        config.session.background_max_turns = parse_env("CCBRIDGE_BACKGROUND_MAX_TURNS", &val)?;
    }
    if let Some(val) = lookup("CCBRIDGE_PERMISSION_MODE") {
        config.session.permission_mode = val.parse()?;
    }
    if let Some(val) = lookup("CCBRIDGE_MODEL") {
        config.session.model = Some(val);
    }
    if let Some(val) = lookup("CCBRIDGE_CLAUDE_BIN") {
        config.session.claude_bin = PathBuf::from(val);
    }
    if let Some(val) = lookup("CCBRIDGE_ADDR") {
        config.server.addr = parse_env("CCBRIDGE_ADDR", &val)?;
    }
    if let Some(val) = lookup("CCBRIDGE_LOG_LEVEL") {
        config.server.log_level = val;
    }
    Ok(())
}
