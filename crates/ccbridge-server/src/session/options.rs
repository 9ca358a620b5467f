//! Per-query session configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use ccbridge_core::Config;
use ccbridge_core::config::{MAX_TURNS_LIMIT, PermissionMode};
use serde::Serialize;

use super::SessionError;

/// Name the GitHub MCP server is registered under.
pub const GITHUB_SERVER: &str = "github";

/// Which turn budget a query runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Caller waits for the accumulated result.
    Sync,
    /// Detached; output only reaches the logs.
    Background,
}

/// Remote MCP server registration.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpServerConfig {
    Http {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

impl McpServerConfig {
    /// HTTP server authenticated with a bearer token.
    pub fn http_bearer(url: impl Into<String>, token: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        Self::Http {
            url: url.into(),
            headers,
        }
    }
}

impl std::fmt::Debug for McpServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { url, headers } => f
                .debug_struct("Http")
                .field("url", url)
                .field("headers", &headers.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// Immutable configuration for one assistant session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub system_prompt: String,
    pub allowed_tools: Vec<String>,
    pub max_turns: u32,
    pub cwd: PathBuf,
    pub add_dirs: Vec<PathBuf>,
    pub permission_mode: PermissionMode,
    pub model: Option<String>,
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

impl SessionOptions {
    /// Build options for `mode` from the resolved configuration.
    ///
    /// The GitHub server is registered only when an allowed tool refers to
    /// it; a missing token is then an error.
    pub fn from_config(config: &Config, mode: QueryMode) -> Result<Self, SessionError> {
        let settings = &config.session;
        let cwd = settings.working_directory();
        let add_dirs = if settings.add_dirs.is_empty() {
            vec![cwd.clone()]
        } else {
            settings.add_dirs.clone()
        };
        let max_turns = match mode {
            QueryMode::Sync => settings.max_turns,
            QueryMode::Background => settings.background_max_turns,
        };

        let mut mcp_servers = BTreeMap::new();
        let github_prefix = format!("mcp__{GITHUB_SERVER}");
        if settings
            .allowed_tools
            .iter()
            .any(|tool| tool.starts_with(&github_prefix))
        {
            let token = config
                .github
                .token
                .as_deref()
                .ok_or(SessionError::MissingCredential)?;
            mcp_servers.insert(
                GITHUB_SERVER.to_string(),
                McpServerConfig::http_bearer(&config.github.mcp_url, token),
            );
        }

        let options = Self {
            system_prompt: settings.system_prompt.clone(),
            allowed_tools: settings.allowed_tools.clone(),
            max_turns,
            cwd,
            add_dirs,
            permission_mode: settings.permission_mode,
            model: settings.model.clone(),
            mcp_servers,
        };
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), SessionError> {
        if !(1..=MAX_TURNS_LIMIT).contains(&self.max_turns) {
            return Err(SessionError::InvalidOptions(format!(
                "max_turns must be between 1 and {MAX_TURNS_LIMIT}, got {}",
                self.max_turns
            )));
        }
        Ok(())
    }

    /// `--mcp-config` payload, or `None` when no servers are registered.
    pub fn mcp_config_json(&self) -> Result<Option<String>, SessionError> {
        if self.mcp_servers.is_empty() {
            return Ok(None);
        }
        let payload = serde_json::json!({ "mcpServers": self.mcp_servers });
        serde_json::to_string(&payload)
            .map(Some)
            .map_err(|e| SessionError::InvalidOptions(e.to_string()))
    }

    /// Command-line arguments for the `claude` binary.
    pub fn cli_args(&self) -> Result<Vec<String>, SessionError> {
        let mut args: Vec<String> = [
            "--output-format",
            "stream-json",
            "--input-format",
            "stream-json",
            "--verbose",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        args.push("--system-prompt".into());
        args.push(self.system_prompt.clone());

        if !self.allowed_tools.is_empty() {
            args.push("--allowedTools".into());
            args.push(self.allowed_tools.join(","));
        }

        args.push("--max-turns".into());
        args.push(self.max_turns.to_string());

        for dir in &self.add_dirs {
            args.push("--add-dir".into());
            args.push(dir.to_string_lossy().into_owned());
        }

        args.push("--permission-mode".into());
        args.push(self.permission_mode.as_str().into());

        if let Some(mcp) = self.mcp_config_json()? {
            args.push("--mcp-config".into());
            args.push(mcp);
        }

        if let Some(ref model) = self.model {
            args.push("--model".into());
            args.push(model.clone());
        }

        Ok(args)
    }
}
