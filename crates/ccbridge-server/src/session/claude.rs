//! Claude Code subprocess sessions.
//!
//! Each session is one `claude` process speaking stream-json over stdio.
//! The child is spawned with `kill_on_drop`, so a session dropped without
//! `close` (e.g. a cancelled request) still takes its process down.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use ccbridge_core::ndjson::{self, Message};

use super::{Connector, Session, SessionError, SessionOptions};

/// Spawns `claude` subprocesses.
#[derive(Debug, Clone)]
pub struct ClaudeConnector {
    /// Path to the `claude` binary.
    claude_bin: PathBuf,
    /// Timeout for graceful subprocess termination before SIGKILL.
    terminate_timeout: Duration,
}

impl ClaudeConnector {
    pub fn new(claude_bin: PathBuf) -> Self {
        Self::with_terminate_timeout(claude_bin, 5)
    }

    pub const fn with_terminate_timeout(claude_bin: PathBuf, terminate_timeout_secs: u64) -> Self {
        Self {
            claude_bin,
            terminate_timeout: Duration::from_secs(terminate_timeout_secs),
        }
    }

    /// The session's working directory, which must already exist.
    fn working_directory(options: &SessionOptions) -> Result<PathBuf, SessionError> {
        if options.cwd.as_os_str().is_empty() {
            return Err(SessionError::InvalidOptions(
                "working directory is not set".to_string(),
            ));
        }
        if !options.cwd.is_dir() {
            return Err(SessionError::InvalidOptions(format!(
                "working directory does not exist: {}",
                options.cwd.display()
            )));
        }
        Ok(options.cwd.clone())
    }
}

#[async_trait]
impl Connector for ClaudeConnector {
    async fn connect(&self, options: &SessionOptions) -> Result<Box<dyn Session>, SessionError> {
        let working_dir = Self::working_directory(options)?;
        let mut cmd = Command::new(&self.claude_bin);
        cmd.current_dir(&working_dir)
            .args(options.cli_args()?)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            working_dir = %working_dir.display(),
            max_turns = options.max_turns,
            mcp_servers = ?options.mcp_servers.keys().collect::<Vec<_>>(),
            model = ?options.model,
            "Spawning claude subprocess"
        );
        let mut child = cmd.spawn().map_err(|e| SessionError::SpawnFailed {
            reason: format!("{}: {e}", self.claude_bin.display()),
        })?;

        let id = uuid::Uuid::new_v4().to_string();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::SpawnFailed {
                reason: "Failed to capture stdin".to_string(),
            })?;
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(8);
        let pid = id.clone();
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(line) = stdin_rx.recv().await {
                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    error!(session = %pid, "Failed to write to stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.write_all(b"\n").await {
                    error!(session = %pid, "Failed to write newline: {}", e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    error!(session = %pid, "Failed to flush stdin: {}", e);
                    break;
                }
            }
            // Dropping stdin here signals EOF to the child.
        });

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::SpawnFailed {
                reason: "Failed to capture stdout".to_string(),
            })?;
        let (stdout_tx, stdout_rx) = mpsc::channel::<String>(64);
        let pid = id.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(session = %pid, "stdout: {}", line);
                if stdout_tx.send(line).await.is_err() {
                    debug!(session = %pid, "stdout channel closed");
                    break;
                }
            }
            debug!(session = %pid, "stdout reader finished");
        });

        if let Some(stderr) = child.stderr.take() {
            let pid = id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(session = %pid, "stderr: {}", line);
                }
            });
        }

        Ok(Box::new(ClaudeSession {
            id,
            child,
            stdin_tx: Some(stdin_tx),
            stdout_rx,
            finished: false,
            terminate_timeout: self.terminate_timeout,
        }))
    }
}

/// A running `claude` process bound to one query.
#[derive(Debug)]
pub struct ClaudeSession {
    id: String,
    child: Child,
    stdin_tx: Option<mpsc::Sender<String>>,
    stdout_rx: mpsc::Receiver<String>,
    finished: bool,
    terminate_timeout: Duration,
}

impl ClaudeSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    #[cfg(unix)]
    fn interrupt(&self) {
        if let Some(pid) = self.child.id() {
            // SAFETY: pid is a valid process ID obtained from our own Child handle.
            // kill(2) with SIGINT is safe to call on any owned subprocess.
            #[allow(unsafe_code)]
            #[allow(clippy::cast_possible_wrap)]
            let ret = unsafe { libc::kill(pid as i32, libc::SIGINT) };
            if ret != 0 {
                let err = std::io::Error::last_os_error();
                warn!(session = %self.id, pid, error = %err, "Failed to send SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    fn interrupt(&self) {}
}

#[async_trait]
impl Session for ClaudeSession {
    async fn query(&mut self, prompt: &str) -> Result<(), SessionError> {
        let line = ndjson::user_message_line(prompt)?;
        let tx = self
            .stdin_tx
            .as_ref()
            .ok_or_else(|| SessionError::StdinClosed {
                id: self.id.clone(),
            })?;
        tx.send(line).await.map_err(|_| SessionError::StdinClosed {
            id: self.id.clone(),
        })?;
        debug!(session = %self.id, "Sent query to subprocess");
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<Message>, SessionError> {
        if self.finished {
            return Ok(None);
        }
        loop {
            let Some(line) = self.stdout_rx.recv().await else {
                let code = match tokio::time::timeout(self.terminate_timeout, self.child.wait())
                    .await
                {
                    Ok(Ok(status)) => status.code(),
                    Ok(Err(e)) => return Err(SessionError::Io(e)),
                    Err(_) => None,
                };
                return Err(SessionError::StreamEnded { code });
            };
            if line.trim().is_empty() {
                continue;
            }
            match ndjson::parse_line(&line) {
                Ok(msg) => {
                    self.finished = msg.is_terminal();
                    return Ok(Some(msg));
                }
                Err(e) => {
                    warn!(session = %self.id, error = %e, "Skipping unparseable stdout line");
                }
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        let mut this = self;
        // Closing stdin asks the CLI to finish on its own.
        this.stdin_tx = None;

        if let Some(status) = this.child.try_wait()? {
            debug!(session = %this.id, ?status, "Process already exited");
            return Ok(());
        }

        this.interrupt();

        match tokio::time::timeout(this.terminate_timeout, this.child.wait()).await {
            Ok(Ok(status)) => {
                info!(session = %this.id, ?status, "Process exited gracefully");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(session = %this.id, error = %e, "Error waiting for process");
                this.child.kill().await.ok();
                Ok(())
            }
            Err(_) => {
                warn!(session = %this.id, "Timeout waiting for graceful shutdown, killing");
                this.child.kill().await?;
                Ok(())
            }
        }
    }
}
