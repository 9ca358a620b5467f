//! Assistant sessions.
//!
//! A [`Connector`] opens one [`Session`] per query. Sessions are driven
//! through `query` → `next_message`* → `close` and must not be reused.

pub mod claude;
pub mod options;

use async_trait::async_trait;
use ccbridge_core::ndjson::Message;

pub use claude::{ClaudeConnector, ClaudeSession};
pub use options::{McpServerConfig, QueryMode, SessionOptions};

/// Opens assistant sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a live session configured by `options`.
    async fn connect(&self, options: &SessionOptions) -> Result<Box<dyn Session>, SessionError>;
}

/// One live assistant session scoped to a single query.
#[async_trait]
pub trait Session: Send {
    /// Submit the query. Called exactly once per session.
    async fn query(&mut self, prompt: &str) -> Result<(), SessionError>;

    /// Next message of the response stream.
    ///
    /// Returns `Ok(None)` once the terminal result message has been yielded.
    async fn next_message(&mut self) -> Result<Option<Message>, SessionError>;

    /// Release the session and its underlying process.
    async fn close(self: Box<Self>) -> Result<(), SessionError>;
}

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("GitHub MCP credential missing: set GITHUB_MCP_PAT")]
    MissingCredential,

    #[error("Invalid session options: {0}")]
    InvalidOptions(String),

    #[error("Failed to spawn assistant: {reason}")]
    SpawnFailed { reason: String },

    #[error("Assistant stdin closed: {id}")]
    StdinClosed { id: String },

    #[error("Assistant stream ended before a result (exit code {code:?})")]
    StreamEnded { code: Option<i32> },

    #[error(transparent)]
    Protocol(#[from] ccbridge_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
