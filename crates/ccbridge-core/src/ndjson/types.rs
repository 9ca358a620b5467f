//! Message types for Claude Code NDJSON protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Canonical message types from Claude Code.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    SystemInit(SystemInit),
    Assistant(AssistantMessage),
    User(UserMessage),
    Result(SessionResult),
    Unknown { msg_type: String, payload: Value },
}

impl Message {
    /// Content blocks carried by this message, in arrival order.
    ///
    /// Only assistant and user messages carry blocks.
    pub fn content(&self) -> &[ContentBlock] {
        match self {
            Self::Assistant(msg) => &msg.content,
            Self::User(msg) => &msg.content,
            Self::SystemInit(_) | Self::Result(_) | Self::Unknown { .. } => &[],
        }
    }

    /// Whether this message terminates a query exchange.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_))
    }
}

/// System initialization message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemInit {
    pub session_id: String,
    pub model: String,
    pub cwd: PathBuf,
    pub tools: Vec<String>,
    pub mcp_servers: Vec<McpServerStatus>,
}

/// Connection status of an MCP server as reported in system init.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerStatus {
    pub name: String,
    #[serde(default)]
    pub status: String,
}

impl McpServerStatus {
    pub fn is_connected(&self) -> bool {
        self.status == "connected"
    }
}

/// Complete assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantMessage {
    pub content: Vec<ContentBlock>,
    pub model: Option<String>,
}

/// User message (tool results echo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub content: Vec<ContentBlock>,
}

/// Content block in an assistant or user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        /// `None` when the payload is absent or JSON `null`.
        content: Option<Value>,
        is_error: bool,
    },
    /// Block with an unknown `type` or missing required fields.
    Unrecognized {
        block_type: String,
        payload: Value,
    },
}

/// Session completion result.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub subtype: ResultSubtype,
    pub session_id: String,
    pub duration_ms: u64,
    pub num_turns: u32,
    pub cost_usd: Option<f64>,
    pub is_error: bool,
    pub result: Option<String>,
}

/// Result subtype.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResultSubtype {
    #[default]
    Success,
    ErrorMaxTurns,
    ErrorDuringExecution,
    Unknown(String),
}
