//! Content block classification and fragment sinks.
//!
//! Every block of every message is classified exactly once and produces at
//! most one rendered fragment. Fragments are pushed into a [`FragmentSink`]
//! in arrival order; the sink decides whether they are accumulated for a
//! response body or emitted live.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ndjson::{ContentBlock, Message};

/// Marker that prefixes rendered tool invocations.
pub const TOOL_USE_MARKER: &str = "[tool_use]";

/// Outcome of classifying a single content block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified<'a> {
    /// Block renders to this fragment.
    Fragment(String),
    /// Recognized block that renders to nothing.
    Skipped(SkipReason),
    /// Block shape not understood by this relay.
    Unrecognized { block_type: &'a str },
}

/// Why a recognized block produced no fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyText,
    Thinking,
    NullToolResult,
}

/// Classify a block. First match wins: text, tool use, tool result.
pub fn classify(block: &ContentBlock) -> Classified<'_> {
    match block {
        ContentBlock::Text { text } if !text.is_empty() => Classified::Fragment(text.clone()),
        ContentBlock::Text { .. } => Classified::Skipped(SkipReason::EmptyText),
        ContentBlock::ToolUse { name, input, .. } => {
            Classified::Fragment(format!("\n{TOOL_USE_MARKER} {name} {input}\n"))
        }
        ContentBlock::ToolResult {
            content: Some(content),
            ..
        } => Classified::Fragment(render_tool_result(content)),
        ContentBlock::ToolResult { content: None, .. } => {
            Classified::Skipped(SkipReason::NullToolResult)
        }
        ContentBlock::Thinking { .. } => Classified::Skipped(SkipReason::Thinking),
        ContentBlock::Unrecognized { block_type, .. } => Classified::Unrecognized { block_type },
    }
}

/// Render a block to its fragment, if it has one.
pub fn render(block: &ContentBlock) -> Option<String> {
    match classify(block) {
        Classified::Fragment(fragment) => Some(fragment),
        Classified::Skipped(_) | Classified::Unrecognized { .. } => None,
    }
}

/// Textual rendering of a tool result payload.
///
/// Strings are verbatim; a list of text parts is joined by newlines;
/// anything else is compact JSON.
fn render_tool_result(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => {
            let texts: Option<Vec<&str>> = parts
                .iter()
                .map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            match texts {
                Some(texts) if !texts.is_empty() => texts.join("\n"),
                _ => content.to_string(),
            }
        }
        other => other.to_string(),
    }
}

/// Destination for rendered fragments.
pub trait FragmentSink: Send {
    fn push(&mut self, fragment: String);
}

/// Collects fragments for a synchronous response.
#[derive(Debug, Default)]
pub struct Accumulator {
    fragments: Vec<String>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Concatenate all fragments in arrival order.
    pub fn finish(self) -> String {
        self.fragments.concat()
    }
}

impl FragmentSink for Accumulator {
    fn push(&mut self, fragment: String) {
        self.fragments.push(fragment);
    }
}

/// Emits each fragment as a tracing event; nothing is retained.
#[derive(Debug, Clone)]
pub struct LogSink {
    task_id: String,
}

impl LogSink {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }
}

impl FragmentSink for LogSink {
    fn push(&mut self, fragment: String) {
        info!(task_id = %self.task_id, "{}", log_text(&fragment));
    }
}

/// Fragment text as it appears in a log event: no surrounding newlines.
fn log_text(fragment: &str) -> &str {
    fragment.trim()
}

/// Counters and session metadata gathered while relaying one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelayReport {
    pub fragments: usize,
    pub skipped: usize,
    pub unrecognized: usize,
    pub session_id: Option<String>,
    pub num_turns: u32,
    pub duration_ms: u64,
    pub cost_usd: Option<f64>,
    pub is_error: bool,
}

impl RelayReport {
    /// Classify every block of `msg` into `sink` and record metadata.
    pub fn observe(&mut self, msg: &Message, sink: &mut dyn FragmentSink) {
        match msg {
            Message::SystemInit(init) => {
                info!(session_id = %init.session_id, model = %init.model, "Assistant session initialized");
                for server in init.mcp_servers.iter().filter(|s| !s.is_connected()) {
                    warn!(server = %server.name, status = %server.status, "MCP server not connected");
                }
                self.session_id = Some(init.session_id.clone());
            }
            Message::Result(result) => {
                self.num_turns = result.num_turns;
                self.duration_ms = result.duration_ms;
                self.cost_usd = result.cost_usd;
                self.is_error = result.is_error;
                if self.session_id.is_none() && !result.session_id.is_empty() {
                    self.session_id = Some(result.session_id.clone());
                }
            }
            Message::Unknown { msg_type, .. } => {
                debug!(msg_type, "Ignoring NDJSON message without content");
            }
            Message::Assistant(_) | Message::User(_) => {}
        }

        for block in msg.content() {
            match classify(block) {
                Classified::Fragment(fragment) => {
                    self.fragments += 1;
                    sink.push(fragment);
                }
                Classified::Skipped(reason) => {
                    self.skipped += 1;
                    debug!(?reason, "Block produced no fragment");
                }
                Classified::Unrecognized { block_type } => {
                    self.unrecognized += 1;
                    warn!(block_type, "Dropping unrecognized content block");
                }
            }
        }
    }
}
