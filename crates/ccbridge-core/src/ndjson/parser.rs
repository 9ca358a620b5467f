//! NDJSON parser for Claude Code protocol.
//!
//! Implements tolerant reader pattern: unknown fields ignored, unknown types
//! kept as explicit variants so callers can log them.

use serde_json::Value;

use super::types::*;
use crate::error::{Error, Result};

/// Parse a single NDJSON line from Claude's stdout.
pub fn parse_line(line: &str) -> Result<Message> {
    let raw: Value = serde_json::from_str(line)?;
    parse_value(&raw)
}

/// Parse a JSON value into a canonical message.
pub fn parse_value(raw: &Value) -> Result<Message> {
    let msg_type = raw
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::NdjsonParse("Missing 'type' field".into()))?;

    match msg_type {
        "system" => Ok(parse_system(raw)),
        "assistant" => Ok(parse_assistant(raw)),
        "user" => Ok(parse_user(raw)),
        "result" => Ok(parse_result(raw)),
        _ => Ok(Message::Unknown {
            msg_type: msg_type.to_string(),
            payload: raw.clone(),
        }),
    }
}

/// Build the stdin line that submits `content` as a user turn.
///
/// Claude Code `--input-format stream-json` expects one JSON object per line.
pub fn user_message_line(content: &str) -> Result<String> {
    let msg = serde_json::json!({
        "type": "user",
        "message": {
            "role": "user",
            "content": content,
        },
        "session_id": "default",
        "parent_tool_use_id": null,
    });
    Ok(serde_json::to_string(&msg)?)
}

fn str_field(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn parse_system(raw: &Value) -> Message {
    let subtype = raw.get("subtype").and_then(|v| v.as_str()).unwrap_or("init");
    if subtype != "init" {
        return Message::Unknown {
            msg_type: format!("system/{subtype}"),
            payload: raw.clone(),
        };
    }

    let cwd = raw
        .get("cwd")
        .and_then(|v| v.as_str())
        .map(std::path::PathBuf::from)
        .unwrap_or_default();

    // Tools are plain names in current CLI versions, schema objects in older ones.
    let tools = raw
        .get("tools")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|t| {
                    t.as_str()
                        .or_else(|| t.get("name").and_then(|n| n.as_str()))
                        .map(String::from)
                })
                .collect()
        })
        .unwrap_or_default();

    let mcp_servers = raw
        .get("mcp_servers")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();

    Message::SystemInit(SystemInit {
        session_id: str_field(raw, "session_id"),
        model: str_field(raw, "model"),
        cwd,
        tools,
        mcp_servers,
    })
}

fn parse_assistant(raw: &Value) -> Message {
    let msg = raw.get("message").unwrap_or(raw);

    Message::Assistant(AssistantMessage {
        content: parse_content_blocks(msg.get("content")),
        model: msg.get("model").and_then(|v| v.as_str()).map(String::from),
    })
}

fn parse_user(raw: &Value) -> Message {
    let msg = raw.get("message").unwrap_or(raw);
    // A plain-string content is the echoed prompt, not a block list.
    Message::User(UserMessage {
        content: parse_content_blocks(msg.get("content")),
    })
}

fn parse_content_blocks(content: Option<&Value>) -> Vec<ContentBlock> {
    let Some(arr) = content.and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    arr.iter().map(parse_content_block).collect()
}

fn parse_content_block(block: &Value) -> ContentBlock {
    let block_type = block.get("type").and_then(|v| v.as_str()).unwrap_or("");
    let parsed = match block_type {
        "text" => block
            .get("text")
            .and_then(|v| v.as_str())
            .map(|text| ContentBlock::Text {
                text: text.to_string(),
            }),
        "thinking" => Some(ContentBlock::Thinking {
            thinking: str_field(block, "thinking"),
        }),
        "tool_use" => Some(ContentBlock::ToolUse {
            id: str_field(block, "id"),
            name: str_field(block, "name"),
            input: block.get("input").cloned().unwrap_or(Value::Null),
        }),
        "tool_result" => Some(ContentBlock::ToolResult {
            tool_use_id: str_field(block, "tool_use_id"),
            content: block.get("content").filter(|v| !v.is_null()).cloned(),
            is_error: block
                .get("is_error")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }),
        _ => None,
    };

    parsed.unwrap_or_else(|| ContentBlock::Unrecognized {
        block_type: block_type.to_string(),
        payload: block.clone(),
    })
}

fn parse_result(raw: &Value) -> Message {
    let subtype = match raw.get("subtype").and_then(|v| v.as_str()) {
        Some("success") | None => ResultSubtype::Success,
        Some("error_max_turns") => ResultSubtype::ErrorMaxTurns,
        Some("error_during_execution") => ResultSubtype::ErrorDuringExecution,
        Some(other) => ResultSubtype::Unknown(other.to_string()),
    };

    let num_turns = raw
        .get("num_turns")
        .and_then(|v| v.as_u64())
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0);

    Message::Result(SessionResult {
        subtype,
        session_id: str_field(raw, "session_id"),
        duration_ms: raw.get("duration_ms").and_then(|v| v.as_u64()).unwrap_or(0),
        num_turns,
        cost_usd: raw.get("total_cost_usd").and_then(|v| v.as_f64()),
        is_error: raw.get("is_error").and_then(|v| v.as_bool()).unwrap_or(false),
        result: raw.get("result").and_then(|v| v.as_str()).map(String::from),
    })
}
