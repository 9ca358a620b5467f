//! ccbridge Server Library
//!
//! - Session orchestration over Claude Code subprocesses
//! - Block relay into accumulating or logging sinks
//! - Background (fire-and-forget) query execution
//! - In-memory user directory
//! - axum HTTP surface

pub mod api;
pub mod background;
pub mod orchestrator;
pub mod session;
pub mod users;
