//! `ccbridge` Core Library
//!
//! Shared functionality for `ccbridge` components:
//! - NDJSON parsing for Claude Code stream-json protocol
//! - Content block classification and fragment sinks
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod config;
pub mod error;
pub mod ndjson;
pub mod relay;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
