//! ccbridge CLI Library
//!
//! Headless runner: one query in, rendered blocks streamed to the console.

pub mod headless;
