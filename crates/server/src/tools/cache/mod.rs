//! Cache-related MCP tools.
//!
//! This module provides operator tools for inspecting and rebuilding the
//! site image cache.

pub mod refresh;
pub mod stats;

pub use refresh::refresh_impl;
pub use stats::{CacheStatsOutput, stats_impl};
