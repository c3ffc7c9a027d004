//! cache_stats tool implementation.
//!
//! Reports what the current snapshot holds without touching the repository.

use hoodmap_core::SiteImageCache;
use hoodmap_core::cache::CacheStats;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the cache_stats and cache_refresh tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsOutput {
    /// Whether a snapshot with at least one image is cached.
    pub exists: bool,

    #[serde(flatten)]
    pub stats: CacheStats,
}

impl CacheStatsOutput {
    pub fn from_cache(cache: &SiteImageCache) -> Self {
        Self { exists: cache.exists(), stats: cache.stats() }
    }
}

/// Implementation of the cache_stats tool.
pub fn stats_impl(cache: &SiteImageCache) -> Result<CallToolResult, McpError> {
    json_result(&CacheStatsOutput::from_cache(cache))
}
