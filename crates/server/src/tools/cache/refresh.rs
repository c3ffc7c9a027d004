//! cache_refresh tool implementation.
//!
//! Forces a synchronous rebuild of the site image cache.

use hoodmap_core::SiteImageCache;
use rmcp::{ErrorData as McpError, model::CallToolResult};

use super::stats::CacheStatsOutput;
use crate::tools::json_result;

/// Implementation of the cache_refresh tool.
///
/// Unlike the read tools, a repository failure is reported to the caller.
pub async fn refresh_impl(cache: &SiteImageCache) -> Result<CallToolResult, McpError> {
    cache.refresh().await?;
    json_result(&CacheStatsOutput::from_cache(cache))
}
