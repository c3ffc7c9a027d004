//! MCP tool implementations.
//!
//! This module contains all tools exposed by the hood-map server.

pub mod cache;
pub mod images;

use hoodmap_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

pub use cache::{refresh_impl, stats_impl};
pub use images::{
    ImageUrlParams, RandomImagesParams, SiteImagesParams, header_images_impl, image_url_impl, random_images_impl,
    site_images_impl,
};

/// Largest sample a tool call may ask for.
pub const MAX_COUNT: usize = 500;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Validate an optional count against [`MAX_COUNT`], falling back to `default`.
pub(crate) fn resolve_count(count: Option<usize>, default: usize) -> Result<usize, Error> {
    let count = count.unwrap_or(default);
    if count > MAX_COUNT {
        return Err(Error::InvalidInput(format!("count must not exceed {MAX_COUNT}")));
    }
    Ok(count)
}
