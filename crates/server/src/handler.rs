//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    ImageUrlParams, RandomImagesParams, SiteImagesParams, header_images_impl, image_url_impl, random_images_impl,
    refresh_impl, site_images_impl, stats_impl,
};
use hoodmap_core::{AppConfig, SiteImageCache};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for hood-map.
#[derive(Clone)]
pub struct HoodMapServer {
    tool_router: ToolRouter<Self>,
    cache: Arc<SiteImageCache>,
    config: Arc<AppConfig>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl HoodMapServer {
    /// Create a new server handler over a shared image cache.
    pub fn new(cache: Arc<SiteImageCache>, config: Arc<AppConfig>) -> Self {
        Self { tool_router: Self::tool_router(), cache, config }
    }

    #[tool(description = "Report site image cache statistics: image and site counts, build time, fingerprint.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.cache)
    }

    /// Rebuild the image cache from the site repository.
    ///
    /// This is the only tool that reports repository failures.
    #[tool(description = "Rebuild the site image cache from the repository and return the new statistics.")]
    async fn cache_refresh(&self) -> Result<CallToolResult, McpError> {
        refresh_impl(&self.cache).await
    }

    #[tool(description = "Random sample of historic site images with URL, alt text and caption.")]
    async fn random_images(&self, params: Parameters<RandomImagesParams>) -> Result<CallToolResult, McpError> {
        random_images_impl(&self.cache, params.0, self.config.random_image_count).await
    }

    #[tool(description = "Image ids of one historic site in attachment order, plus URLs for a random sample.")]
    async fn site_images(&self, params: Parameters<SiteImagesParams>) -> Result<CallToolResult, McpError> {
        site_images_impl(&self.cache, params.0, self.config.site_image_count).await
    }

    #[tool(description = "Resolve one cached image id to its URL. Returns null for unknown ids.")]
    async fn image_url(&self, params: Parameters<ImageUrlParams>) -> Result<CallToolResult, McpError> {
        image_url_impl(&self.cache, params.0).await
    }

    #[tool(description = "Header strip images: the first image of each configured header site.")]
    async fn header_images(&self) -> Result<CallToolResult, McpError> {
        header_images_impl(&self.cache, &self.config.header_site_addresses).await
    }
}

impl ServerHandler for HoodMapServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "hood-map".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
