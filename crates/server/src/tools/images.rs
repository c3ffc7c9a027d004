//! Image lookup tools: random gallery, per-site images, single URLs, header strip.
//!
//! None of these fail because of cache state; an empty or unreachable
//! repository yields empty results.

use hoodmap_core::SiteImageCache;
use hoodmap_core::cache::ImageDescriptor;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{json_result, resolve_count};

/// Parameters for the random_images tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RandomImagesParams {
    /// Maximum number of images to return (default from configuration).
    pub count: Option<usize>,
}

/// Parameters for the site_images tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteImagesParams {
    /// The site to look up.
    pub site_id: i64,

    /// Maximum number of URLs to sample (default from configuration).
    pub count: Option<usize>,
}

/// Parameters for the image_url tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImageUrlParams {
    pub image_id: i64,
}

/// Output from the random_images and header_images tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImagesOutput {
    pub images: Vec<ImageDescriptor>,
}

/// Output from the site_images tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteImagesOutput {
    pub site_id: i64,

    /// Every image id of the site, in attachment order.
    pub image_ids: Vec<i64>,

    /// URLs of a random sample of those images.
    pub urls: Vec<String>,
}

/// Output from the image_url tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImageUrlOutput {
    pub image_id: i64,
    pub url: Option<String>,
}

/// Implementation of the random_images tool.
pub async fn random_images_impl(
    cache: &SiteImageCache, params: RandomImagesParams, default_count: usize,
) -> Result<CallToolResult, McpError> {
    let count = resolve_count(params.count, default_count)?;
    let images = cache.random_images(count).await;
    json_result(&ImagesOutput { images })
}

/// Implementation of the site_images tool.
pub async fn site_images_impl(
    cache: &SiteImageCache, params: SiteImagesParams, default_count: usize,
) -> Result<CallToolResult, McpError> {
    let count = resolve_count(params.count, default_count)?;
    let image_ids = cache.site_image_ids(params.site_id);
    let urls = cache.random_site_images(params.site_id, count).await;
    json_result(&SiteImagesOutput { site_id: params.site_id, image_ids, urls })
}

/// Implementation of the image_url tool.
pub async fn image_url_impl(cache: &SiteImageCache, params: ImageUrlParams) -> Result<CallToolResult, McpError> {
    let url = cache.cached_image_url(params.image_id).await;
    json_result(&ImageUrlOutput { image_id: params.image_id, url })
}

/// Implementation of the header_images tool.
pub async fn header_images_impl(cache: &SiteImageCache, addresses: &[String]) -> Result<CallToolResult, McpError> {
    let images = cache.header_images(addresses).await;
    json_result(&ImagesOutput { images })
}
