//! hood-map server entry point.
//!
//! Opens the site repository, starts the image cache warm-up in the
//! background, and serves the cache tools over MCP on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use hoodmap_core::cache::{WarmupOptions, spawn_warmup};
use hoodmap_core::{AppConfig, CacheStore, SiteImageCache, SqliteRepository};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = Arc::new(AppConfig::load()?);
    tracing::info!(db_path = %config.db_path.display(), "Starting hood-map server on stdio transport");

    let repo = SqliteRepository::open(&config.db_path)
        .await?
        .with_url_prefix(config.blob_url_prefix.as_str());
    let cache = Arc::new(
        SiteImageCache::new(Arc::new(CacheStore::new()), Arc::new(repo)).with_max_age(config.snapshot_ttl()),
    );

    let warmup = config
        .warmup_enabled
        .then(|| spawn_warmup(Arc::clone(&cache), WarmupOptions::from(config.as_ref())));

    let handler = handler::HoodMapServer::new(cache, Arc::clone(&config));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    if let Some(warmup) = warmup
        && !warmup.is_finished()
    {
        warmup.abort();
    }

    Ok(())
}
