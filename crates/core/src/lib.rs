//! Core types and shared functionality for hood-map.
//!
//! This crate provides:
//! - SQLite site repository
//! - Site image cache (snapshot builder, store, service, warm-up)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod repository;

pub use cache::{CacheStore, SiteImageCache, Snapshot};
pub use config::AppConfig;
pub use error::Error;
pub use repository::{SiteRepository, SqliteRepository};
