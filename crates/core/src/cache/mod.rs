//! In-memory image index over the site repository.
//!
//! A [`Snapshot`] maps every site with images to its image ids and every
//! image to its blob reference and caption fields. Snapshots are built in
//! one bulk read, published through a lock-free [`CacheStore`], and served
//! by [`SiteImageCache`], which rebuilds on a cold or stale read:
//!
//! - [`SnapshotBuilder`]: one repository query, all-or-nothing assembly
//! - [`CacheStore`]: atomic replace, readers never see a partial snapshot
//! - [`SiteImageCache`]: sampling, URL resolution at read time, stats
//! - [`spawn_warmup`]: background fill at startup

pub mod builder;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod warmup;

#[cfg(test)]
pub(crate) mod fixtures;

pub use crate::Error;

pub use builder::SnapshotBuilder;
pub use service::{CACHE_KEY, SiteImageCache};
pub use snapshot::{CacheStats, ImageDescriptor, ImageRecord, SiteRecord, Snapshot};
pub use store::CacheStore;
pub use warmup::{WarmupHandle, WarmupOptions, WarmupOutcome, spawn_warmup};
