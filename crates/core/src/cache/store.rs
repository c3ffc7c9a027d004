//! Process-wide holder of the current snapshot.
//!
//! Readers take an `Arc` to whichever snapshot is current; a rebuild swaps
//! in a new `Arc` atomically. A reader therefore sees the old snapshot or
//! the new one in full, never a mix.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::snapshot::Snapshot;

/// Lock-free store for the current [`Snapshot`]. Starts empty.
pub struct CacheStore {
    current: ArcSwapOption<Snapshot>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self { current: ArcSwapOption::empty() }
    }

    /// The current snapshot, or `None` before the first successful build.
    pub fn load(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    /// Publish a new snapshot, superseding the previous one.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Some(Arc::clone(&snapshot)));
        snapshot
    }

    pub fn clear(&self) {
        self.current.store(None);
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.load_full();
        f.debug_struct("CacheStore")
            .field("images", &current.as_ref().map(|s| s.total_images()))
            .field("built_at", &current.as_ref().map(|s| s.built_at()))
            .finish()
    }
}
