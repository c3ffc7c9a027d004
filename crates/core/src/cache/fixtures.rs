//! In-memory repository for cache tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::Error;
use crate::repository::{BlobReference, ImageListing, SiteId, SiteListing, SiteRepository};

/// Site listing whose blobs reuse the image id: `key-{id}` / `{id}.jpg`.
pub(crate) fn listing(site_id: SiteId, name: Option<&str>, address: &str, image_ids: &[i64]) -> SiteListing {
    SiteListing {
        site_id,
        display_name: name.map(str::to_string),
        address: address.to_string(),
        images: image_ids
            .iter()
            .map(|&id| ImageListing {
                image_id: id,
                blob: BlobReference { blob_id: id, key: format!("key-{id}"), filename: format!("{id}.jpg") },
            })
            .collect(),
    }
}

#[derive(Default)]
pub(crate) struct FakeRepository {
    sites: Mutex<Vec<SiteListing>>,
    missing_blobs: Mutex<HashSet<i64>>,
    unavailable: AtomicBool,
    resolution_failing: AtomicBool,
    list_calls: AtomicUsize,
    resolve_batches: AtomicUsize,
}

impl FakeRepository {
    pub(crate) fn with_sites(sites: Vec<SiteListing>) -> Self {
        Self { sites: Mutex::new(sites), ..Default::default() }
    }

    pub(crate) fn set_sites(&self, sites: Vec<SiteListing>) {
        *self.sites.lock().unwrap() = sites;
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn set_resolution_failing(&self, failing: bool) {
        self.resolution_failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn mark_missing(&self, blob_id: i64) {
        self.missing_blobs.lock().unwrap().insert(blob_id);
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn resolve_batches(&self) -> usize {
        self.resolve_batches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SiteRepository for FakeRepository {
    async fn list_sites_with_images(&self) -> Result<Vec<SiteListing>, Error> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("repository offline".into()));
        }
        Ok(self.sites.lock().unwrap().clone())
    }

    async fn resolve_url(&self, blob: &BlobReference) -> Result<Option<String>, Error> {
        if self.missing_blobs.lock().unwrap().contains(&blob.blob_id) {
            return Ok(None);
        }
        Ok(Some(format!("/blobs/{}/{}", blob.key, blob.filename)))
    }

    async fn resolve_urls(&self, blobs: &[BlobReference]) -> Result<Vec<Option<String>>, Error> {
        self.resolve_batches.fetch_add(1, Ordering::SeqCst);
        if self.resolution_failing.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("repository offline".into()));
        }
        let missing = self.missing_blobs.lock().unwrap().clone();
        Ok(blobs
            .iter()
            .map(|blob| {
                (!missing.contains(&blob.blob_id)).then(|| format!("/blobs/{}/{}", blob.key, blob.filename))
            })
            .collect())
    }
}
