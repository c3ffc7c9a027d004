//! Immutable image-index snapshot and the records it holds.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::repository::{BlobReference, ImageId, SiteId};

/// One attached image, denormalized with its owning site's caption fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub image_id: ImageId,
    pub blob: BlobReference,
    pub site_id: SiteId,
    pub site_display_name: Option<String>,
    pub site_address: String,
}

impl ImageRecord {
    /// Caption text: the site's historic name, or its address.
    pub fn label(&self) -> &str {
        label(self.site_display_name.as_deref(), &self.site_address)
    }
}

/// A historic site with at least one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRecord {
    pub site_id: SiteId,
    pub display_name: Option<String>,
    pub address: String,
    /// Attachment order.
    pub image_ids: Vec<ImageId>,
}

impl SiteRecord {
    pub fn label(&self) -> &str {
        label(self.display_name.as_deref(), &self.address)
    }
}

fn label<'a>(name: Option<&'a str>, address: &'a str) -> &'a str {
    match name {
        Some(name) if !name.is_empty() => name,
        _ => address,
    }
}

/// The unit of caching: every site with images and every image, at one point in time.
///
/// Only the builder constructs snapshots; once built they are shared behind
/// an `Arc` and replaced wholesale, never mutated.
#[derive(Debug, Clone)]
pub struct Snapshot {
    images: HashMap<ImageId, ImageRecord>,
    sites: HashMap<SiteId, SiteRecord>,
    built_at: DateTime<Utc>,
}

impl Snapshot {
    pub(crate) fn new(
        images: HashMap<ImageId, ImageRecord>, sites: HashMap<SiteId, SiteRecord>, built_at: DateTime<Utc>,
    ) -> Self {
        Self { images, sites, built_at }
    }

    pub fn image(&self, image_id: ImageId) -> Option<&ImageRecord> {
        self.images.get(&image_id)
    }

    pub fn site(&self, site_id: SiteId) -> Option<&SiteRecord> {
        self.sites.get(&site_id)
    }

    pub fn images(&self) -> &HashMap<ImageId, ImageRecord> {
        &self.images
    }

    pub fn sites(&self) -> &HashMap<SiteId, SiteRecord> {
        &self.sites
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn total_images(&self) -> usize {
        self.images.len()
    }

    pub fn total_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    /// Membership digest: SHA-256 over the sorted site ids and sorted image ids.
    ///
    /// Two snapshots with the same key sets share a fingerprint regardless of
    /// build time.
    pub fn fingerprint(&self) -> String {
        let mut site_ids: Vec<SiteId> = self.sites.keys().copied().collect();
        let mut image_ids: Vec<ImageId> = self.images.keys().copied().collect();
        site_ids.sort_unstable();
        image_ids.sort_unstable();

        let mut hasher = Sha256::new();
        for id in site_ids {
            hasher.update(id.to_le_bytes());
        }
        hasher.update(b"\n");
        for id in image_ids {
            hasher.update(id.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// A renderable image: resolved URL plus caption text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ImageDescriptor {
    pub url: String,
    pub alt_text: String,
    pub caption: String,
}

impl ImageDescriptor {
    pub(crate) fn new(url: String, record: &ImageRecord) -> Self {
        let caption = record.label().to_string();
        Self { url, alt_text: format!("Historic site: {caption}"), caption }
    }
}

/// Summary of the current snapshot. Zeroed when the cache is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheStats {
    pub total_images: usize,
    pub total_sites: usize,
    pub cache_key: String,
    /// RFC 3339 build time.
    pub built_at: Option<String>,
    pub fingerprint: Option<String>,
}
