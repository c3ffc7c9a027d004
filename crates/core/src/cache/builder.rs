//! Snapshot construction from the site repository.
//!
//! A build issues one bulk listing and assembles both mappings in a single
//! pass. It either yields a complete snapshot or fails as a whole; nothing is
//! written to the cache store from here.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use super::snapshot::{ImageRecord, SiteRecord, Snapshot};
use crate::Error;
use crate::repository::{SiteListing, SiteRepository};

/// Builds snapshots from a [`SiteRepository`].
#[derive(Clone)]
pub struct SnapshotBuilder {
    repo: Arc<dyn SiteRepository>,
}

impl SnapshotBuilder {
    pub fn new(repo: Arc<dyn SiteRepository>) -> Self {
        Self { repo }
    }

    /// Query the repository once and assemble a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` for any repository failure. No retry
    /// is attempted here.
    pub async fn build(&self) -> Result<Snapshot, Error> {
        tracing::info!("Building site image cache");
        let start = Instant::now();

        let listings = self
            .repo
            .list_sites_with_images()
            .await
            .map_err(Error::into_unavailable)?;
        let snapshot = assemble(listings, Utc::now());

        tracing::info!(
            images = snapshot.total_images(),
            sites = snapshot.total_sites(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Site image cache built"
        );
        Ok(snapshot)
    }
}

/// Assemble the image and site mappings in one pass over the listings.
///
/// Sites without images are dropped. An image id already claimed by an
/// earlier site is skipped for later ones so every id maps to exactly one
/// owner.
pub(crate) fn assemble(listings: Vec<SiteListing>, built_at: DateTime<Utc>) -> Snapshot {
    let image_total = listings.iter().map(|site| site.images.len()).sum();
    let mut images = HashMap::with_capacity(image_total);
    let mut sites = HashMap::with_capacity(listings.len());

    for listing in listings {
        let mut image_ids = Vec::with_capacity(listing.images.len());
        for image in listing.images {
            match images.entry(image.image_id) {
                Entry::Occupied(existing) => {
                    let owner: &ImageRecord = existing.get();
                    tracing::warn!(
                        image_id = image.image_id,
                        owner = owner.site_id,
                        site_id = listing.site_id,
                        "image attached to more than one site; keeping first owner"
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(ImageRecord {
                        image_id: image.image_id,
                        blob: image.blob,
                        site_id: listing.site_id,
                        site_display_name: listing.display_name.clone(),
                        site_address: listing.address.clone(),
                    });
                    image_ids.push(image.image_id);
                }
            }
        }

        if image_ids.is_empty() {
            continue;
        }
        sites.insert(
            listing.site_id,
            SiteRecord {
                site_id: listing.site_id,
                display_name: listing.display_name,
                address: listing.address,
                image_ids,
            },
        );
    }

    Snapshot::new(images, sites, built_at)
}
