//! Site repository: the source of truth the image cache is built from.
//!
//! The cache depends on exactly two operations, captured by
//! [`SiteRepository`]: one bulk listing of every site that has images, and
//! resolution of a blob reference to a fetchable URL. [`SqliteRepository`]
//! implements both over a tokio-rusqlite connection.

pub mod connection;
pub mod migrations;
pub mod sites;

pub use crate::Error;

pub use connection::SqliteRepository;
pub use sites::NewSite;

use serde::{Deserialize, Serialize};

pub type SiteId = i64;
pub type ImageId = i64;

/// Enough of a stored blob to derive its URL without a join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobReference {
    pub blob_id: i64,
    pub key: String,
    pub filename: String,
}

/// One attached image as reported by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageListing {
    pub image_id: ImageId,
    pub blob: BlobReference,
}

/// One site together with its images, in attachment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteListing {
    pub site_id: SiteId,
    pub display_name: Option<String>,
    pub address: String,
    pub images: Vec<ImageListing>,
}

/// Read side of the site repository consumed by the image cache.
#[async_trait::async_trait]
pub trait SiteRepository: Send + Sync {
    /// All sites with at least one image, each with its ordered images.
    ///
    /// Must be a single bulk read. Returns `Error::StoreUnavailable` when the
    /// store cannot be reached or is not provisioned.
    async fn list_sites_with_images(&self) -> Result<Vec<SiteListing>, Error>;

    /// Resolve a blob reference to a URL, or `None` if the blob is gone.
    async fn resolve_url(&self, blob: &BlobReference) -> Result<Option<String>, Error>;

    /// Resolve many blob references at once, one result per input in order.
    ///
    /// The default resolves one at a time; stores with a cheaper bulk lookup
    /// override it.
    async fn resolve_urls(&self, blobs: &[BlobReference]) -> Result<Vec<Option<String>>, Error> {
        let mut urls = Vec::with_capacity(blobs.len());
        for blob in blobs {
            urls.push(self.resolve_url(blob).await?);
        }
        Ok(urls)
    }
}
