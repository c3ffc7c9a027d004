//! Site and image rows.
//!
//! Writes used by seeding and operator imports, plus the two reads the image
//! cache depends on.

use std::collections::HashMap;

use super::connection::SqliteRepository;
use super::{BlobReference, ImageId, ImageListing, SiteId, SiteListing, SiteRepository};
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Fields for a new site row.
#[derive(Debug, Clone, Default)]
pub struct NewSite {
    pub historic_name: Option<String>,
    pub address: Option<String>,
    pub architectural_style: Option<String>,
    pub built_year: Option<i32>,
}

/// Blob ids per `IN (...)` lookup, below SQLite's bound-parameter limit.
const RESOLVE_CHUNK: usize = 500;

/// One row of the joined site/attachment/blob listing.
type ListingRow = (SiteId, Option<String>, Option<String>, ImageId, i64, String, String);

impl SqliteRepository {
    /// Insert a site and return its id.
    pub async fn insert_site(&self, site: &NewSite) -> Result<SiteId, Error> {
        let site = site.clone();
        self.conn
            .call(move |conn| -> Result<SiteId, Error> {
                conn.execute(
                    "INSERT INTO sites (historic_name, address, architectural_style, built_year, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        &site.historic_name,
                        &site.address,
                        &site.architectural_style,
                        &site.built_year,
                        chrono::Utc::now().to_rfc3339(),
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(Error::from)
    }

    /// Store a blob and attach it to a site as its next image.
    ///
    /// Returns the attachment id, which is the image id used by the cache.
    pub async fn attach_image(
        &self, site_id: SiteId, key: &str, filename: &str, content_type: Option<&str>,
    ) -> Result<ImageId, Error> {
        let key = key.to_string();
        let filename = filename.to_string();
        let content_type = content_type.map(str::to_string);
        self.conn
            .call(move |conn| -> Result<ImageId, Error> {
                let now = chrono::Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO blobs (key, filename, content_type, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![&key, &filename, &content_type, &now],
                )?;
                let blob_id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO image_attachments (site_id, blob_id, created_at) VALUES (?1, ?2, ?3)",
                    params![site_id, blob_id, &now],
                )?;
                let image_id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(image_id)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a blob and its attachments.
    ///
    /// Returns whether a blob was removed.
    pub async fn delete_blob(&self, blob_id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM blobs WHERE id = ?1", params![blob_id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait::async_trait]
impl SiteRepository for SqliteRepository {
    async fn list_sites_with_images(&self) -> Result<Vec<SiteListing>, Error> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<ListingRow>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT s.id, s.historic_name, s.address, a.id, b.id, b.key, b.filename
                     FROM sites s
                     JOIN image_attachments a ON a.site_id = s.id
                     JOIN blobs b ON b.id = a.blob_id
                     ORDER BY s.id, a.id",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?))
                })?;
                rows.collect()
            })
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        let mut sites: Vec<SiteListing> = Vec::new();
        for (site_id, historic_name, address, image_id, blob_id, key, filename) in rows {
            let image = ImageListing { image_id, blob: BlobReference { blob_id, key, filename } };
            match sites.last_mut() {
                Some(site) if site.site_id == site_id => site.images.push(image),
                _ => sites.push(SiteListing {
                    site_id,
                    display_name: historic_name.filter(|name| !name.trim().is_empty()),
                    address: address.unwrap_or_default(),
                    images: vec![image],
                }),
            }
        }

        Ok(sites)
    }

    async fn resolve_url(&self, blob: &BlobReference) -> Result<Option<String>, Error> {
        let blob_id = blob.blob_id;
        let found = self
            .conn
            .call(move |conn| -> Result<Option<(String, String)>, Error> {
                let result = conn.query_row(
                    "SELECT key, filename FROM blobs WHERE id = ?1",
                    params![blob_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                );

                match result {
                    Ok(pair) => Ok(Some(pair)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        Ok(found.map(|(key, filename)| self.blob_url(&key, &filename)))
    }

    async fn resolve_urls(&self, blobs: &[BlobReference]) -> Result<Vec<Option<String>>, Error> {
        let mut found: HashMap<i64, (String, String)> = HashMap::with_capacity(blobs.len());
        for chunk in blobs.chunks(RESOLVE_CHUNK) {
            let ids: Vec<i64> = chunk.iter().map(|blob| blob.blob_id).collect();
            let rows = self
                .conn
                .call(move |conn| -> Result<Vec<(i64, String, String)>, rusqlite::Error> {
                    let placeholders = vec!["?"; ids.len()].join(", ");
                    let mut stmt =
                        conn.prepare(&format!("SELECT id, key, filename FROM blobs WHERE id IN ({placeholders})"))?;
                    let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                    })?;
                    rows.collect()
                })
                .await
                .map_err(Error::from)?;
            found.extend(rows.into_iter().map(|(id, key, filename)| (id, (key, filename))));
        }

        Ok(blobs
            .iter()
            .map(|blob| found.get(&blob.blob_id).map(|(key, filename)| self.blob_url(key, filename)))
            .collect())
    }
}

impl SqliteRepository {
    fn blob_url(&self, key: &str, filename: &str) -> String {
        format!("{}/{key}/{filename}", self.url_prefix)
    }
}
