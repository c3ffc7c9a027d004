//! Read API over the cached snapshot, with rebuild-on-miss.
//!
//! Request paths never see an error from here: an unreachable repository or
//! an unresolvable blob shrinks the result instead. Only [`SiteImageCache::refresh`]
//! reports failures, for the warm-up task and operators.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::seq::{IteratorRandom, SliceRandom};
use tokio::sync::Mutex;

use super::builder::SnapshotBuilder;
use super::snapshot::{CacheStats, ImageDescriptor, ImageRecord, SiteRecord, Snapshot};
use super::store::CacheStore;
use crate::Error;
use crate::repository::{ImageId, SiteId, SiteRepository};

/// Name under which the snapshot is published, reported in stats.
pub const CACHE_KEY: &str = "site_image_cache";

/// Cache-aside service over a [`CacheStore`].
///
/// Rebuilds triggered by reads and by [`SiteImageCache::refresh`] share one
/// gate, so concurrent misses on a cold cache collapse into a single build.
pub struct SiteImageCache {
    store: Arc<CacheStore>,
    builder: SnapshotBuilder,
    repo: Arc<dyn SiteRepository>,
    max_age: Option<Duration>,
    rebuild_gate: Mutex<()>,
}

impl SiteImageCache {
    pub fn new(store: Arc<CacheStore>, repo: Arc<dyn SiteRepository>) -> Self {
        Self {
            store,
            builder: SnapshotBuilder::new(Arc::clone(&repo)),
            repo,
            max_age: None,
            rebuild_gate: Mutex::new(()),
        }
    }

    /// Treat snapshots older than `max_age` as misses. `None` never expires.
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Up to `count` images sampled without replacement, in random order.
    ///
    /// Rebuilds once if the cache is empty or stale. Images whose blob no
    /// longer resolves are left out.
    pub async fn random_images(&self, count: usize) -> Vec<ImageDescriptor> {
        if count == 0 {
            return Vec::new();
        }
        let Some(snapshot) = self.load_or_rebuild().await else {
            return Vec::new();
        };

        let picked = sample(snapshot.images().values(), count);
        self.resolve_all(picked)
            .await
            .into_iter()
            .map(|(record, url)| ImageDescriptor::new(url, record))
            .collect()
    }

    /// URL for one cached image. `None` for unknown ids or an empty cache.
    pub async fn cached_image_url(&self, image_id: ImageId) -> Option<String> {
        let snapshot = self.store.load()?;
        let record = snapshot.image(image_id)?;
        self.resolve(record).await
    }

    /// The site's image ids in attachment order; empty when unknown.
    pub fn site_image_ids(&self, site_id: SiteId) -> Vec<ImageId> {
        self.store
            .load()
            .and_then(|snapshot| snapshot.site(site_id).map(|site| site.image_ids.clone()))
            .unwrap_or_default()
    }

    /// URLs for up to `count` randomly chosen images of one site.
    pub async fn random_site_images(&self, site_id: SiteId, count: usize) -> Vec<String> {
        let Some(snapshot) = self.store.load() else {
            return Vec::new();
        };
        let Some(site) = snapshot.site(site_id) else {
            return Vec::new();
        };

        let picked = sample(site.image_ids.iter().copied(), count)
            .into_iter()
            .filter_map(|image_id| snapshot.image(image_id))
            .collect();
        self.resolve_all(picked).await.into_iter().map(|(_, url)| url).collect()
    }

    /// First image of the site at `address` (case-insensitive), for the header strip.
    pub async fn header_image(&self, address: &str) -> Option<ImageDescriptor> {
        let snapshot = self.load_or_rebuild().await?;
        self.first_image_at(&snapshot, address).await
    }

    /// Header images for each address, skipping addresses with no cached image.
    pub async fn header_images(&self, addresses: &[String]) -> Vec<ImageDescriptor> {
        let Some(snapshot) = self.load_or_rebuild().await else {
            return Vec::new();
        };

        let firsts = addresses
            .iter()
            .filter_map(|address| first_record_at(&snapshot, address))
            .collect();
        self.resolve_all(firsts)
            .await
            .into_iter()
            .map(|(record, url)| ImageDescriptor::new(url, record))
            .collect()
    }

    /// Rebuild and publish a new snapshot regardless of the current state.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if the build fails; the previous
    /// snapshot stays in place.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, Error> {
        let _gate = self.rebuild_gate.lock().await;
        tracing::info!("Refreshing site image cache");
        let snapshot = self.builder.build().await?;
        Ok(self.store.replace(snapshot))
    }

    /// Whether a snapshot with at least one image is cached.
    pub fn exists(&self) -> bool {
        self.store.load().is_some_and(|snapshot| snapshot.has_images())
    }

    pub fn stats(&self) -> CacheStats {
        let snapshot = self.store.load();
        CacheStats {
            total_images: snapshot.as_ref().map_or(0, |s| s.total_images()),
            total_sites: snapshot.as_ref().map_or(0, |s| s.total_sites()),
            cache_key: CACHE_KEY.to_string(),
            built_at: snapshot.as_ref().map(|s| s.built_at().to_rfc3339()),
            fingerprint: snapshot.as_ref().map(|s| s.fingerprint()),
        }
    }

    /// Drop the current snapshot.
    pub fn clear(&self) {
        self.store.clear();
    }

    fn is_fresh(&self, snapshot: &Snapshot) -> bool {
        let Some(max_age) = self.max_age else {
            return true;
        };
        match (Utc::now() - snapshot.built_at()).to_std() {
            Ok(age) => age < max_age,
            Err(_) => true,
        }
    }

    fn load_fresh(&self) -> Option<Arc<Snapshot>> {
        self.store.load().filter(|snapshot| self.is_fresh(snapshot))
    }

    /// The current snapshot, rebuilt first when absent or stale.
    ///
    /// A snapshot built while the repository is still being filled may be
    /// empty or partial. It is cached like any other, so only a max age
    /// (see [`SiteImageCache::with_max_age`]) or an explicit refresh
    /// replaces it.
    async fn load_or_rebuild(&self) -> Option<Arc<Snapshot>> {
        if let Some(snapshot) = self.load_fresh() {
            return Some(snapshot);
        }

        let _gate = self.rebuild_gate.lock().await;
        if let Some(snapshot) = self.load_fresh() {
            return Some(snapshot);
        }

        tracing::warn!("Site image cache is empty or stale, rebuilding");
        match self.builder.build().await {
            Ok(snapshot) => Some(self.store.replace(snapshot)),
            Err(e) => {
                tracing::warn!(error = %e, "Site image cache rebuild failed");
                self.store.load()
            }
        }
    }

    async fn first_image_at(&self, snapshot: &Snapshot, address: &str) -> Option<ImageDescriptor> {
        let record = first_record_at(snapshot, address)?;
        let url = self.resolve(record).await?;
        Some(ImageDescriptor::new(url, record))
    }

    /// Resolve a batch in one repository call, keeping records whose URL resolves.
    async fn resolve_all<'a>(&self, records: Vec<&'a ImageRecord>) -> Vec<(&'a ImageRecord, String)> {
        if records.is_empty() {
            return Vec::new();
        }
        let blobs: Vec<_> = records.iter().map(|record| record.blob.clone()).collect();
        let urls = match self.repo.resolve_urls(&blobs).await {
            Ok(urls) => urls,
            Err(e) => {
                tracing::debug!(count = records.len(), error = %e, "image URL resolution failed; skipping batch");
                return Vec::new();
            }
        };

        records
            .into_iter()
            .zip(urls)
            .filter_map(|(record, url)| match url {
                Some(url) if !url.is_empty() => Some((record, url)),
                _ => {
                    tracing::debug!(image_id = record.image_id, "cached image no longer resolves; skipping");
                    None
                }
            })
            .collect()
    }

    async fn resolve(&self, record: &ImageRecord) -> Option<String> {
        match self.repo.resolve_url(&record.blob).await {
            Ok(Some(url)) if !url.is_empty() => Some(url),
            Ok(_) => {
                tracing::debug!(image_id = record.image_id, "cached image no longer resolves; skipping");
                None
            }
            Err(e) => {
                tracing::debug!(image_id = record.image_id, error = %e, "image URL resolution failed; skipping");
                None
            }
        }
    }
}

/// Lowest-id site whose address matches, ignoring case and surrounding space.
fn site_at<'a>(snapshot: &'a Snapshot, address: &str) -> Option<&'a SiteRecord> {
    let address = address.trim();
    snapshot
        .sites()
        .values()
        .filter(|site| site.address.trim().eq_ignore_ascii_case(address))
        .min_by_key(|site| site.site_id)
}

/// First image of the site at `address`.
fn first_record_at<'a>(snapshot: &'a Snapshot, address: &str) -> Option<&'a ImageRecord> {
    let site = site_at(snapshot, address)?;
    snapshot.image(*site.image_ids.first()?)
}

/// Sample without replacement and shuffle, so order differs between calls too.
fn sample<T>(items: impl IntoIterator<Item = T>, amount: usize) -> Vec<T> {
    let mut rng = rand::rng();
    let mut picked = items.into_iter().choose_multiple(&mut rng, amount);
    picked.shuffle(&mut rng);
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fixtures::{FakeRepository, listing};
    use std::collections::HashSet;

    fn service(repo: &Arc<FakeRepository>) -> SiteImageCache {
        SiteImageCache::new(Arc::new(CacheStore::new()), repo.clone())
    }

    fn duvall() -> Arc<FakeRepository> {
        Arc::new(FakeRepository::with_sites(vec![listing(
            1,
            Some("Duvall House"),
            "815 Milwaukee Street",
            &[1, 2],
        )]))
    }

    fn neighborhood() -> Arc<FakeRepository> {
        Arc::new(FakeRepository::with_sites(vec![
            listing(1, Some("Duvall House"), "815 Milwaukee Street", &[1, 2]),
            listing(2, Some("William J. Kowalke House"), "1020 Milwaukee Street", &[3, 4, 5]),
            listing(3, None, "903 Dodge Street", &[6]),
        ]))
    }

    #[tokio::test]
    async fn test_duvall_house_scenario() {
        let repo = duvall();
        let cache = service(&repo);

        cache.refresh().await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.total_images, 2);
        assert_eq!(stats.total_sites, 1);
        assert_eq!(cache.site_image_ids(1), vec![1, 2]);
        let url = cache.cached_image_url(1).await.unwrap();
        assert!(!url.is_empty());
        assert_eq!(cache.cached_image_url(999).await, None);
    }

    #[tokio::test]
    async fn test_empty_repository() {
        let repo = Arc::new(FakeRepository::default());
        let cache = service(&repo);

        assert!(!cache.exists());
        assert!(cache.random_images(5).await.is_empty());
        cache.refresh().await.unwrap();
        assert!(!cache.exists());
        assert!(cache.random_images(5).await.is_empty());
    }

    #[tokio::test]
    async fn test_cold_cache_rebuilds_once() {
        let repo = neighborhood();
        let cache = service(&repo);

        let images = cache.random_images(3).await;
        assert_eq!(images.len(), 3);
        assert_eq!(repo.list_calls(), 1);

        cache.random_images(3).await;
        assert_eq!(repo.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_random_images_bounds() {
        let repo = neighborhood();
        let cache = service(&repo);
        cache.refresh().await.unwrap();

        for n in 0..10 {
            let images = cache.random_images(n).await;
            assert!(images.len() <= n);
            assert_eq!(images.len(), n.min(6));
            assert!(images.iter().all(|image| !image.url.is_empty()));

            let urls: HashSet<_> = images.iter().map(|image| image.url.clone()).collect();
            assert_eq!(urls.len(), images.len(), "sampled with replacement");
        }
    }

    #[tokio::test]
    async fn test_random_images_text() {
        let repo = duvall();
        let cache = service(&repo);

        for image in cache.random_images(2).await {
            assert_eq!(image.caption, "Duvall House");
            assert_eq!(image.alt_text, "Historic site: Duvall House");
        }
    }

    #[tokio::test]
    async fn test_random_images_caption_falls_back_to_address() {
        let repo = Arc::new(FakeRepository::with_sites(vec![listing(3, None, "903 Dodge Street", &[6])]));
        let cache = service(&repo);

        let images = cache.random_images(1).await;
        assert_eq!(images[0].caption, "903 Dodge Street");
    }

    #[tokio::test]
    async fn test_unresolvable_images_are_filtered() {
        let repo = duvall();
        repo.mark_missing(2);
        let cache = service(&repo);

        let images = cache.random_images(10).await;
        assert_eq!(images.len(), 1);
        assert_eq!(cache.cached_image_url(2).await, None);
        assert!(cache.cached_image_url(1).await.is_some());
    }

    #[tokio::test]
    async fn test_unavailable_repository_never_fails_reads() {
        let repo = duvall();
        repo.set_unavailable(true);
        let cache = service(&repo);

        assert!(cache.random_images(3).await.is_empty());
        assert!(cache.header_image("815 Milwaukee Street").await.is_none());
        assert!(cache.random_site_images(1, 3).await.is_empty());
        assert!(matches!(cache.refresh().await, Err(Error::StoreUnavailable(_))));
        assert!(!cache.exists());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let repo = duvall();
        let cache = service(&repo);
        cache.refresh().await.unwrap();
        let before = cache.stats();

        repo.set_unavailable(true);
        assert!(cache.refresh().await.is_err());

        assert!(cache.exists());
        assert_eq!(cache.stats(), before);
    }

    #[tokio::test]
    async fn test_exists_after_clear() {
        let repo = duvall();
        let cache = service(&repo);
        cache.refresh().await.unwrap();
        assert!(cache.exists());

        cache.clear();
        assert!(!cache.exists());
        assert_eq!(cache.stats().total_images, 0);
        assert!(cache.stats().built_at.is_none());
        assert_eq!(cache.cached_image_url(1).await, None);
    }

    #[tokio::test]
    async fn test_site_image_ids_unknown_site() {
        let repo = duvall();
        let cache = service(&repo);
        assert!(cache.site_image_ids(1).is_empty());

        cache.refresh().await.unwrap();
        assert!(cache.site_image_ids(999).is_empty());
    }

    #[tokio::test]
    async fn test_random_site_images() {
        let repo = neighborhood();
        let cache = service(&repo);
        cache.refresh().await.unwrap();

        let urls = cache.random_site_images(2, 2).await;
        assert_eq!(urls.len(), 2);
        let expected: HashSet<String> = [3, 4, 5].iter().map(|id| format!("/blobs/key-{id}/{id}.jpg")).collect();
        assert!(urls.iter().all(|url| expected.contains(url)));

        assert_eq!(cache.random_site_images(2, 10).await.len(), 3);
        assert!(cache.random_site_images(42, 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_header_images() {
        let repo = neighborhood();
        let cache = service(&repo);

        let image = cache.header_image("  1020 milwaukee street ").await.unwrap();
        assert_eq!(image.caption, "William J. Kowalke House");
        assert_eq!(image.url, "/blobs/key-3/3.jpg");

        let addresses = vec!["815 Milwaukee Street".to_string(), "1 Nowhere Lane".to_string()];
        let images = cache.header_images(&addresses).await;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].caption, "Duvall House");
    }

    #[tokio::test]
    async fn test_stats_fields() {
        let repo = duvall();
        let cache = service(&repo);

        let empty = cache.stats();
        assert_eq!(empty.total_images, 0);
        assert_eq!(empty.total_sites, 0);
        assert_eq!(empty.cache_key, CACHE_KEY);
        assert!(empty.built_at.is_none());
        assert!(empty.fingerprint.is_none());

        let snapshot = cache.refresh().await.unwrap();
        let stats = cache.stats();
        assert_eq!(stats.built_at, Some(snapshot.built_at().to_rfc3339()));
        assert_eq!(stats.fingerprint, Some(snapshot.fingerprint()));
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let repo = duvall();
        let cache = service(&repo);
        cache.refresh().await.unwrap();

        repo.set_sites(vec![listing(9, None, "805 Dodge Street", &[90])]);
        cache.refresh().await.unwrap();

        assert!(cache.site_image_ids(1).is_empty());
        assert_eq!(cache.site_image_ids(9), vec![90]);
        assert_eq!(cache.stats().total_images, 1);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_rebuilt_on_read() {
        let repo = duvall();
        let cache = service(&repo).with_max_age(Some(Duration::ZERO));
        cache.refresh().await.unwrap();
        assert_eq!(repo.list_calls(), 1);

        cache.random_images(1).await;
        assert_eq!(repo.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_snapshot_served_when_rebuild_fails() {
        let repo = duvall();
        let cache = service(&repo).with_max_age(Some(Duration::ZERO));
        cache.refresh().await.unwrap();

        repo.set_unavailable(true);
        assert_eq!(cache.random_images(5).await.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_taken_mid_import_expires() {
        let repo = Arc::new(FakeRepository::default());
        let cache = service(&repo).with_max_age(Some(Duration::from_millis(200)));

        assert!(cache.random_images(5).await.is_empty());
        assert_eq!(repo.list_calls(), 1);

        repo.set_sites(vec![listing(1, Some("Duvall House"), "815 Milwaukee Street", &[1, 2])]);
        assert!(cache.random_images(5).await.is_empty());
        assert_eq!(repo.list_calls(), 1);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(cache.random_images(5).await.len(), 2);
        assert_eq!(cache.header_image("815 Milwaukee Street").await.unwrap().caption, "Duvall House");
        assert_eq!(repo.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_reads_resolve_urls_in_one_batch() {
        let repo = Arc::new(FakeRepository::with_sites(vec![
            listing(1, Some("Duvall House"), "815 Milwaukee Street", &[1, 2, 3, 4, 5]),
            listing(2, None, "903 Dodge Street", &[6, 7, 8, 9, 10]),
        ]));
        let cache = service(&repo);
        cache.refresh().await.unwrap();

        assert_eq!(cache.random_images(10).await.len(), 10);
        assert_eq!(repo.resolve_batches(), 1);

        assert_eq!(cache.random_site_images(2, 5).await.len(), 5);
        assert_eq!(repo.resolve_batches(), 2);

        let addresses = vec!["815 Milwaukee Street".to_string(), "903 Dodge Street".to_string()];
        assert_eq!(cache.header_images(&addresses).await.len(), 2);
        assert_eq!(repo.resolve_batches(), 3);
    }

    #[tokio::test]
    async fn test_batch_resolution_failure_yields_empty() {
        let repo = duvall();
        let cache = service(&repo);
        cache.refresh().await.unwrap();

        repo.set_resolution_failing(true);
        assert!(cache.random_images(5).await.is_empty());
        assert!(cache.random_site_images(1, 5).await.is_empty());

        repo.set_resolution_failing(false);
        assert_eq!(cache.random_images(5).await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_build() {
        let repo = neighborhood();
        let cache = Arc::new(service(&repo));

        let readers: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.random_images(2).await })
            })
            .collect();

        for reader in readers {
            assert_eq!(reader.await.unwrap().len(), 2);
        }
        assert_eq!(repo.list_calls(), 1);
    }

    #[test]
    fn test_sample_without_replacement() {
        let picked = sample(0..100, 10);
        assert_eq!(picked.len(), 10);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 10);

        assert_eq!(sample(0..3, 10).len(), 3);
        assert!(sample(0..3, 0).is_empty());
    }
}
