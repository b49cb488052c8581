//! In-memory copy of the latest site map.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::info;

use super::{DirectoryError, SiteDirectory, SiteMap, SiteSource};

#[derive(Debug, Default)]
struct Cache {
    sites: SiteMap,
    refreshed_at: Option<DateTime<Utc>>,
}

/// A [`SiteDirectory`] answering from the last successfully loaded map.
///
/// The lock here is independent of the registry lock. The registry may read
/// the directory while holding its own lock; the directory never touches the
/// registry.
#[derive(Debug, Default)]
pub struct CachedDirectory {
    inner: RwLock<Cache>,
}

impl CachedDirectory {
    /// Creates an empty directory that recognises no sites.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory preloaded with `sites`.
    pub fn from_sites(sites: SiteMap) -> Self {
        let directory = Self::new();
        directory.replace(sites);
        directory
    }

    /// Swaps in a new site map wholesale.
    pub fn replace(&self, sites: SiteMap) {
        let mut cache = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        cache.sites = sites;
        cache.refreshed_at = Some(Utc::now());
    }

    /// Fetches a fresh map from `source` and swaps it in.
    ///
    /// The fetch happens without holding the lock. On failure the previous
    /// map stays in place. Returns the number of sites loaded.
    pub async fn reload<S: SiteSource>(&self, source: &S) -> Result<usize, DirectoryError> {
        let sites = source.site_machines().await?;
        let count = sites.len();
        self.replace(sites);
        info!(sites = count, "Successfully [re]loaded the siteinfo data");
        Ok(count)
    }

    /// When the map was last replaced, if ever.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refreshed_at
    }

    /// Number of sites currently known.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sites
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SiteDirectory for CachedDirectory {
    fn machines(&self, site: &str) -> Result<Vec<String>, DirectoryError> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sites
            .get(site)
            .cloned()
            .ok_or_else(|| DirectoryError::UnknownSite(site.to_string()))
    }
}
