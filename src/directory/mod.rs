//! The site directory: which machines belong to which site.
//!
//! The registry asks the directory for a site's machines every time it fans
//! out a site-level action and every time it prunes. The directory is the
//! authority on whether a site exists at all.
//!
//! - [`SiteDirectory`] is the synchronous lookup the registry uses.
//! - [`SiteSource`] fetches a complete site map from somewhere remote.
//! - [`CachedDirectory`] holds the latest map from a source, behind its own lock.
//! - [`refresh`] reloads the cache on a memoryless schedule and prunes afterwards.

use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;

pub mod cache;
pub mod refresh;
pub mod siteinfo;

pub use cache::CachedDirectory;
pub use refresh::{ReloadSchedule, run_refresh_loop};
pub use siteinfo::{SiteinfoClient, parse_site_machines};

/// Site name to the short ids of its machines (`mlab1`, `mlab2`, ...).
pub type SiteMap = HashMap<String, Vec<String>>;

/// Errors from directory lookups and refreshes.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The site is not (or no longer) in the directory.
    #[error("site not found: {0}")]
    UnknownSite(String),

    /// The siteinfo request failed.
    #[error("siteinfo request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The siteinfo document is not a site-to-machines map.
    #[error("siteinfo document is malformed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The siteinfo document lists no sites at all.
    #[error("siteinfo document contains no sites")]
    Empty,
}

/// Resolves a site to its current machines.
pub trait SiteDirectory: Send + Sync {
    /// Returns the short machine ids of `site`, or
    /// [`DirectoryError::UnknownSite`] if the directory doesn't know it.
    fn machines(&self, site: &str) -> Result<Vec<String>, DirectoryError>;
}

/// Fetches the complete site map from an authoritative source.
pub trait SiteSource {
    fn site_machines(&self) -> impl Future<Output = Result<SiteMap, DirectoryError>> + Send;
}
