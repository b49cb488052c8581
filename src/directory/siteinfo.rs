//! HTTP client for the siteinfo site-machines document.
//!
//! The document is a single JSON object mapping each site to its machines:
//!
//! ```text
//! {
//!     "abc02": ["mlab1", "mlab2", "mlab3", "mlab4"],
//!     "xyz02": ["mlab1"]
//! }
//! ```

use std::time::Duration;

use tracing::debug;

use super::{DirectoryError, SiteMap, SiteSource};
use crate::types::Project;

/// Upper bound on one siteinfo fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Fetches the site map for one project over HTTPS.
#[derive(Debug, Clone)]
pub struct SiteinfoClient {
    http: reqwest::Client,
    url: String,
}

impl SiteinfoClient {
    /// Creates a client for the document at `url`.
    pub fn new(url: impl Into<String>) -> Result<Self, DirectoryError> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(SiteinfoClient {
            http,
            url: url.into(),
        })
    }

    /// Creates a client for the project's default siteinfo endpoint.
    pub fn for_project(project: Project) -> Result<Self, DirectoryError> {
        Self::new(project.siteinfo_url())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SiteSource for SiteinfoClient {
    async fn site_machines(&self) -> Result<SiteMap, DirectoryError> {
        debug!(url = %self.url, "Fetching siteinfo data");
        let body = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        parse_site_machines(&body)
    }
}

/// Decodes a site-machines document.
///
/// An empty document is rejected: swapping it in would make every tracked
/// site look retired to the next prune.
pub fn parse_site_machines(body: &[u8]) -> Result<SiteMap, DirectoryError> {
    let sites: SiteMap = serde_json::from_slice(body)?;
    if sites.is_empty() {
        return Err(DirectoryError::Empty);
    }
    Ok(sites)
}
