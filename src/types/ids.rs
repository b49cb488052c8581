//! Newtype wrappers for domain identifiers.
//!
//! Issue numbers and project names travel through the webhook layer, the
//! registry and the snapshot file. Wrapping them keeps an issue number from
//! being passed where an entity name is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A GitHub issue identifier.
///
/// Only compared for equality. Stored as the textual issue number so the
/// snapshot file keeps the `["3", "11"]` shape.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(pub String);

impl IssueId {
    pub fn new(s: impl Into<String>) -> Self {
        IssueId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for IssueId {
    fn from(n: u64) -> Self {
        IssueId(n.to_string())
    }
}

impl From<&str> for IssueId {
    fn from(s: &str) -> Self {
        IssueId(s.to_string())
    }
}

impl From<String> for IssueId {
    fn from(s: String) -> Self {
        IssueId(s)
    }
}

/// Returned when a project name is not one of the known deployments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown project: {0:?}")]
pub struct UnknownProject(pub String);

/// The deployment this exporter runs in.
///
/// The project decides the metric domain suffix, the siteinfo endpoint and
/// which machine/site names the command parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Project {
    Sandbox,
    Staging,
    Oti,
}

impl Project {
    pub const ALL: [Project; 3] = [Project::Sandbox, Project::Staging, Project::Oti];

    pub fn as_str(self) -> &'static str {
        match self {
            Project::Sandbox => "mlab-sandbox",
            Project::Staging => "mlab-staging",
            Project::Oti => "mlab-oti",
        }
    }

    /// Domain appended to a machine name to build its metric label,
    /// e.g. `mlab-oti.measurement-lab.org`.
    pub fn domain_suffix(self) -> String {
        format!("{}.measurement-lab.org", self.as_str())
    }

    /// Default location of the site-machines document for this project.
    pub fn siteinfo_url(self) -> String {
        format!(
            "https://siteinfo.{}.measurementlab.net/v2/sites/site-machines.json",
            self.as_str()
        )
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Project {
    type Err = UnknownProject;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Project::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownProject(s.to_string()))
    }
}
