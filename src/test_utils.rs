//! Shared test utilities, fake directories, and arbitrary generators for
//! property-based testing.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;

use crate::directory::{DirectoryError, SiteDirectory, SiteMap, SiteSource};
use crate::maintenance::IssueSet;
use crate::persistence::MaintenanceSnapshot;
use crate::types::IssueId;

pub fn arb_issue_id() -> impl Strategy<Value = IssueId> {
    (1u64..10_000).prop_map(IssueId::from)
}

pub fn arb_issue_set() -> impl Strategy<Value = IssueSet> {
    prop::collection::btree_set(arb_issue_id(), 1..4).prop_map(|s| s.into_iter().collect())
}

/// Snapshots that satisfy the registry invariants: canonical machine keys
/// and no empty issue sets.
pub fn arb_snapshot() -> impl Strategy<Value = MaintenanceSnapshot> {
    let machines = prop::collection::btree_map("mlab[1-4]-[a-z]{3}[0-9]{2}", arb_issue_set(), 0..8);
    let sites = prop::collection::btree_map("[a-z]{3}[0-9]{2}", arb_issue_set(), 0..4);
    (machines, sites).prop_map(|(machines, sites)| MaintenanceSnapshot { machines, sites })
}

/// Builds a site map from `(site, machines)` pairs.
pub fn site_map(entries: &[(&str, &[&str])]) -> SiteMap {
    entries
        .iter()
        .map(|(site, machines)| {
            (
                site.to_string(),
                machines.iter().map(|m| m.to_string()).collect(),
            )
        })
        .collect()
}

/// A [`SiteSource`] that always returns the same map and counts fetches.
#[derive(Debug, Clone)]
pub struct StaticSource {
    sites: SiteMap,
    calls: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn new(sites: SiteMap) -> Self {
        StaticSource {
            sites,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SiteSource for StaticSource {
    async fn site_machines(&self) -> Result<SiteMap, DirectoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.sites.clone())
    }
}

/// A [`SiteSource`] whose fetches always fail.
#[derive(Debug, Clone, Copy)]
pub struct FailingSource;

impl SiteSource for FailingSource {
    async fn site_machines(&self) -> Result<SiteMap, DirectoryError> {
        Err(DirectoryError::Empty)
    }
}

/// A directory where every site has four machines, except:
///
/// - `vir01` has only `mlab1`
/// - `odd02` has `mlab2` and `mlab3`
/// - sites registered with [`FakeDirectory::with_unknown`] don't exist
#[derive(Debug, Default)]
pub struct FakeDirectory {
    unknown: HashSet<String>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unknown(mut self, site: &str) -> Self {
        self.unknown.insert(site.to_string());
        self
    }
}

impl SiteDirectory for FakeDirectory {
    fn machines(&self, site: &str) -> Result<Vec<String>, DirectoryError> {
        if self.unknown.contains(site) {
            return Err(DirectoryError::UnknownSite(site.to_string()));
        }
        let machines: &[&str] = match site {
            "vir01" => &["mlab1"],
            "odd02" => &["mlab2", "mlab3"],
            _ => &["mlab1", "mlab2", "mlab3", "mlab4"],
        };
        Ok(machines.iter().map(|m| m.to_string()).collect())
    }
}
