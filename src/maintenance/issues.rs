//! The set of issues holding one entity in maintenance.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::IssueId;

/// Issues that currently hold an entity in maintenance.
///
/// Serialised as a JSON array. Duplicates in a hand-edited snapshot
/// collapse on load; the sorted order keeps written snapshots stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueSet(BTreeSet<IssueId>);

impl IssueSet {
    pub fn new() -> Self {
        IssueSet(BTreeSet::new())
    }

    /// Adds `issue`, returning `false` if it was already present.
    pub fn insert(&mut self, issue: IssueId) -> bool {
        self.0.insert(issue)
    }

    /// Removes `issue`, returning `false` if it was not present.
    pub fn remove(&mut self, issue: &IssueId) -> bool {
        self.0.remove(issue)
    }

    pub fn contains(&self, issue: &IssueId) -> bool {
        self.0.contains(issue)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IssueId> {
        self.0.iter()
    }
}

impl FromIterator<IssueId> for IssueSet {
    fn from_iter<I: IntoIterator<Item = IssueId>>(iter: I) -> Self {
        IssueSet(iter.into_iter().collect())
    }
}

impl Extend<IssueId> for IssueSet {
    fn extend<I: IntoIterator<Item = IssueId>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for IssueSet {
    type Item = IssueId;
    type IntoIter = std::collections::btree_set::IntoIter<IssueId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
