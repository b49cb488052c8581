//! Entity naming: machines, sites and what can happen to them.
//!
//! A machine is named `<node>-<site>` (e.g. `mlab1-abc02`). The site of a
//! machine is everything after the first separator, which makes
//! [`MachineName::new`] and [`MachineName::parse`] exact inverses.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ids::Project;

/// Separator between node and site in the canonical machine name.
pub const MACHINE_SEPARATOR: char = '-';

/// What a maintenance flag asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    EnterMaintenance,
    LeaveMaintenance,
}

impl Action {
    /// Gauge reading for an entity after this action: 1 while in
    /// maintenance, 0 otherwise.
    pub fn status_value(self) -> f64 {
        match self {
            Action::EnterMaintenance => 1.0,
            Action::LeaveMaintenance => 0.0,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::EnterMaintenance => f.write_str("enter"),
            Action::LeaveMaintenance => f.write_str("leave"),
        }
    }
}

/// Which of the two registry maps an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Machine,
    Site,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Machine => "machine",
            EntityKind::Site => "site",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A machine name that does not decompose into node and site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    #[error("machine name {0:?} has no node/site separator")]
    MissingSeparator(String),

    #[error("machine name {0:?} has an empty node or site")]
    EmptyComponent(String),

    #[error("machine name {0:?} has a malformed site")]
    MalformedSite(String),
}

/// A machine identity, split into its short node id and its site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineName {
    node: String,
    site: String,
}

impl MachineName {
    /// Composes a machine name from a directory entry, e.g. `("mlab1", "abc02")`.
    pub fn new(node: impl Into<String>, site: impl Into<String>) -> Self {
        MachineName {
            node: node.into(),
            site: site.into(),
        }
    }

    /// Parses `mlab1-abc02` or the dotted form `mlab1.abc02`.
    ///
    /// The node is the text before the first separator and the site is the
    /// rest. Neither may be empty and the site may not contain a dot, so
    /// the metric label built by [`MachineName::fqdn`] stays unambiguous.
    pub fn parse(name: &str) -> Result<Self, EntityError> {
        let (node, site) = name
            .split_once(['-', '.'])
            .ok_or_else(|| EntityError::MissingSeparator(name.to_string()))?;

        if node.is_empty() || site.is_empty() {
            return Err(EntityError::EmptyComponent(name.to_string()));
        }
        if site.contains('.') {
            return Err(EntityError::MalformedSite(name.to_string()));
        }

        Ok(MachineName::new(node, site))
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    /// Fully-qualified metric label, e.g. `mlab1-abc02.mlab-oti.measurement-lab.org`.
    pub fn fqdn(&self, project: Project) -> String {
        format!("{}.{}", self, project.domain_suffix())
    }
}

impl fmt::Display for MachineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.node, MACHINE_SEPARATOR, self.site)
    }
}
