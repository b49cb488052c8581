//! Command types for maintenance flags.
//!
//! These commands are parsed from GitHub issue bodies and issue comments.

use crate::maintenance::MaintenanceState;
use crate::types::{Action, IssueId, MachineName};

/// What a flag names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `/machine mlab1.abc02`
    Machine(MachineName),

    /// `/site abc02`
    Site(String),
}

/// One parsed maintenance flag: `/site <name> [del]` or
/// `/machine <name> [del]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub target: Target,
    pub action: Action,
}

impl Command {
    pub fn site(name: impl Into<String>, action: Action) -> Self {
        Command {
            target: Target::Site(name.into()),
            action,
        }
    }

    pub fn machine(name: MachineName, action: Action) -> Self {
        Command {
            target: Target::Machine(name),
            action,
        }
    }

    /// Applies the command to `state` on behalf of `issue`, returning the
    /// number of modifications the registry made.
    pub fn apply(&self, state: &MaintenanceState, issue: &IssueId) -> usize {
        match &self.target {
            Target::Machine(name) => state.update_machine(&name.to_string(), self.action, issue),
            Target::Site(site) => state.update_site(site, self.action, issue),
        }
    }
}
