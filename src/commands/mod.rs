//! Maintenance flags in issue and comment text.
//!
//! Operators put entities into maintenance by writing flags into the body of
//! an issue or a comment on it. The issue number is what holds the entity in
//! maintenance; closing the issue releases everything it flagged.
//!
//! # Supported Flags
//!
//! - `/site <site>` - puts the site and all of its machines into maintenance
//! - `/site <site> del` - takes them out again
//! - `/machine <machine>` - puts one machine into maintenance
//! - `/machine <machine> del` - takes it out again
//!
//! Machine names may be written `mlab1.abc02` or `mlab1-abc02`.
//!
//! # Example
//!
//! ```
//! use github_maintenance_exporter::commands::{Command, parse_commands};
//! use github_maintenance_exporter::types::{Action, Project};
//!
//! let body = "Power work at /site abc02 this weekend.";
//! assert_eq!(
//!     parse_commands(body, Project::Oti),
//!     vec![Command::site("abc02", Action::EnterMaintenance)]
//! );
//! ```

mod parser;
mod types;

pub use parser::parse_commands;
pub use types::{Command, Target};

use tracing::info;

use crate::maintenance::MaintenanceState;
use crate::types::IssueId;

/// Parses `text` and applies every flag in it on behalf of `issue`.
///
/// Returns the total number of registry modifications.
pub fn apply_message(state: &MaintenanceState, text: &str, issue: &IssueId) -> usize {
    parse_commands(text, state.project())
        .iter()
        .map(|command| {
            info!(flag = ?command.target, action = %command.action, %issue, "Flag found");
            command.apply(state, issue)
        })
        .sum()
}
