//! The maintenance state engine.
//!
//! Tracks which machines and sites are in maintenance and under which
//! issues. An entity stays in maintenance until every issue that put it
//! there has been retracted or closed. Site-level actions fan out to every
//! machine the site directory currently lists for the site.
//!
//! # Operations
//!
//! | operation | effect |
//! |-----------|--------|
//! | [`MaintenanceState::update_machine`] | enter/leave one machine |
//! | [`MaintenanceState::update_site`] | enter/leave a site and all its machines |
//! | [`MaintenanceState::close_issue`] | retract an issue from every entity |
//! | [`MaintenanceState::prune`] | drop entities at sites the directory no longer knows |
//! | [`MaintenanceState::write`] / [`MaintenanceState::restore`] | snapshot I/O |
//!
//! The mutating operations return how many entity/issue memberships they
//! changed. Callers persist with `write()` when that count is non-zero;
//! `prune()` persists on its own.

use std::path::PathBuf;

use thiserror::Error;

use crate::persistence::SnapshotError;

pub mod issues;
mod registry;
pub mod state;

pub use issues::IssueSet;
pub use state::MaintenanceState;

/// Errors from snapshot persistence.
#[derive(Debug, Error)]
pub enum StateError {
    /// The snapshot could not be read or decoded. The registry is unchanged.
    #[error("failed to restore state from {}: {source}", .path.display())]
    Restore {
        path: PathBuf,
        source: SnapshotError,
    },

    /// The snapshot could not be written. The in-memory registry keeps the
    /// change; the file is stale until the next successful write.
    #[error("failed to write state to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: SnapshotError,
    },
}
