//! Persistence layer for the maintenance registry.
//!
//! The whole registry is small, so it is persisted as one JSON snapshot
//! that is replaced after every change. There is no event log: the file
//! only ever holds the current state.
//!
//! # Crash Safety
//!
//! - Snapshots: Written atomically using write-to-temp-then-rename
//! - Both the file and its directory are fsynced before a write reports success

pub mod snapshot;

pub use snapshot::{MaintenanceSnapshot, SnapshotError, load_snapshot, save_snapshot_atomic};
