//! The on-disk maintenance snapshot.
//!
//! # File Format
//!
//! ```text
//! {
//!     "Machines": { "mlab1-abc02": ["3"] },
//!     "Sites": { "abc02": ["3"] }
//! }
//! ```
//!
//! Keys are written in sorted order so that identical states produce
//! identical files.
//!
//! # Atomic Writes
//!
//! Snapshots replace the previous file using write-to-temp-then-rename:
//! 1. Write to `<path>.tmp`
//! 2. fsync the file
//! 3. Rename to `<path>`
//! 4. fsync the directory
//!
//! A reader therefore sees either the old or the new snapshot, never a
//! partial write.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::maintenance::IssueSet;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SnapshotError {
    /// Short label for the error counter, e.g. `readfile` or `unmarshaljson`.
    pub fn kind(&self, writing: bool) -> &'static str {
        match (self, writing) {
            (SnapshotError::Io(_), false) => "readfile",
            (SnapshotError::Io(_), true) => "writefile",
            (SnapshotError::Json(_), false) => "unmarshaljson",
            (SnapshotError::Json(_), true) => "marshaljson",
        }
    }
}

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Everything the exporter persists: which issues hold which entity.
///
/// An entity with no open issues has no entry at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceSnapshot {
    /// Machine name (`mlab1-abc02`) to issues.
    #[serde(rename = "Machines", default)]
    pub machines: BTreeMap<String, IssueSet>,

    /// Site name (`abc02`) to issues.
    #[serde(rename = "Sites", default)]
    pub sites: BTreeMap<String, IssueSet>,
}

impl MaintenanceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing is in maintenance.
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty() && self.sites.is_empty()
    }
}

/// Saves a snapshot atomically to disk.
///
/// The temp file is removed again if it can't be written or renamed into
/// place.
///
/// # Errors
///
/// Returns an error if `path` has no file name or any IO operation fails.
pub fn save_snapshot_atomic(path: &Path, snapshot: &MaintenanceSnapshot) -> Result<()> {
    if path.file_name().is_none() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("snapshot path {:?} has no file name", path),
        )
        .into());
    }

    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)?;

    let tmp_path = temp_path(path);
    let bytes = serde_json::to_vec_pretty(snapshot)?;

    let replaced = write_synced(&tmp_path, &bytes).and_then(|()| std::fs::rename(&tmp_path, path));
    if let Err(e) = replaced {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    sync_dir(dir)?;

    Ok(())
}

/// Loads a snapshot from disk.
///
/// # Errors
///
/// Returns an error if the file can't be read or the JSON doesn't have the
/// snapshot's shape.
pub fn load_snapshot(path: &Path) -> Result<MaintenanceSnapshot> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `<path>.tmp`, next to the snapshot so the rename stays on one filesystem.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes `bytes` to a fresh file at `path` and syncs it to disk.
fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Syncs a directory so a rename inside it survives power loss.
fn sync_dir(dir: &Path) -> io::Result<()> {
    OpenOptions::new().read(true).open(dir)?.sync_all()
}

/// The directory holding `path`; `.` for a bare file name.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::arb_snapshot;
    use crate::types::IssueId;
    use proptest::prelude::*;
    use tempfile::tempdir;

    proptest! {
        /// Atomic save and load roundtrip preserves all data.
        #[test]
        fn atomic_save_load_roundtrip(snapshot in arb_snapshot()) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("gmx-state");

            save_snapshot_atomic(&path, &snapshot).unwrap();
            let loaded = load_snapshot(&path).unwrap();

            prop_assert_eq!(snapshot, loaded);
            prop_assert!(!temp_path(&path).exists(), "Temp file should be cleaned up");
        }

        /// Equal states always produce byte-identical files.
        #[test]
        fn serialisation_is_deterministic(snapshot in arb_snapshot()) {
            let first = serde_json::to_vec_pretty(&snapshot).unwrap();
            let second = serde_json::to_vec_pretty(&snapshot.clone()).unwrap();
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn reads_the_documented_format() {
        let json = r#"{
            "Machines": { "mlab1-uvw03": ["4", "11"] },
            "Sites": { "uvw03": ["4", "11"] }
        }"#;

        let snapshot: MaintenanceSnapshot = serde_json::from_str(json).unwrap();

        let issues = &snapshot.machines["mlab1-uvw03"];
        assert!(issues.contains(&IssueId::from(4)));
        assert!(issues.contains(&IssueId::from(11)));
        assert_eq!(snapshot.sites.len(), 1);
    }

    #[test]
    fn missing_maps_default_to_empty() {
        let snapshot: MaintenanceSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn load_nonexistent_returns_io_error() {
        let dir = tempdir().unwrap();
        let result = load_snapshot(&dir.path().join("nonexistent.json"));
        assert!(matches!(result, Err(SnapshotError::Io(_))));
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.json");
        std::fs::write(&path, "This is not json").unwrap();

        assert!(matches!(load_snapshot(&path), Err(SnapshotError::Json(_))));
    }

    #[test]
    fn load_wrong_value_types_returns_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wrong.json");
        std::fs::write(&path, r#"{"Machines": {"mlab1-abc01": "1"}, "Sites": {}}"#).unwrap();

        assert!(matches!(load_snapshot(&path), Err(SnapshotError::Json(_))));
    }

    #[test]
    fn save_rejects_empty_path() {
        let result = save_snapshot_atomic(Path::new(""), &MaintenanceSnapshot::new());
        assert!(matches!(result, Err(SnapshotError::Io(_))));
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gmx-state");
        std::fs::create_dir_all(path.join("blocker")).unwrap();

        let result = save_snapshot_atomic(&path, &MaintenanceSnapshot::new());

        assert!(matches!(result, Err(SnapshotError::Io(_))));
        assert!(!temp_path(&path).exists());
        assert!(path.join("blocker").is_dir());
    }

    #[test]
    fn sync_dir_fails_on_missing_directory() {
        let dir = tempdir().unwrap();
        assert!(sync_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/gmx-state");

        save_snapshot_atomic(&path, &MaintenanceSnapshot::new()).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gmx-state");

        let mut snapshot = MaintenanceSnapshot::new();
        snapshot
            .sites
            .insert("abc02".to_string(), [IssueId::from(3)].into_iter().collect());
        save_snapshot_atomic(&path, &snapshot).unwrap();
        save_snapshot_atomic(&path, &MaintenanceSnapshot::new()).unwrap();

        assert!(load_snapshot(&path).unwrap().is_empty());
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/tmp/gmx-state")),
            PathBuf::from("/tmp/gmx-state.tmp")
        );
        assert_eq!(parent_dir(Path::new("state.json")), Path::new("."));
    }
}
