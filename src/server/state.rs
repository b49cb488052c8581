//! State inspection endpoint for observability.
//!
//! Provides a read-only view of the maintenance registry and the directory
//! it consults, for debugging.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::persistence::MaintenanceSnapshot;
use crate::types::Project;

/// Body of `GET /api/v1/state`.
#[derive(Debug, Serialize)]
pub struct StateView {
    pub project: &'static str,

    /// The registry, in the same shape as the snapshot file.
    #[serde(flatten)]
    pub maintenance: MaintenanceSnapshot,

    /// Number of sites the directory currently knows.
    pub directory_sites: usize,

    /// When the directory was last refreshed, if ever.
    pub directory_refreshed_at: Option<DateTime<Utc>>,
}

/// State inspection handler.
///
/// ```ignore
/// GET /api/v1/state HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// {
///   "project": "mlab-oti",
///   "Machines": { "mlab1-abc02": ["8"] },
///   "Sites": { "abc02": ["8"] },
///   "directory_sites": 412,
///   "directory_refreshed_at": "2026-01-15T12:00:00Z"
/// }
/// ```
pub async fn state_handler(State(app_state): State<AppState>) -> Json<StateView> {
    let project: Project = app_state.state().project();
    Json(StateView {
        project: project.as_str(),
        maintenance: app_state.state().snapshot(),
        directory_sites: app_state.directory().len(),
        directory_refreshed_at: app_state.directory().refreshed_at(),
    })
}
