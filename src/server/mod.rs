//! HTTP server for the maintenance exporter.
//!
//! This module implements the HTTP server that:
//! - Accepts webhooks from GitHub, validates signatures, and applies the
//!   maintenance flags they carry
//! - Exposes the maintenance gauges for Prometheus
//! - Provides a state inspection endpoint and health checks
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries
//! - `GET /metrics` - Prometheus text exposition
//! - `GET /api/v1/state` - Current maintenance state as JSON
//! - `GET /` and `GET /health` - Liveness

use std::sync::Arc;

use crate::directory::CachedDirectory;
use crate::maintenance::MaintenanceState;
use crate::metrics::Metrics;
use crate::webhooks::WebhookSecret;

pub mod health;
pub mod metrics;
pub mod state;
pub mod webhook;

pub use health::{health_handler, root_handler};
pub use metrics::metrics_handler;
pub use state::state_handler;
pub use webhook::webhook_handler;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    state: Arc<MaintenanceState>,
    directory: Arc<CachedDirectory>,

    /// Webhook secret for HMAC-SHA256 signature verification.
    webhook_secret: WebhookSecret,
}

impl AppState {
    pub fn new(
        state: Arc<MaintenanceState>,
        directory: Arc<CachedDirectory>,
        webhook_secret: WebhookSecret,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                state,
                directory,
                webhook_secret,
            }),
        }
    }

    pub fn state(&self) -> &MaintenanceState {
        &self.inner.state
    }

    pub fn directory(&self) -> &CachedDirectory {
        &self.inner.directory
    }

    pub fn metrics(&self) -> &Metrics {
        self.inner.state.metrics()
    }

    pub fn webhook_secret(&self) -> &WebhookSecret {
        &self.inner.webhook_secret
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/", get(root_handler))
        .route("/webhook", post(webhook_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/state", get(state_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
