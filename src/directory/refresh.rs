//! Periodic reload of the site directory.
//!
//! Reload times are drawn from an exponential distribution so that many
//! exporter replicas don't hit siteinfo in lockstep. Each draw is clamped to
//! a configured window. After every successful reload the registry is
//! pruned of sites that no longer exist; a failed reload keeps the previous
//! map and skips the prune.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{CachedDirectory, SiteSource};
use crate::maintenance::MaintenanceState;

/// The reload window is not ordered `min <= expected <= max`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("reload schedule must satisfy min ({min:?}) <= expected ({expected:?}) <= max ({max:?})")]
pub struct ScheduleError {
    pub min: Duration,
    pub expected: Duration,
    pub max: Duration,
}

/// Memoryless reload schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSchedule {
    min: Duration,
    expected: Duration,
    max: Duration,
}

impl ReloadSchedule {
    pub fn new(min: Duration, expected: Duration, max: Duration) -> Result<Self, ScheduleError> {
        if min > expected || expected > max {
            return Err(ScheduleError { min, expected, max });
        }
        Ok(ReloadSchedule { min, expected, max })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn expected(&self) -> Duration {
        self.expected
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draws the wait before the next reload: exponential with mean
    /// `expected`, clamped to `[min, max]`.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let u: f64 = rng.r#gen();
        let secs = self.expected.as_secs_f64() * (1.0 - u).ln().abs();
        let delay = if secs.is_finite() {
            Duration::try_from_secs_f64(secs).unwrap_or(self.max)
        } else {
            self.max
        };
        delay.clamp(self.min, self.max)
    }
}

/// Reloads `directory` from `source` on `schedule` until `shutdown` fires,
/// pruning `state` after each successful reload.
pub async fn run_refresh_loop<S: SiteSource>(
    directory: Arc<CachedDirectory>,
    source: S,
    state: Arc<MaintenanceState>,
    schedule: ReloadSchedule,
    shutdown: CancellationToken,
) {
    let mut rng = StdRng::from_entropy();
    info!(
        min = ?schedule.min,
        expected = ?schedule.expected,
        max = ?schedule.max,
        "Starting siteinfo refresh loop"
    );

    loop {
        let delay = schedule.next_delay(&mut rng);
        debug!(?delay, "Waiting before next siteinfo reload");

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        match directory.reload(&source).await {
            Ok(_) => {
                let pruner = state.clone();
                match tokio::task::spawn_blocking(move || pruner.prune()).await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "Pruned retired entities after siteinfo reload"),
                    Err(e) => {
                        error!(error = %e, "Prune task failed");
                        state.metrics().record_error("prune", "run_refresh_loop");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to reload siteinfo data, keeping previous map");
                state.metrics().record_error("reload", "run_refresh_loop");
            }
        }
    }

    info!("Siteinfo refresh loop stopped");
}
