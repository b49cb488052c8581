//! Prometheus metrics exported by the service.
//!
//! Each process owns one [`Metrics`] value with its own registry; nothing is
//! registered globally. The gauges are write-only from the engine's point
//! of view and are read back only by the `/metrics` scrape.

use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::types::{Action, MachineName, Project};

/// Gauges and counters for maintenance status and internal errors.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    machine: GaugeVec,
    site: GaugeVec,
    errors: IntCounterVec,
}

impl Metrics {
    /// Creates the metric families and registers them in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let machine = GaugeVec::new(
            Opts::new(
                "gmx_machine_maintenance",
                "Whether a machine is in maintenance mode or not.",
            ),
            &["machine", "node", "site"],
        )?;
        let site = GaugeVec::new(
            Opts::new(
                "gmx_site_maintenance",
                "Whether a site is in maintenance mode or not.",
            ),
            &["site"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("gmx_error_count", "Count of errors."),
            &["type", "function"],
        )?;

        registry.register(Box::new(machine.clone()))?;
        registry.register(Box::new(site.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        Ok(Metrics {
            registry,
            machine,
            site,
            errors,
        })
    }

    /// Sets the machine gauge. The `machine` and `node` labels both carry the
    /// fully-qualified name; `site` carries the derived site.
    pub fn set_machine(&self, machine: &MachineName, project: Project, action: Action) {
        let label = machine.fqdn(project);
        self.machine
            .with_label_values(&[&label, &label, machine.site()])
            .set(action.status_value());
    }

    pub fn set_site(&self, site: &str, action: Action) {
        self.site
            .with_label_values(&[site])
            .set(action.status_value());
    }

    /// Counts an error of the given type raised in `function`.
    pub fn record_error(&self, kind: &str, function: &str) {
        self.errors.with_label_values(&[kind, function]).inc();
    }

    /// Renders every registered family in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    #[cfg(test)]
    pub(crate) fn machine_status(&self, machine: &MachineName, project: Project) -> f64 {
        let label = machine.fqdn(project);
        self.machine
            .with_label_values(&[&label, &label, machine.site()])
            .get()
    }

    #[cfg(test)]
    pub(crate) fn site_status(&self, site: &str) -> f64 {
        self.site.with_label_values(&[site]).get()
    }

    #[cfg(test)]
    pub(crate) fn error_count(&self, kind: &str, function: &str) -> u64 {
        self.errors.with_label_values(&[kind, function]).get()
    }
}
