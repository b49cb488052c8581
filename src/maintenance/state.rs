//! The locked maintenance registry and its snapshot file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use super::StateError;
use super::issues::IssueSet;
use super::registry::update_entry;
use crate::directory::SiteDirectory;
use crate::metrics::Metrics;
use crate::persistence::{MaintenanceSnapshot, load_snapshot, save_snapshot_atomic};
use crate::types::{Action, EntityKind, IssueId, MachineName, Project};

/// Machine and site maintenance state, shared by every request handler.
///
/// One mutex guards both maps and the snapshot file: no two mutations
/// interleave and no mutation runs while the snapshot is being written.
/// Directory lookups happen under this lock but only read the directory's
/// in-memory map.
pub struct MaintenanceState {
    entries: Mutex<MaintenanceSnapshot>,
    path: PathBuf,
    directory: Arc<dyn SiteDirectory>,
    metrics: Metrics,
    project: Project,
}

impl MaintenanceState {
    /// Creates an empty registry persisted at `path`.
    pub fn new(
        path: impl Into<PathBuf>,
        directory: Arc<dyn SiteDirectory>,
        metrics: Metrics,
        project: Project,
    ) -> Self {
        MaintenanceState {
            entries: Mutex::new(MaintenanceSnapshot::new()),
            path: path.into(),
            directory,
            metrics,
            project,
        }
    }

    /// Creates a registry and restores it from `path`.
    ///
    /// A missing or unreadable snapshot is not fatal: the registry starts
    /// empty and the failure is logged and counted.
    pub fn open(
        path: impl Into<PathBuf>,
        directory: Arc<dyn SiteDirectory>,
        metrics: Metrics,
        project: Project,
    ) -> Self {
        let state = Self::new(path, directory, metrics, project);
        if let Err(e) = state.restore() {
            warn!(error = %e, "Starting with an empty maintenance state");
            state.metrics.record_error("restore", "MaintenanceState::open");
        }
        state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn project(&self) -> Project {
        self.project
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// A copy of the current maps.
    pub fn snapshot(&self) -> MaintenanceSnapshot {
        self.lock().clone()
    }

    /// Puts one machine into or takes it out of maintenance for `issue`.
    ///
    /// `machine` may use either `mlab1-abc02` or `mlab1.abc02`. A name that
    /// doesn't decompose into node and site changes nothing.
    pub fn update_machine(&self, machine: &str, action: Action, issue: &IssueId) -> usize {
        let name = match MachineName::parse(machine) {
            Ok(name) => name,
            Err(e) => {
                warn!(machine, error = %e, "Ignoring malformed machine name");
                return 0;
            }
        };
        let mut entries = self.lock();
        self.apply_machine(&mut entries, &name, action, issue)
    }

    /// Puts a site and every machine the directory lists for it into or out
    /// of maintenance for `issue`.
    ///
    /// If the directory doesn't know the site, nothing is touched and 0 is
    /// returned.
    pub fn update_site(&self, site: &str, action: Action, issue: &IssueId) -> usize {
        let mut entries = self.lock();
        self.apply_site(&mut entries, site, action, issue)
    }

    /// Retracts `issue` from every site and then every machine.
    ///
    /// Walks copies of the key sets taken at the start, so fan-out removals
    /// during the site pass neither skip nor revisit machines.
    pub fn close_issue(&self, issue: &IssueId) -> usize {
        let mut entries = self.lock();
        let sites: Vec<String> = entries.sites.keys().cloned().collect();
        let machines: Vec<String> = entries.machines.keys().cloned().collect();

        let mut mods = 0;
        for site in &sites {
            mods += self.apply_site(&mut entries, site, Action::LeaveMaintenance, issue);
        }
        for machine in &machines {
            let Ok(name) = MachineName::parse(machine) else {
                continue;
            };
            mods += self.apply_machine(&mut entries, &name, Action::LeaveMaintenance, issue);
        }

        info!(%issue, mods, "Closed issue");
        mods
    }

    /// Drops every site the directory no longer recognises, with its
    /// machines, and every machine whose site is unrecognised, regardless
    /// of the issues holding them.
    ///
    /// Writes the snapshot if anything was removed. Returns the number of
    /// entities removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.lock();
        let mut removed = 0;

        let sites: Vec<String> = entries.sites.keys().cloned().collect();
        for site in sites {
            if self.directory.machines(&site).is_ok() {
                continue;
            }
            entries.sites.remove(&site);
            self.metrics.set_site(&site, Action::LeaveMaintenance);
            removed += 1;
            removed += self.remove_machines(&mut entries, |name| name.site() == site);
            info!(site = %site, "Removed site from maintenance because it no longer exists");
        }

        removed += self.remove_machines(&mut entries, |name| {
            self.directory.machines(name.site()).is_err()
        });

        if removed > 0 {
            if let Err(e) = self.write_locked(&entries) {
                warn!(error = %e, removed, "Pruned state could not be persisted");
            }
        } else {
            debug!("Nothing to prune");
        }
        removed
    }

    /// Writes the full state to the snapshot file.
    pub fn write(&self) -> Result<(), StateError> {
        let entries = self.lock();
        self.write_locked(&entries)
    }

    /// Replaces the registry with the snapshot file's contents and sets the
    /// gauges to match.
    ///
    /// On error the registry is left as it was. Gauges of entities that are
    /// no longer present after a successful restore are cleared.
    pub fn restore(&self) -> Result<(), StateError> {
        let mut entries = self.lock();
        let loaded = load_snapshot(&self.path).map_err(|source| {
            error!(path = %self.path.display(), error = %source, "Failed to load state");
            self.metrics
                .record_error(source.kind(false), "MaintenanceState::restore");
            StateError::Restore {
                path: self.path.clone(),
                source,
            }
        })?;
        let restored = normalise(loaded);

        for machine in entries.machines.keys() {
            if !restored.machines.contains_key(machine) {
                if let Ok(name) = MachineName::parse(machine) {
                    self.metrics
                        .set_machine(&name, self.project, Action::LeaveMaintenance);
                }
            }
        }
        for site in entries.sites.keys() {
            if !restored.sites.contains_key(site) {
                self.metrics.set_site(site, Action::LeaveMaintenance);
            }
        }

        *entries = restored;

        for machine in entries.machines.keys() {
            if let Ok(name) = MachineName::parse(machine) {
                self.metrics
                    .set_machine(&name, self.project, Action::EnterMaintenance);
            }
        }
        for site in entries.sites.keys() {
            self.metrics.set_site(site, Action::EnterMaintenance);
        }

        info!(
            path = %self.path.display(),
            machines = entries.machines.len(),
            sites = entries.sites.len(),
            "Successfully restored state from disk"
        );
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, MaintenanceSnapshot> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_machine(
        &self,
        entries: &mut MaintenanceSnapshot,
        name: &MachineName,
        action: Action,
        issue: &IssueId,
    ) -> usize {
        update_entry(
            &mut entries.machines,
            EntityKind::Machine,
            &name.to_string(),
            issue,
            action,
            |a| self.metrics.set_machine(name, self.project, a),
        )
    }

    fn apply_site(
        &self,
        entries: &mut MaintenanceSnapshot,
        site: &str,
        action: Action,
        issue: &IssueId,
    ) -> usize {
        let nodes = match self.directory.machines(site) {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(site, %action, %issue, error = %e, "Could not update site");
                self.metrics
                    .record_error("sitelookup", "MaintenanceState::update_site");
                return 0;
            }
        };

        let mut mods = update_entry(
            &mut entries.sites,
            EntityKind::Site,
            site,
            issue,
            action,
            |a| self.metrics.set_site(site, a),
        );

        for node in &nodes {
            let name = MachineName::new(node.as_str(), site);
            if MachineName::parse(&name.to_string()).ok().as_ref() != Some(&name) {
                warn!(site, node = %node, "Skipping directory machine that doesn't round-trip");
                continue;
            }
            mods += self.apply_machine(entries, &name, action, issue);
        }

        debug!(site, %action, %issue, mods, "Applied site update");
        mods
    }

    /// Removes machines matching `retired` and clears their gauges.
    fn remove_machines(
        &self,
        entries: &mut MaintenanceSnapshot,
        retired: impl Fn(&MachineName) -> bool,
    ) -> usize {
        let doomed: Vec<(String, MachineName)> = entries
            .machines
            .keys()
            .filter_map(|key| {
                let name = MachineName::parse(key).ok()?;
                retired(&name).then(|| (key.clone(), name))
            })
            .collect();

        for (key, name) in &doomed {
            entries.machines.remove(key);
            self.metrics
                .set_machine(name, self.project, Action::LeaveMaintenance);
            info!(machine = %key, "Removed machine from maintenance because its site no longer exists");
        }
        doomed.len()
    }

    fn write_locked(&self, entries: &MaintenanceSnapshot) -> Result<(), StateError> {
        save_snapshot_atomic(&self.path, entries).map_err(|source| {
            error!(path = %self.path.display(), error = %source, "Failed to write state");
            self.metrics
                .record_error(source.kind(true), "MaintenanceState::write");
            StateError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        debug!(path = %self.path.display(), "Successfully wrote state");
        Ok(())
    }
}

/// Brings a loaded snapshot back to the registry's invariants: canonical
/// machine names, no empty issue sets, no machine names without a site.
fn normalise(loaded: MaintenanceSnapshot) -> MaintenanceSnapshot {
    let mut machines: BTreeMap<String, IssueSet> = BTreeMap::new();
    for (key, issues) in loaded.machines {
        if issues.is_empty() {
            continue;
        }
        match MachineName::parse(&key) {
            Ok(name) => machines.entry(name.to_string()).or_default().extend(issues),
            Err(e) => warn!(machine = %key, error = %e, "Dropping malformed machine from restored state"),
        }
    }

    let sites = loaded
        .sites
        .into_iter()
        .filter(|(_, issues)| !issues.is_empty())
        .collect();

    MaintenanceSnapshot { machines, sites }
}
