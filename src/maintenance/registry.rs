//! Per-entity enter/leave bookkeeping.
//!
//! [`update_entry`] is the only place that inserts into or removes from an
//! entity map, and it is also where the entity's gauge gets set. Keeping the
//! two together is what makes "map entry exists iff gauge reads 1" hold.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::issues::IssueSet;
use crate::types::{Action, EntityKind, IssueId};

/// Applies `action` for `issue` to the entity `key` in `entries`.
///
/// - Enter: adds the issue and sets the gauge to 1. Entering twice under the
///   same issue changes nothing and returns 0.
/// - Leave: removes the issue. If it was the entity's last issue, the entry
///   is deleted and the gauge set to 0. Leaving under an issue the entity
///   doesn't hold returns 0.
///
/// Returns the number of modifications (0 or 1).
pub(crate) fn update_entry(
    entries: &mut BTreeMap<String, IssueSet>,
    kind: EntityKind,
    key: &str,
    issue: &IssueId,
    action: Action,
    set_gauge: impl FnOnce(Action),
) -> usize {
    match action {
        Action::EnterMaintenance => {
            if entries.get(key).is_some_and(|issues| issues.contains(issue)) {
                debug!(%kind, entity = key, %issue, "Already in maintenance for this issue");
                return 0;
            }
            entries
                .entry(key.to_string())
                .or_default()
                .insert(issue.clone());
            set_gauge(Action::EnterMaintenance);
            info!(%kind, entity = key, %issue, "Added to maintenance");
            1
        }
        Action::LeaveMaintenance => {
            let Some(issues) = entries.get_mut(key) else {
                return 0;
            };
            if !issues.remove(issue) {
                return 0;
            }
            if issues.is_empty() {
                entries.remove(key);
                set_gauge(Action::LeaveMaintenance);
            }
            info!(%kind, entity = key, %issue, "Removed from maintenance");
            1
        }
    }
}
