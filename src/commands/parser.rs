//! Parser for maintenance flags in issue and comment text.
//!
//! This module provides a pure parser that extracts structured commands from
//! unstructured GitHub text. Names are validated against the naming scheme
//! of the project the exporter serves, so a staging machine mentioned on a
//! production issue is ignored.

use crate::types::{Action, MachineName, Project};

use super::types::Command;

const SITE_FLAG: &str = "/site";
const MACHINE_FLAG: &str = "/machine";

/// Length of a site name: three letters and two trailing characters.
const SITE_LEN: usize = 5;
/// Length of a machine name: `mlabN`, a separator, and a site.
const MACHINE_LEN: usize = 6 + SITE_LEN;

/// Parses every maintenance flag in `text`.
///
/// # Parsing Rules
///
/// - A flag is `/site` or `/machine`, at least one whitespace character,
///   then a name valid for `project`.
/// - The name must not run on into further letters or digits.
/// - Whitespace followed by `del` after the name makes the flag a
///   [`Action::LeaveMaintenance`]; otherwise it is an
///   [`Action::EnterMaintenance`].
/// - Flags with invalid names are skipped.
/// - All site flags come before all machine flags; within each kind the
///   order is the order of appearance.
///
/// # Examples
///
/// ```
/// use github_maintenance_exporter::commands::{Command, parse_commands};
/// use github_maintenance_exporter::types::{Action, MachineName, Project};
///
/// let commands = parse_commands("/machine mlab1.abc02 del and /site xyz01", Project::Oti);
/// assert_eq!(
///     commands,
///     vec![
///         Command::site("xyz01", Action::EnterMaintenance),
///         Command::machine(MachineName::new("mlab1", "abc02"), Action::LeaveMaintenance),
///     ]
/// );
/// ```
pub fn parse_commands(text: &str, project: Project) -> Vec<Command> {
    let sites = scan_flags(text, SITE_FLAG, SITE_LEN, move |name| is_site_name(name, project))
        .map(|(name, action)| Command::site(name, action));

    let machines = scan_flags(text, MACHINE_FLAG, MACHINE_LEN, move |name| {
        is_machine_name(name, project)
    })
    .filter_map(|(name, action)| {
        MachineName::parse(name)
            .ok()
            .map(|name| Command::machine(name, action))
    });

    sites.chain(machines).collect()
}

/// Finds each occurrence of `flag` followed by a valid `len`-byte name.
fn scan_flags<'a>(
    text: &'a str,
    flag: &'static str,
    len: usize,
    valid: impl Fn(&str) -> bool + 'a,
) -> impl Iterator<Item = (&'a str, Action)> + 'a {
    let mut search_pos = 0;
    std::iter::from_fn(move || {
        while let Some(found) = text[search_pos..].find(flag) {
            let after_flag = search_pos + found + flag.len();
            search_pos = after_flag;

            if let Some((name, rest)) = name_after_flag(&text[after_flag..], len) {
                if valid(name) {
                    search_pos = text.len() - rest.len();
                    return Some((name, action_after_name(rest)));
                }
            }
        }
        None
    })
}

/// Splits the `len`-byte name that follows a flag from the rest of the text.
fn name_after_flag(text: &str, len: usize) -> Option<(&str, &str)> {
    // At least one whitespace character between the flag and its argument.
    let text = text.strip_prefix(|c: char| c.is_whitespace())?;
    let text = text.trim_start();

    let name = text.get(..len)?;
    let rest = &text[len..];

    // `/site abc012` is not a flag for `abc01`.
    let runs_on = rest
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric());
    if runs_on {
        return None;
    }
    Some((name, rest))
}

fn action_after_name(rest: &str) -> Action {
    let deleted = rest
        .strip_prefix(|c: char| c.is_whitespace())
        .is_some_and(|rest| rest.trim_start().starts_with("del"));
    if deleted {
        Action::LeaveMaintenance
    } else {
        Action::EnterMaintenance
    }
}

/// Sites are three lowercase letters and two characters whose shape depends
/// on the project: `[0-9]t` in sandbox, `[0-9c]{2}` elsewhere.
fn is_site_name(name: &str, project: Project) -> bool {
    let b = name.as_bytes();
    if b.len() != SITE_LEN || !b[..3].iter().all(u8::is_ascii_lowercase) {
        return false;
    }
    match project {
        Project::Sandbox => b[3].is_ascii_digit() && b[4] == b't',
        Project::Staging | Project::Oti => b[3..].iter().all(|&c| c.is_ascii_digit() || c == b'c'),
    }
}

/// Machines are `mlabN`, `.` or `-`, then a site. Sandbox uses nodes 1-4,
/// staging only node 4, and production nodes 1-3.
fn is_machine_name(name: &str, project: Project) -> bool {
    let b = name.as_bytes();
    if b.len() != MACHINE_LEN || !name.starts_with("mlab") {
        return false;
    }
    let node_ok = match project {
        Project::Sandbox => (b'1'..=b'4').contains(&b[4]),
        Project::Staging => b[4] == b'4',
        Project::Oti => (b'1'..=b'3').contains(&b[4]),
    };
    node_ok && matches!(b[5], b'.' | b'-') && is_site_name(&name[6..], project)
}
