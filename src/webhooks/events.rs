//! GitHub webhook event types.
//!
//! Typed representations of the webhook events the exporter handles, with
//! only the fields it needs.
//!
//! # Event Types
//!
//! - `issues` - issue lifecycle; opening or editing applies flags in the
//!   body, closing or deleting releases everything the issue holds
//! - `issue_comment` - flags in comments on open issues
//! - `ping` - sent when the hook is registered; used to check that the hook
//!   subscribes to the two events above

use crate::types::IssueId;

/// Events the hook must subscribe to for the exporter to work.
pub const REQUIRED_EVENTS: [&str; 2] = ["issues", "issue_comment"];

/// A parsed GitHub webhook event.
///
/// Only the event types the exporter cares about. Unknown events are
/// represented by returning `None` from the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitHubEvent {
    Issues(IssuesEvent),
    IssueComment(IssueCommentEvent),
    Ping(PingEvent),
}

impl GitHubEvent {
    /// The issue the event is about, if any.
    pub fn issue(&self) -> Option<&IssueId> {
        match self {
            GitHubEvent::Issues(e) => Some(&e.issue),
            GitHubEvent::IssueComment(e) => Some(&e.issue),
            GitHubEvent::Ping(_) => None,
        }
    }
}

/// Action performed on an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueAction {
    Opened,
    Edited,
    Closed,
    Deleted,
    /// Any other action (`labeled`, `assigned`, ...). Not handled.
    Other(String),
}

impl IssueAction {
    pub fn from_name(name: &str) -> Self {
        match name {
            "opened" => IssueAction::Opened,
            "edited" => IssueAction::Edited,
            "closed" => IssueAction::Closed,
            "deleted" => IssueAction::Deleted,
            other => IssueAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IssueAction::Opened => "opened",
            IssueAction::Edited => "edited",
            IssueAction::Closed => "closed",
            IssueAction::Deleted => "deleted",
            IssueAction::Other(name) => name,
        }
    }
}

/// An `issues` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuesEvent {
    pub action: IssueAction,
    pub issue: IssueId,

    /// The issue body. Empty when the issue has none.
    pub body: String,
}

/// An `issue_comment` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCommentEvent {
    pub issue: IssueId,

    /// Whether the issue the comment belongs to is open.
    pub issue_open: bool,

    /// The comment body. Empty when the payload carries no comment.
    pub body: String,
}

/// A `ping` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingEvent {
    /// The events the hook is subscribed to.
    pub events: Vec<String>,
}

impl PingEvent {
    /// True if the hook delivers every event in [`REQUIRED_EVENTS`].
    ///
    /// A `*` wildcard subscription counts as every event.
    pub fn covers_required_events(&self) -> bool {
        if self.events.iter().any(|e| e == "*") {
            return true;
        }
        REQUIRED_EVENTS
            .iter()
            .all(|required| self.events.iter().any(|e| e == required))
    }
}
