//! GitHub webhook payload parser.
//!
//! Parses raw webhook JSON payloads into typed [`GitHubEvent`] values.
//! Unknown fields are ignored.
//!
//! # Parsing Strategy
//!
//! 1. The event type is determined from the `X-GitHub-Event` header
//! 2. The payload is parsed according to the event type
//! 3. Unknown event types return `Ok(None)` (ignored, not error)
//! 4. Malformed payloads return `Err` with details

use serde::Deserialize;
use thiserror::Error;

use crate::types::IssueId;

use super::events::{
    GitHubEvent, IssueAction, IssueCommentEvent, IssuesEvent, PingEvent,
};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Field has invalid value.
    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Parses a webhook payload into a typed event.
///
/// * `Ok(Some(event))` - Successfully parsed a known event type
/// * `Ok(None)` - Unknown event type (ignored, not an error)
/// * `Err(e)` - Malformed payload or missing required fields
///
/// # Examples
///
/// ```
/// use github_maintenance_exporter::webhooks::{GitHubEvent, parse_webhook};
///
/// let payload = br#"{
///     "action": "opened",
///     "issue": { "number": 42, "body": "/site abc02" }
/// }"#;
///
/// let event = parse_webhook("issues", payload).unwrap();
/// assert!(matches!(event, Some(GitHubEvent::Issues(_))));
///
/// assert!(parse_webhook("push", b"{}").unwrap().is_none());
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<GitHubEvent>, ParseError> {
    match event_type {
        "issues" => parse_issues(payload).map(|e| Some(GitHubEvent::Issues(e))),
        "issue_comment" => parse_issue_comment(payload).map(|e| Some(GitHubEvent::IssueComment(e))),
        "ping" => parse_ping(payload).map(|e| Some(GitHubEvent::Ping(e))),
        // Unknown event types are ignored (not an error)
        _ => Ok(None),
    }
}

// ============================================================================
// Raw payload structures for deserialization
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    body: Option<String>,
    state: Option<String>,
}

impl RawIssue {
    fn id(&self) -> Result<IssueId, ParseError> {
        // Issue numbers start at 1; 0 means the field was defaulted.
        if self.number == 0 {
            return Err(ParseError::InvalidField {
                field: "issue.number",
                value: self.number.to_string(),
            });
        }
        Ok(IssueId::from(self.number))
    }
}

// ============================================================================
// issues event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawIssuesPayload {
    action: String,
    issue: RawIssue,
}

fn parse_issues(payload: &[u8]) -> Result<IssuesEvent, ParseError> {
    let raw: RawIssuesPayload = serde_json::from_slice(payload)?;
    Ok(IssuesEvent {
        action: IssueAction::from_name(&raw.action),
        issue: raw.issue.id()?,
        body: raw.issue.body.unwrap_or_default(),
    })
}

// ============================================================================
// issue_comment event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawIssueCommentPayload {
    issue: RawIssue,
    comment: Option<RawComment>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    body: Option<String>,
}

fn parse_issue_comment(payload: &[u8]) -> Result<IssueCommentEvent, ParseError> {
    let raw: RawIssueCommentPayload = serde_json::from_slice(payload)?;
    Ok(IssueCommentEvent {
        issue: raw.issue.id()?,
        issue_open: raw.issue.state.as_deref() == Some("open"),
        body: raw.comment.and_then(|c| c.body).unwrap_or_default(),
    })
}

// ============================================================================
// ping event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPingPayload {
    hook: Option<RawHook>,
}

#[derive(Debug, Deserialize)]
struct RawHook {
    #[serde(default)]
    events: Vec<String>,
}

fn parse_ping(payload: &[u8]) -> Result<PingEvent, ParseError> {
    let raw: RawPingPayload = serde_json::from_slice(payload)?;
    Ok(PingEvent {
        events: raw.hook.map(|h| h.events).unwrap_or_default(),
    })
}
