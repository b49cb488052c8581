//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Typed events for `issues`, `issue_comment`, and `ping` deliveries
//! - Payload parsing from the raw JSON body

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{
    GitHubEvent, IssueAction, IssueCommentEvent, IssuesEvent, PingEvent, REQUIRED_EVENTS,
};
pub use parser::{ParseError, parse_webhook};
pub use signature::{SignatureError, WebhookSecret, parse_signature_header};
