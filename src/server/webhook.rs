//! Webhook endpoint handler.
//!
//! Accepts GitHub webhook deliveries, validates signatures, applies the
//! maintenance flags they carry, and persists the registry if anything
//! changed before answering.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::commands::apply_message;
use crate::maintenance::StateError;
use crate::webhooks::{GitHubEvent, IssueAction, ParseError, SignatureError, parse_webhook};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing required header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// Invalid signature.
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// The payload doesn't decode as the announced event.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ParseError),

    /// The registry changed but couldn't be persisted.
    #[error("failed to persist state: {0}")]
    Persist(#[from] StateError),

    /// The blocking task processing the delivery panicked or was cancelled.
    #[error("webhook processing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl WebhookError {
    /// Label for `gmx_error_count{type=...}`.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookError::MissingHeader(_) => "missingheader",
            WebhookError::InvalidSignature(_) => "validatehook",
            WebhookError::InvalidPayload(_) => "parsehook",
            WebhookError::Persist(_) => "writefile",
            WebhookError::Task(_) => "internal",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::Persist(_) | WebhookError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Headers:
///   - `X-Hub-Signature-256`: HMAC-SHA256 signature of the payload (required)
///   - `X-GitHub-Event`: Event type, e.g. `issues` (required)
///   - `X-GitHub-Delivery`: Delivery ID (logged only)
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 200 OK: Event handled
/// - 400 Bad Request: Missing event header or malformed payload
/// - 401 Unauthorized: Invalid or missing signature
/// - 417 Expectation Failed: Comment on a closed issue, or a ping from a
///   hook that isn't subscribed to `issues` and `issue_comment`
/// - 500 Internal Server Error: The registry changed but couldn't be written
/// - 501 Not Implemented: Event type or issue action the exporter ignores
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    // Registry updates take a mutex and the snapshot write fsyncs, so run
    // them off the async workers.
    let task_state = app_state.clone();
    let result = tokio::task::spawn_blocking(move || {
        process_delivery(&task_state, &headers, &body)
    })
    .await
    .unwrap_or_else(|e| Err(WebhookError::from(e)));
    if let Err(e) = &result {
        warn!(error = %e, "Rejected webhook");
        app_state.metrics().record_error(e.kind(), "webhook_handler");
    }
    result
}

fn process_delivery(
    app_state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(StatusCode, &'static str), WebhookError> {
    // Verify the signature before any parsing.
    app_state
        .webhook_secret()
        .verify(body, header_value(headers, HEADER_SIGNATURE))?;

    let event_type =
        header_value(headers, HEADER_EVENT).ok_or(WebhookError::MissingHeader(HEADER_EVENT))?;
    let delivery_id = header_value(headers, HEADER_DELIVERY).unwrap_or("-");

    debug!(delivery_id, event_type, "Received webhook");

    let event = parse_webhook(event_type, body)?;
    let state = app_state.state();

    let (mods, status) = match event {
        Some(GitHubEvent::Issues(event)) => match event.action {
            IssueAction::Closed | IssueAction::Deleted => {
                info!(issue = %event.issue, action = event.action.as_str(), "Issue closed");
                (state.close_issue(&event.issue), StatusCode::OK)
            }
            IssueAction::Opened | IssueAction::Edited => {
                (apply_message(state, &event.body, &event.issue), StatusCode::OK)
            }
            IssueAction::Other(ref action) => {
                info!(issue = %event.issue, action = %action, "Unsupported issues action");
                (0, StatusCode::NOT_IMPLEMENTED)
            }
        },
        Some(GitHubEvent::IssueComment(event)) => {
            if event.issue_open {
                (apply_message(state, &event.body, &event.issue), StatusCode::OK)
            } else {
                info!(issue = %event.issue, "Ignoring comment on closed issue");
                (0, StatusCode::EXPECTATION_FAILED)
            }
        }
        Some(GitHubEvent::Ping(ping)) => {
            if ping.covers_required_events() {
                (0, StatusCode::OK)
            } else {
                warn!(
                    events = ?ping.events,
                    "Registered webhook events do not include both 'issues' and 'issue_comment'"
                );
                (0, StatusCode::EXPECTATION_FAILED)
            }
        }
        None => {
            info!(event_type, "Unimplemented webhook event type");
            (0, StatusCode::NOT_IMPLEMENTED)
        }
    };

    // Only write state to file if the current state was modified.
    if mods > 0 {
        state.write()?;
    }

    info!(delivery_id, event_type, mods, status = status.as_u16(), "Handled webhook");
    Ok((status, status.canonical_reason().unwrap_or("")))
}

/// A header's value, if present and valid UTF-8.
fn header_value<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::super::build_router;
    use super::super::test_support::{SECRET, test_app_state};
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::persistence::{MaintenanceSnapshot, load_snapshot};
    use crate::types::{Action, IssueId};
    use crate::webhooks::WebhookSecret;

    /// Creates a webhook request signed with `secret`.
    fn signed_request(secret: &str, event_type: Option<&str>, payload: &str) -> Request<Body> {
        let signature = WebhookSecret::new(secret).sign(payload.as_bytes());
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-github-delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958")
            .header("x-hub-signature-256", signature);
        if let Some(event_type) = event_type {
            builder = builder.header("x-github-event", event_type);
        }
        builder.body(Body::from(payload.to_string())).unwrap()
    }

    async fn send(app: &AppState, request: Request<Body>) -> StatusCode {
        build_router(app.clone())
            .oneshot(request)
            .await
            .unwrap()
            .status()
    }

    fn persisted(app: &AppState) -> MaintenanceSnapshot {
        load_snapshot(app.state().path()).unwrap()
    }

    // ─── Rejections ───

    #[tokio::test]
    async fn wrong_secret_returns_401() {
        let (app, _dir) = test_app_state();
        let payload = r#"{"action": "opened", "issue": {"number": 1, "body": "/site abc01"}}"#;

        let status = send(&app, signed_request("badsecret", Some("issues"), payload)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(app.state().snapshot().is_empty());
        assert_eq!(app.metrics().error_count("validatehook", "webhook_handler"), 1);
    }

    #[tokio::test]
    async fn missing_signature_returns_401() {
        let (app, _dir) = test_app_state();
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("x-github-event", "ping")
            .body(Body::from("{}"))
            .unwrap();

        assert_eq!(send(&app, request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_event_header_returns_400() {
        let (app, _dir) = test_app_state();

        let status = send(&app, signed_request(SECRET, None, "{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.metrics().error_count("missingheader", "webhook_handler"), 1);
    }

    #[tokio::test]
    async fn malformed_payload_returns_400() {
        let (app, _dir) = test_app_state();

        let status = send(
            &app,
            signed_request(SECRET, Some("issue_comment"), r#""malformed; 'json }]]}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.metrics().error_count("parsehook", "webhook_handler"), 1);
    }

    // ─── ping ───

    #[tokio::test]
    async fn ping_missing_required_events_returns_417() {
        let (app, _dir) = test_app_state();
        let payload = r#"{
            "hook": {
                "type": "App",
                "id": 11,
                "active": true,
                "events": ["issues", "label", "pull_request"],
                "app_id": 37
            }
        }"#;

        let status = send(&app, signed_request(SECRET, Some("ping"), payload)).await;

        assert_eq!(status, StatusCode::EXPECTATION_FAILED);
    }

    #[tokio::test]
    async fn ping_with_required_events_returns_200() {
        let (app, _dir) = test_app_state();
        let payload = r#"{"hook": {"events": ["issues", "issue_comment"]}}"#;

        let status = send(&app, signed_request(SECRET, Some("ping"), payload)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(!app.state().path().exists(), "ping must not write state");
    }

    // ─── issues ───

    #[tokio::test]
    async fn issue_opened_applies_flags_and_writes() {
        let (app, _dir) = test_app_state();
        let payload = r#"{
            "action": "opened",
            "issue": {
                "number": 1,
                "body": "Put /site abc01 and /machine mlab2.xyz01 into maintenance."
            }
        }"#;

        let status = send(&app, signed_request(SECRET, Some("issues"), payload)).await;

        assert_eq!(status, StatusCode::OK);
        let on_disk = persisted(&app);
        assert_eq!(on_disk, app.state().snapshot());
        assert!(on_disk.sites.contains_key("abc01"));
        assert_eq!(on_disk.machines.len(), 5);
        assert!(on_disk.machines.contains_key("mlab2-xyz01"));
    }

    #[tokio::test]
    async fn issue_closed_releases_everything() {
        let (app, _dir) = test_app_state();
        let state = app.state();
        state.update_site("abc01", Action::EnterMaintenance, &IssueId::from(1));
        state.update_machine("mlab2-xyz01", Action::EnterMaintenance, &IssueId::from(1));
        state.update_machine("mlab2-xyz01", Action::EnterMaintenance, &IssueId::from(5));
        let payload = r#"{"action": "closed", "issue": {"number": 1}}"#;

        let status = send(&app, signed_request(SECRET, Some("issues"), payload)).await;

        assert_eq!(status, StatusCode::OK);
        let on_disk = persisted(&app);
        assert!(on_disk.sites.is_empty());
        assert_eq!(on_disk.machines.keys().collect::<Vec<_>>(), vec!["mlab2-xyz01"]);
        assert_eq!(on_disk.machines["mlab2-xyz01"].len(), 1);
    }

    #[tokio::test]
    async fn unsupported_issue_action_returns_501() {
        let (app, _dir) = test_app_state();
        let payload = r#"{"action": "unlabeled", "issue": {"number": 2, "body": "Issue was unlabeled."}}"#;

        let status = send(&app, signed_request(SECRET, Some("issues"), payload)).await;

        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn issue_without_changes_does_not_write() {
        let (app, _dir) = test_app_state();
        let payload = r#"{"action": "edited", "issue": {"number": 3, "body": "No flags here."}}"#;

        let status = send(&app, signed_request(SECRET, Some("issues"), payload)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(!app.state().path().exists());
    }

    // ─── issue_comment ───

    #[tokio::test]
    async fn comment_on_closed_issue_returns_417() {
        let (app, _dir) = test_app_state();
        let payload = r#"{
            "action": "created",
            "issue": {
                "number": 19,
                "body": "Closed issue received a new comment.",
                "state": "closed"
            }
        }"#;

        let status = send(&app, signed_request(SECRET, Some("issue_comment"), payload)).await;

        assert_eq!(status, StatusCode::EXPECTATION_FAILED);
    }

    #[tokio::test]
    async fn comment_removes_machine() {
        let (app, _dir) = test_app_state();
        app.state()
            .update_machine("mlab1-abc01", Action::EnterMaintenance, &IssueId::from(1));
        app.state()
            .update_machine("mlab2-xyz01", Action::EnterMaintenance, &IssueId::from(3));
        let payload = r#"{
            "action": "edited",
            "issue": { "number": 1, "state": "open" },
            "comment": { "body": "Take /machine mlab1.abc01 del out of maintenance." }
        }"#;

        let status = send(&app, signed_request(SECRET, Some("issue_comment"), payload)).await;

        assert_eq!(status, StatusCode::OK);
        let on_disk = persisted(&app);
        assert_eq!(on_disk.machines.keys().collect::<Vec<_>>(), vec!["mlab2-xyz01"]);
    }

    #[tokio::test]
    async fn flag_at_end_of_comment_is_applied() {
        let (app, _dir) = test_app_state();
        let payload = r#"{
            "action": "edited",
            "issue": { "number": 1, "state": "open" },
            "comment": { "body": "Put into maintenance /machine mlab1.abc01" }
        }"#;

        let status = send(&app, signed_request(SECRET, Some("issue_comment"), payload)).await;

        assert_eq!(status, StatusCode::OK);
        let on_disk = persisted(&app);
        assert_eq!(on_disk.machines["mlab1-abc01"].len(), 1);
    }

    #[tokio::test]
    async fn write_failure_returns_500() {
        let (app, dir) = test_app_state();
        // A directory where the state file should be makes the rename fail.
        std::fs::create_dir_all(dir.path().join("state.json").join("blocker")).unwrap();
        let payload = r#"{
            "action": "edited",
            "issue": { "number": 1, "state": "open" },
            "comment": { "body": "Put /site xyz07 into maintenance." }
        }"#;

        let status = send(&app, signed_request(SECRET, Some("issue_comment"), payload)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        // The in-memory registry keeps the change.
        assert!(app.state().snapshot().sites.contains_key("xyz07"));
        assert_eq!(app.metrics().error_count("writefile", "webhook_handler"), 1);
    }

    // ─── other events ───

    #[tokio::test]
    async fn unknown_event_returns_501() {
        let (app, _dir) = test_app_state();

        let status = send(&app, signed_request(SECRET, Some("push"), "{}")).await;

        assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_deliveries_are_all_applied_and_persisted() {
        let (app, _dir) = test_app_state();

        let deliveries = (1..=16u64).map(|n| {
            let app = app.clone();
            let site = if n % 2 == 0 { "abc01" } else { "xyz07" };
            let payload = format!(
                r#"{{"action": "opened", "issue": {{"number": {n}, "body": "/site {site}"}}}}"#
            );
            tokio::spawn(async move {
                send(&app, signed_request(SECRET, Some("issues"), &payload)).await
            })
        });
        let handles: Vec<_> = deliveries.collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), StatusCode::OK);
        }

        let snapshot = app.state().snapshot();
        assert_eq!(snapshot.sites["abc01"].len(), 8);
        assert_eq!(snapshot.sites["xyz07"].len(), 8);
        assert_eq!(snapshot.machines["mlab4-xyz07"].len(), 8);
        assert_eq!(persisted(&app), snapshot);
    }
}
