//! Slack webhook routes
//!
//! Provides the endpoint for receiving Slack Events API webhooks.
//! The webhook verifies the request signature, returns 200 immediately and
//! hands membership events to the processor on a background task.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, StatusCode};
use membership::{MembershipEventKind, MembershipProcessor};
use serde::{Deserialize, Serialize};
use shared::adapters::openapi::API_VERSION_TAG;
use shared::error::CommonError;
use tracing::{debug, trace, warn};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::logic::SignatureVerifier;
use crate::types::{SlackEvent, SlackEventEnvelope, SlackMemberChannelEvent};

pub const SERVICE_ROUTE_KEY: &str = "slack";
pub const EVENTS_PATH: &str = "/slack/events";

const RETRY_NUM_HEADER: &str = "x-slack-retry-num";
const RETRY_REASON_HEADER: &str = "x-slack-retry-reason";

/// Shared state for the Slack webhook
#[derive(Clone)]
pub struct SlackWebhookState {
    pub processor: Arc<MembershipProcessor>,
    pub verifier: SignatureVerifier,
}

impl SlackWebhookState {
    pub fn new(processor: Arc<MembershipProcessor>, verifier: SignatureVerifier) -> Self {
        Self {
            processor,
            verifier,
        }
    }
}

/// Response for Slack URL verification challenge
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UrlVerificationResponse {
    pub challenge: String,
}

pub fn create_router() -> OpenApiRouter<SlackWebhookState> {
    OpenApiRouter::new().routes(routes!(route_slack_events))
}

/// POST /slack/events - Slack Events API endpoint
///
/// - URL verification challenges are echoed back immediately
/// - `member_joined_channel` / `member_left_channel` are acknowledged with 200
///   and processed on a background task
/// - Everything else is acknowledged and ignored
#[utoipa::path(
    post,
    path = "/slack/events",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    request_body = SlackEventEnvelope,
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Bad Request"),
        (status = 401, description = "Invalid or missing Slack signature"),
    ),
    summary = "Slack events endpoint",
    description = "Receives Slack Events API webhooks. Returns the URL verification challenge for setup, \
                   or acknowledges membership events and processes them asynchronously.",
    operation_id = "slack-events",
)]
pub async fn route_slack_events(
    State(ctx): State<SlackWebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, CommonError> {
    if let Err(e) = ctx.verifier.verify(&headers, &body) {
        warn!(error = %e, "Rejecting Slack request with invalid signature");
        return Err(CommonError::Authentication {
            msg: e.to_string(),
            source: Some(e.into()),
        });
    }

    if let Some(retry) = headers.get(RETRY_NUM_HEADER) {
        debug!(
            retry_num = ?retry,
            retry_reason = ?headers.get(RETRY_REASON_HEADER),
            "Slack redelivery"
        );
    }

    let envelope: SlackEventEnvelope =
        serde_json::from_slice(&body).map_err(|e| CommonError::InvalidRequest {
            msg: format!("invalid Slack event payload: {e}"),
            source: Some(e.into()),
        })?;

    let response = match envelope {
        // Handle URL verification challenge (required for Slack app setup)
        SlackEventEnvelope::UrlVerification { challenge, .. } => {
            trace!("Responding to Slack URL verification challenge");
            Json(UrlVerificationResponse { challenge }).into_response()
        }

        SlackEventEnvelope::EventCallback {
            event,
            team_id,
            api_app_id,
            event_id,
            ..
        } => {
            trace!(
                team_id = %team_id,
                api_app_id = %api_app_id,
                event_id = ?event_id,
                "Processing Slack event callback"
            );

            match event {
                SlackEvent::MemberJoinedChannel(joined) => {
                    spawn_membership_processing(&ctx, MembershipEventKind::Joined, joined);
                }
                SlackEvent::MemberLeftChannel(left) => {
                    spawn_membership_processing(&ctx, MembershipEventKind::Left, left);
                }
                SlackEvent::Unknown => {
                    trace!("Received unhandled Slack event type");
                }
            }

            StatusCode::OK.into_response()
        }

        SlackEventEnvelope::AppRateLimited {
            minute_rate_limited,
            ..
        } => {
            warn!(
                rate_limited_until = minute_rate_limited,
                "Slack app rate limited"
            );
            StatusCode::OK.into_response()
        }
    };

    Ok(response)
}

/// Processing happens off the request path so Slack gets its ack promptly
fn spawn_membership_processing(
    ctx: &SlackWebhookState,
    kind: MembershipEventKind,
    event: SlackMemberChannelEvent,
) {
    let payload = match event.into_payload() {
        Ok(payload) => payload,
        Err(e) => {
            warn!(kind = %kind, error = %e, "Discarding malformed membership event");
            return;
        }
    };

    let processor = ctx.processor.clone();
    tokio::spawn(async move {
        processor.ingest(kind, payload).await;
    });
}
