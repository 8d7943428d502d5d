//! Slack adapter router endpoints
//!
//! Provides HTTP endpoints for Slack integration:
//! - Events API webhook feeding membership changes to the processor

mod webhook;

pub use webhook::{
    EVENTS_PATH, SERVICE_ROUTE_KEY, SlackWebhookState, UrlVerificationResponse, create_router,
};

use utoipa_axum::router::OpenApiRouter;

/// Creates the Slack router with all endpoints
pub fn create_slack_router() -> OpenApiRouter<SlackWebhookState> {
    webhook::create_router()
}
