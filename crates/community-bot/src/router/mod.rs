use axum::routing::get;
use axum::{Json, Router};
use membership_slack::SlackWebhookState;
use shared::adapters::openapi::with_service_info;
use utoipa::openapi::OpenApi;

use crate::cli::CLI_VERSION;

mod health;

pub const OPENAPI_PATH: &str = "/openapi.json";

pub(crate) fn initiate_routers(state: SlackWebhookState) -> Router {
    let (health_router, _) = health::create_router().split_for_parts();
    let (slack_router, _) = membership_slack::create_slack_router().split_for_parts();

    let spec = generate_openapi_spec();
    let openapi_router = Router::new().route(
        OPENAPI_PATH,
        get(move || {
            let spec = spec.clone();
            async move { Json(spec) }
        }),
    );

    Router::new()
        .merge(health_router)
        .merge(slack_router.with_state(state))
        .merge(openapi_router)
}

pub(crate) fn generate_openapi_spec() -> OpenApi {
    let (_, mut spec) = health::create_router().split_for_parts();
    let (_, slack_spec) = membership_slack::create_slack_router().split_for_parts();
    spec.merge(slack_spec);

    with_service_info(spec, "community-bot", CLI_VERSION)
}
