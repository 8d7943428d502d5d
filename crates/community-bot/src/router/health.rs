use axum::Json;
use serde::{Deserialize, Serialize};
use shared::adapters::openapi::API_VERSION_TAG;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub const SERVICE_ROUTE_KEY: &str = "health";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

pub fn create_router() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(route_health))
}

#[utoipa::path(
    get,
    path = "/health",
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    ),
    summary = "Liveness probe",
    operation_id = "health",
)]
async fn route_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
