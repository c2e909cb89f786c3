//! System/health API handlers.
//!
//! # Purpose and responsibility
//! Provides lightweight endpoints for service metadata and health checks.
//!
//! # Key invariants and assumptions
//! - Health checks are side-effect free: they read the App store and, when
//!   configured, the broker's security document. Nothing is published.
//! - System info is derived from in-memory configuration.
use crate::api::error::ApiError;
use crate::api::types::{HealthStatus, SystemInfo};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

#[utoipa::path(
    get,
    path = "/v1/system/info",
    tag = "system",
    responses(
        (status = 200, description = "Service identity and capabilities", body = SystemInfo)
    )
)]
pub(crate) async fn system_info(State(state): State<AppState>) -> Json<SystemInfo> {
    Json(SystemInfo {
        service: "iotgate-appsync".to_string(),
        api_version: state.api_version.clone(),
        app_store: state.registry.app_store().backend_name().to_string(),
        device_store: state.registry.device_store().backend_name().to_string(),
        features: state.features.clone(),
    })
}

#[utoipa::path(
    get,
    path = "/v1/system/health",
    tag = "system",
    responses(
        (status = 200, description = "Service health", body = HealthStatus),
        (status = 500, description = "App store unavailable", body = crate::api::types::ErrorResponse),
        (status = 503, description = "Security document unavailable", body = crate::api::types::ErrorResponse)
    )
)]
/// Probe the App store and the security document.
///
/// # Errors
/// - 500 if the App store health check fails.
/// - 503 if a security document is configured but cannot be read.
pub(crate) async fn system_health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, ApiError> {
    state
        .registry
        .app_store()
        .health_check()
        .await
        .map_err(crate::registry::RegistryError::from)?;
    let admin_client = state.registry.admin_client().await?;
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
        admin_client,
    }))
}
