//! App API handlers.
//!
//! # Purpose
//! Implements App registration, lookup, removal and device membership on top
//! of the App registry. Handlers stay thin; ordering and collision rules live
//! in the registry.
use crate::api::error::{ApiError, api_validation_error};
use crate::api::types::{AppCreateRequest, AppListResponse, MemberRequest};
use crate::app::AppState;
use crate::model::AppView;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use iotgate_dynsec::NewApp;

#[utoipa::path(
    get,
    path = "/v1/apps",
    tag = "apps",
    responses(
        (status = 200, description = "List apps", body = AppListResponse)
    )
)]
pub(crate) async fn list_apps(
    State(state): State<AppState>,
) -> Result<Json<AppListResponse>, ApiError> {
    let items = state
        .registry
        .list()
        .await?
        .iter()
        .map(AppView::from)
        .collect();
    Ok(Json(AppListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/v1/apps",
    tag = "apps",
    request_body = AppCreateRequest,
    responses(
        (status = 201, description = "App registered", body = AppView),
        (status = 400, description = "Invalid request", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Identifier already used by an app or device", body = crate::api::types::ErrorResponse),
        (status = 422, description = "Reserved identifier", body = crate::api::types::ErrorResponse),
        (status = 503, description = "Broker unavailable", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_app(
    State(state): State<AppState>,
    Json(body): Json<AppCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.password.expose().is_empty() {
        return Err(api_validation_error("password must not be empty"));
    }
    let app = state
        .registry
        .register(NewApp {
            app_id: body.app_id,
            password: body.password,
            restricted: body.restricted,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(app.view())))
}

#[utoipa::path(
    get,
    path = "/v1/apps/{app_id}",
    tag = "apps",
    params(
        ("app_id" = String, Path, description = "App identifier")
    ),
    responses(
        (status = 200, description = "App", body = AppView),
        (status = 404, description = "App not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_app(
    Path(app_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AppView>, ApiError> {
    let app = state.registry.get(&app_id).await?;
    Ok(Json(app.view()))
}

#[utoipa::path(
    delete,
    path = "/v1/apps/{app_id}",
    tag = "apps",
    params(
        ("app_id" = String, Path, description = "App identifier")
    ),
    responses(
        (status = 204, description = "App removed"),
        (status = 404, description = "App not found", body = crate::api::types::ErrorResponse),
        (status = 503, description = "Broker unavailable", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_app(
    Path(app_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.registry.remove(&app_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/v1/apps/{app_id}/members",
    tag = "apps",
    params(
        ("app_id" = String, Path, description = "Restricted app identifier")
    ),
    request_body = MemberRequest,
    responses(
        (status = 204, description = "Membership granted"),
        (status = 400, description = "App is not restricted", body = crate::api::types::ErrorResponse),
        (status = 404, description = "App or device not found", body = crate::api::types::ErrorResponse),
        (status = 503, description = "Broker unavailable", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn add_member(
    Path(app_id): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<MemberRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .add_member(&app_id, &body.dev_id, body.evt, body.cmd)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/apps/{app_id}/members/{dev_id}",
    tag = "apps",
    params(
        ("app_id" = String, Path, description = "Restricted app identifier"),
        ("dev_id" = String, Path, description = "Device identifier")
    ),
    responses(
        (status = 204, description = "Membership revoked"),
        (status = 400, description = "App is not restricted", body = crate::api::types::ErrorResponse),
        (status = 404, description = "App not found", body = crate::api::types::ErrorResponse),
        (status = 503, description = "Broker unavailable", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn remove_member(
    Path((app_id, dev_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.registry.remove_member(&app_id, &dev_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
