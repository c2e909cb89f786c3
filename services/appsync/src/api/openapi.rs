//! OpenAPI schema aggregation for the app sync API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document served
//! at `/v1/openapi.json`.
use crate::api::{
    apps, system,
    types::{
        AppCreateRequest, AppListResponse, ErrorResponse, FeatureFlags, HealthStatus,
        MemberRequest, SystemInfo,
    },
};
use crate::model::AppView;
use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "iotgate-appsync",
        version = "v1",
        description = "App registry and broker access synchronization API"
    ),
    paths(
        system::system_info,
        system::system_health,
        apps::list_apps,
        apps::create_app,
        apps::get_app,
        apps::delete_app,
        apps::add_member,
        apps::remove_member
    ),
    components(schemas(
        FeatureFlags,
        SystemInfo,
        HealthStatus,
        ErrorResponse,
        AppView,
        AppCreateRequest,
        AppListResponse,
        MemberRequest
    )),
    tags(
        (name = "system", description = "System and discovery endpoints"),
        (name = "apps", description = "App registration and device membership")
    )
)]
pub struct ApiDoc;

pub(crate) async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
