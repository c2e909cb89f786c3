//! App sync HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! This module centralizes route composition to keep `main` small and testable.
use crate::api;
use crate::api::types::FeatureFlags;
use crate::registry::AppRegistry;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub api_version: String,
    pub features: FeatureFlags,
    pub registry: Arc<AppRegistry>,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route(
            "/v1/system/info",
            axum::routing::get(api::system::system_info),
        )
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .route(
            "/v1/openapi.json",
            axum::routing::get(api::openapi::openapi_json),
        )
        .route(
            "/v1/apps",
            axum::routing::get(api::apps::list_apps).post(api::apps::create_app),
        )
        .route(
            "/v1/apps/:app_id",
            axum::routing::get(api::apps::get_app).delete(api::apps::delete_app),
        )
        .route(
            "/v1/apps/:app_id/members",
            axum::routing::put(api::apps::add_member),
        )
        .route(
            "/v1/apps/:app_id/members/:dev_id",
            axum::routing::delete(api::apps::remove_member),
        )
        .layer(trace_layer)
        .with_state(state)
}
