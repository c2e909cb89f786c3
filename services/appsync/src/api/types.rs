//! HTTP API request/response types.
//!
//! # Purpose
//! Defines shared payload shapes for the app sync REST API and OpenAPI schema
//! generation.
use crate::model::AppView;
use iotgate_dynsec::Password;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct FeatureFlags {
    pub durable_storage: bool,
    pub atomic_app_create: bool,
    pub ensure_shared_role: bool,
    pub security_document: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub service: String,
    pub api_version: String,
    pub app_store: String,
    pub device_store: String,
    pub features: FeatureFlags,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
    /// Broker administrator found in the security document, when one is
    /// configured.
    pub admin_client: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AppCreateRequest {
    pub app_id: String,
    #[schema(value_type = String)]
    pub password: Password,
    #[serde(default)]
    pub restricted: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AppListResponse {
    pub items: Vec<AppView>,
}

/// Device to attach to a restricted App. Both flags default to allowed.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct MemberRequest {
    pub dev_id: String,
    #[serde(default = "allowed")]
    pub evt: bool,
    #[serde(default = "allowed")]
    pub cmd: bool,
}

fn allowed() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_debug_hides_password() {
        let body: AppCreateRequest =
            serde_json::from_str(r#"{"app_id":"vault","password":"hunter2"}"#).expect("parse");
        assert_eq!(body.password.expose(), "hunter2");
        assert!(!body.restricted);
        assert!(!format!("{body:?}").contains("hunter2"));
    }

    #[test]
    fn member_flags_default_to_allowed() {
        let body: MemberRequest = serde_json::from_str(r#"{"dev_id":"sensor-1"}"#).expect("parse");
        assert!(body.evt);
        assert!(body.cmd);
    }
}
