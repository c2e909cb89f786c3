//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Centralizes HTTP error response construction to keep error shapes uniform
//! across endpoints, and maps registry failures onto status codes.
//!
//! # Key invariants and assumptions
//! - Error responses must include a stable `code` and human-readable `message`.
//! - Status codes must align with the error category:
//!   reserved id 422, collision 409, not found 404, invalid request 400,
//!   broker document or channel unavailable 503, store failure 500.
//!
//! # Security considerations
//! - Internal errors log details server-side but return generic messages.
use crate::api::types::ErrorResponse;
use crate::registry::RegistryError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use iotgate_dynsec::SyncError;

/// Structured API error returned by handlers.
///
/// # Invariants
/// - `status` must match the semantics of `body.code`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
        },
    }
}

pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

/// Build a 409 Conflict error with a caller-provided conflict code.
pub fn api_conflict(code: &str, message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, code, message)
}

pub fn api_reserved(message: &str) -> ApiError {
    api_error(StatusCode::UNPROCESSABLE_ENTITY, "reserved_identifier", message)
}

pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_error", message)
}

/// Build a 503 for a broker dependency (document or control connection).
pub fn api_unavailable(code: &str, message: &str) -> ApiError {
    api_error(StatusCode::SERVICE_UNAVAILABLE, code, message)
}

pub fn api_internal_message(message: &str) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Sync(SyncError::ReservedIdentifier(id)) => {
                api_reserved(&format!("app id {id:?} is reserved"))
            }
            RegistryError::Sync(SyncError::DocumentUnavailable(err)) => {
                tracing::error!(error = %err, "security document unavailable");
                api_unavailable("document_unavailable", "broker security document unavailable")
            }
            RegistryError::Sync(SyncError::ChannelUnavailable(err)) => {
                tracing::error!(error = %err, "broker command channel unavailable");
                api_unavailable("channel_unavailable", "broker command channel unavailable")
            }
            RegistryError::IdentifierCollision { id, owner } => api_conflict(
                "already_exists",
                &format!("identifier {id} is already used by a {owner}"),
            ),
            RegistryError::NotFound { kind, id } => api_not_found(&format!("{kind} {id} not found")),
            RegistryError::InvalidRequest(message) => api_validation_error(&message),
            RegistryError::Store(err) => {
                tracing::error!(error = ?err, "app store error");
                api_internal_message("app store failure")
            }
        }
    }
}
