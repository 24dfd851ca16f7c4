use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned to API clients.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Sold out: {0}")]
    SoldOut(String),

    #[error("Gateway auth error: {0}")]
    AuthError(String),

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Helper for mapping SeaORM errors inside closures.
    pub fn db_error(err: DbErr) -> Self {
        ServiceError::DatabaseError(err)
    }

    fn status_and_label(&self) -> (StatusCode, &'static str) {
        match self {
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
            ServiceError::ValidationError(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            ServiceError::BadRequest(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            ServiceError::SoldOut(_) => (StatusCode::CONFLICT, "Conflict"),
            ServiceError::AuthError(_) | ServiceError::GatewayError(_) => {
                (StatusCode::BAD_GATEWAY, "Bad Gateway")
            }
            ServiceError::DatabaseError(_)
            | ServiceError::EventError(_)
            | ServiceError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(errors.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, label) = self.status_and_label();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = ErrorResponse {
            error: label.to_string(),
            message: self.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sold_out_maps_to_conflict() {
        let (status, label) = ServiceError::SoldOut("VIP".into()).status_and_label();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(label, "Conflict");
    }

    #[test]
    fn gateway_errors_map_to_bad_gateway() {
        let (status, _) = ServiceError::AuthError("missing key".into()).status_and_label();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let (status, _) = ServiceError::GatewayError("timeout".into()).status_and_label();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
