use auditrail_core::{AuditError, ErrorKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body or query string.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Audit(err) => match err.kind() {
                ErrorKind::InvalidEvent => StatusCode::BAD_REQUEST,
                ErrorKind::StorageUnavailable | ErrorKind::Cancelled => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> String {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST".to_string(),
            ApiError::Audit(err) => err.kind().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "Audit request failed");
        }

        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        if let ApiError::Audit(AuditError::InvalidEvent { missing, .. }) = &self {
            body["missing"] = json!(missing);
        }

        (status, Json(body)).into_response()
    }
}
