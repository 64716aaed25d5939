//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::ErrorKind;
use workflow::WorkflowError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed identity headers.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Request could not be parsed.
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// An engine refused or failed the operation.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::CooldownActive => StatusCode::CONFLICT,
        ErrorKind::Ineligible => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvalidTransition
        | ErrorKind::Validation
        | ErrorKind::PaymentNotConfirmed
        | ErrorKind::PaymentCodeMismatch => StatusCode::BAD_REQUEST,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": msg, "kind": "unauthorized" }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg, "kind": ErrorKind::Validation }),
            ),
            ApiError::Workflow(err) => {
                let kind = err.kind();
                let status = status_for(kind);
                metrics::counter!("api_errors_total", "kind" => kind.as_str()).increment(1);
                if status.is_server_error() {
                    tracing::error!(error = %err, "internal server error");
                }
                let mut body = serde_json::json!({ "error": err.to_string(), "kind": kind });
                if let Some(days) = err.cooldown_days_remaining() {
                    body["days_remaining"] = days.into();
                }
                (status, body)
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::CooldownActive), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::Ineligible),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(ErrorKind::PaymentCodeMismatch),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(ErrorKind::PermissionDenied), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(ErrorKind::Infrastructure),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_cooldown_body_carries_days() {
        let err = ApiError::from(WorkflowError::from(domain::LicenseError::CooldownActive {
            days_remaining: 4,
        }));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["kind"], "cooldown_active");
        assert_eq!(json["days_remaining"], 4);
    }
}
