//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`configd_core::Error`] so route handlers
//! can return `Result<T, AppError>` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub struct AppError {
    inner: configd_core::Error,
}

impl From<configd_core::Error> for AppError {
    fn from(e: configd_core::Error) -> Self {
        Self { inner: e }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.inner.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.inner, "server error in API handler");
        }

        let code = match &self.inner {
            configd_core::Error::NotFound { .. } => "not_found",
            configd_core::Error::AlreadyExists(_) => "already_exists",
            configd_core::Error::Conflict(_) => "conflict",
            configd_core::Error::InvalidArgument(_) => "invalid_argument",
            configd_core::Error::Unauthorized(_) => "unauthorized",
            configd_core::Error::Unavailable(_) => "unavailable",
            configd_core::Error::Database { .. } => "database_error",
            configd_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.inner.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_produces_404() {
        let err: AppError = configd_core::Error::not_found("environment", "prod").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_produces_401() {
        let err: AppError = configd_core::Error::Unauthorized("unknown api key".into()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unavailable_produces_503() {
        let err: AppError = configd_core::Error::Unavailable("database down".into()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
