use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use crate::domain::value_objects::ValidationError;
use crate::{Error, ErrorKind};

/// Everything a handler can fail with, rendered as `{ "error": ..., "code": ... }`.
#[derive(Debug)]
pub enum ApiError {
    Domain(Error),
    Unauthorized,
    InvalidRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::State => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::External => StatusCode::BAD_GATEWAY,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Domain(e) => e.code(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self { ApiError::Domain(e) }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self { ApiError::Domain(e.into()) }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self { ApiError::InvalidRequest(e.to_string()) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Domain(e) => e.to_string(),
            ApiError::Unauthorized => "Missing or malformed x-user-id header".to_string(),
            ApiError::InvalidRequest(m) => m.clone(),
        };
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %message, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %message, "request rejected");
        }
        (status, Json(json!({ "error": message, "code": self.code() }))).into_response()
    }
}
