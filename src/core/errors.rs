use axum::extract::rejection::JsonRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// One entry of a 422 response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("request validation failed")]
    Validation(Vec<FieldError>),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("rate limit exceeded")]
    TooManyRequests,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let kind = match &rejection {
            JsonRejection::JsonDataError(_) => "value_error",
            JsonRejection::JsonSyntaxError(_) => "json_invalid",
            JsonRejection::MissingJsonContentType(_) => "content_type",
            _ => "body_error",
        };
        ApiError::Validation(vec![FieldError::new("body", rejection.body_text(), kind)])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::Validation(errors) => json!({
                "error": "ValidationError",
                "detail": "Request validation failed",
                "status_code": status.as_u16(),
                "validation_errors": errors,
            }),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                json!({
                    "error": "InternalServerError",
                    "detail": msg,
                    "status_code": status.as_u16(),
                })
            }
            ApiError::BadRequest(msg) => json!({
                "error": "BadRequest",
                "detail": msg,
                "status_code": status.as_u16(),
            }),
            ApiError::NotFound(msg) => json!({
                "error": "NotFound",
                "detail": msg,
                "status_code": status.as_u16(),
            }),
            ApiError::ServiceUnavailable(msg) => json!({
                "error": "ServiceUnavailable",
                "detail": msg,
                "status_code": status.as_u16(),
            }),
            ApiError::TooManyRequests => json!({
                "error": "RateLimitExceeded",
                "detail": "Too many requests, slow down",
                "status_code": status.as_u16(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_422() {
        let err = ApiError::Validation(vec![FieldError::new("message", "too long", "string_too_long")]);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn service_unavailable_maps_to_503() {
        let err = ApiError::ServiceUnavailable("agent".into());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "service unavailable: agent");
    }

    #[test]
    fn field_error_serializes_kind_as_type() {
        let value = serde_json::to_value(FieldError::new("a", "b", "c")).unwrap();
        assert_eq!(value, json!({"field": "a", "message": "b", "type": "c"}));
    }
}
