//! Error types for the Gateway
//!
//! [`GatewayError`] is also the HTTP error surface: every variant maps to a
//! status code and a JSON body with a stable `error` field.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lessonforge_core::ForgeError;
use lessonforge_sandbox::CompileError;
use serde_json::json;
use thiserror::Error;

/// Gateway error type
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Pipeline(#[from] ForgeError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Request body refused by an extractor, with the extractor's status
    #[error("Rejected request body: {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Serialization(e.to_string())
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

/// Result type for Gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Pipeline(e) => match e {
                ForgeError::AdmissionRejected(_) => StatusCode::BAD_REQUEST,
                ForgeError::DuplicateRequest(_) => StatusCode::CONFLICT,
                ForgeError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                ForgeError::LessonNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Compile(CompileError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Compile(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            GatewayError::Compile(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Rejected { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            GatewayError::Pipeline(e) => e.kind().as_str(),
            GatewayError::Compile(_) => "compilation_failed",
            GatewayError::RateLimitExceeded { .. } => "quota_exceeded",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Rejected { status, .. } if *status == StatusCode::PAYLOAD_TOO_LARGE => {
                "payload_too_large"
            }
            GatewayError::Rejected { status, .. } if status.is_client_error() => "bad_request",
            _ => "internal",
        }
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GatewayError::RateLimitExceeded { retry_after_secs }
            | GatewayError::Pipeline(ForgeError::QuotaExceeded { retry_after_secs }) => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            GatewayError::Pipeline(ForgeError::AdmissionRejected(rejection)) => json!({
                "error": self.kind(),
                "stage": rejection.stage,
                "message": rejection.message,
                "suggestion": rejection.suggestion(),
            }),
            GatewayError::Pipeline(ForgeError::DuplicateRequest(id)) => json!({
                "error": self.kind(),
                "message": self.to_string(),
                "lesson_id": id,
            }),
            _ if self.status().is_server_error() => json!({
                "error": self.kind(),
                "message": "Internal server error",
            }),
            _ => json!({
                "error": self.kind(),
                "message": self.to_string(),
            }),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::debug!("request refused ({}): {}", status, self);
        }

        let mut response = (status, Json(self.body())).into_response();
        if let Some(secs) = self.retry_after_secs() {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonforge_core::AdmissionFilter;

    #[test]
    fn test_status_mapping() {
        let rejection = AdmissionFilter::check("hi").into_result().unwrap_err();
        assert_eq!(
            GatewayError::from(ForgeError::from(rejection)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::from(ForgeError::DuplicateRequest(uuid::Uuid::new_v4())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GatewayError::from(CompileError::TooLarge { size: 600_000, max: 512_000 }).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            GatewayError::from(CompileError::TooSmall { size: 10, min: 100 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::from(CompileError::EmptyOutput).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = GatewayError::RateLimitExceeded { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn test_rejected_body_keeps_extractor_status() {
        let err = GatewayError::Rejected {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "length limit exceeded".into(),
        };
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.body()["error"], "payload_too_large");

        let err = GatewayError::Rejected {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            message: "expected application/json".into(),
        };
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err.body()["error"], "bad_request");
    }

    #[test]
    fn test_internal_details_are_not_leaked() {
        let err = GatewayError::Internal("database path /secret/lessons.db".into());
        assert_eq!(err.body()["message"], "Internal server error");
    }
}
