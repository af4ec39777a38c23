// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! # API Error Handling
//!
//! A single HTTP-facing error type. Handlers return `Result<_, ApiError>`
//! and the error serializes itself as JSON:
//!
//! ```json
//! { "error": "node is not registered" }
//! ```
//!
//! Service-layer errors convert via `From`, which is where the kind → HTTP
//! status mapping lives: validation is 400, authentication 401,
//! authorization 403, and anything storage-shaped is a 500 with the detail
//! kept out of the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::service::ServiceError;

/// API error with HTTP status and message.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status code for the response.
    pub status: StatusCode,
    /// Human-readable error message (included in the JSON response).
    pub message: String,
}

/// JSON body structure for error responses.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 400: the request body or message is malformed.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 401: the request cannot be attributed to a signer.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// 403: the signer is not allowed to use the service.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// 415: the request body is not declared as JSON.
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, message)
    }

    /// 500: an unexpected server-side failure. Avoid exposing detail.
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::bad_request(msg),
            ServiceError::Authentication(msg) => ApiError::unauthorized(msg),
            ServiceError::Authorization(msg) => ApiError::forbidden(msg),
            ServiceError::Database(e) => {
                error!(error = %e, "request failed on the event store");
                ApiError::internal()
            }
            ServiceError::Internal(msg) => {
                error!(error = %msg, "request failed");
                ApiError::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn service_error_kinds_map_to_spec_status_codes() {
        let cases = [
            (
                ServiceError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::Authentication("who".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ServiceError::Authorization("no".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                ServiceError::Internal("oops".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let api_err = ApiError::from(ServiceError::Internal("secret path /var/db".into()));
        assert_eq!(api_err.message, "internal server error");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::forbidden("node is not registered").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"node is not registered"}"#);
    }
}
