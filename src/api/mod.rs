// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! # HTTP Surface
//!
//! Two endpoints under a configurable base path (default `/rescue/v1`):
//!
//! - `POST /credentials` — issue (or reissue) a credential; 201 on success
//! - `POST /info` — report issuance history and quota settings; 200
//!
//! Both routes also answer `GET` and `OPTIONS` so CORS-minded clients can
//! probe them; the CORS layer handles preflight. Request bodies are capped
//! at 2048 bytes, must declare `application/json`, and must contain exactly
//! one JSON object with no unknown fields.

pub mod credentials;
pub mod operator_info;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderMap, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};
use utoipa::{IntoParams, OpenApi};

use crate::error::ApiError;
use crate::models::OperatorType;
use crate::state::AppState;

/// Default mount point for the API routes.
pub const DEFAULT_BASE_PATH: &str = "/rescue/v1";

/// Request bodies larger than this are rejected outright.
const MAX_REQUEST_BODY_BYTES: usize = 2048;

/// Build the application router.
pub fn router(state: AppState, base_path: &str, allowed_origins: &[String]) -> Router {
    let routes = Router::new()
        .route(
            "/credentials",
            post(credentials::create_credential).get(credentials::create_credential),
        )
        .route(
            "/credentials/",
            post(credentials::create_credential).get(credentials::create_credential),
        )
        .route(
            "/info",
            post(operator_info::get_operator_info).get(operator_info::get_operator_info),
        )
        .route(
            "/info/",
            post(operator_info::get_operator_info).get(operator_info::get_operator_info),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .with_state(state);

    Router::new()
        .nest(base_path, routes)
        .route("/api-doc/openapi.json", get(openapi_json))
        .layer(build_cors_layer(allowed_origins))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the CORS layer from the configured origin list.
///
/// A literal `*` anywhere in the list means permissive CORS; otherwise
/// only the listed origins are allowed.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        warn!("CORS: allowing all origins");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    info!(origins = ?allowed_origins, "CORS: restricting to configured origins");
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// Shared request plumbing
// =============================================================================

/// The `operator_type` query parameter accepted by both endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct OperatorTypeQuery {
    /// `solo` selects the solo-validator path; anything else (or nothing)
    /// means rocket-pool.
    pub operator_type: Option<String>,
}

impl OperatorTypeQuery {
    pub fn resolve(&self) -> OperatorType {
        OperatorType::from_query(self.operator_type.as_deref())
    }
}

/// Success envelope: every 2xx body is `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Reject requests whose `Content-Type` does not parse to
/// `application/json` (parameters such as `charset` are tolerated).
pub(crate) fn require_json_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    if media_type.eq_ignore_ascii_case("application/json") {
        Ok(())
    } else {
        Err(ApiError::unsupported_media_type(
            "Content-Type is not application/json",
        ))
    }
}

/// Decode the body as exactly one JSON object of the expected shape.
///
/// `serde_json` rejects trailing input, which covers the
/// multiple-objects case; unknown fields are rejected by the request
/// types themselves.
pub(crate) fn decode_json_body<T: serde::de::DeserializeOwned>(
    body: &[u8],
) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|_| {
        ApiError::bad_request("invalid or multiple JSON objects in request body")
    })
}

/// Decode the hex signature field, with or without a `0x` prefix.
pub(crate) fn decode_signature(sig: &str) -> Result<Vec<u8>, ApiError> {
    let hex = sig.strip_prefix("0x").unwrap_or(sig);
    alloy::hex::decode(hex).map_err(|_| ApiError::unauthorized("invalid signature encoding"))
}

// =============================================================================
// OpenAPI document
// =============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(credentials::create_credential, operator_info::get_operator_info),
    components(schemas(
        credentials::CreateCredentialRequest,
        credentials::CreateCredentialResponse,
        crate::service::OperatorInfo,
        crate::service::QuotaSettings,
        OperatorType,
    )),
    tags(
        (name = "Credentials", description = "Credential issuance"),
        (name = "Operators", description = "Operator issuance history")
    )
)]
struct ApiDoc;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::service::testutil::{harness, TestHarness};
    use std::sync::Arc;

    /// A router over a fully wired in-memory service.
    pub(crate) async fn test_app(clock: Arc<dyn crate::clock::Clock>) -> (Router, TestHarness) {
        let harness = harness(clock).await;
        let app = router(
            AppState::new(Arc::clone(&harness.service)),
            DEFAULT_BASE_PATH,
            &["*".to_string()],
        );
        (app, harness)
    }

    /// Build a JSON request body for the given wallet and message.
    pub(crate) fn request_body(
        wallet: &crate::signature::Wallet,
        msg: &str,
    ) -> String {
        let sig = wallet.sign(msg.as_bytes());
        serde_json::json!({
            "address": format!("{}", wallet.address),
            "msg": msg,
            "sig": format!("0x{}", alloy::hex::encode(sig)),
            "version": "test/0.0.0",
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil::fake_clock;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_builds_and_serves_openapi_json() {
        let (app, _harness) = testutil::test_app(fake_clock()).await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api-doc/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let (app, _harness) = testutil::test_app(fake_clock()).await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/rescue/v1/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn content_type_parsing_tolerates_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(require_json_content_type(&headers).is_ok());

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        );
        assert!(require_json_content_type(&headers).is_err());

        assert!(require_json_content_type(&HeaderMap::new()).is_err());
    }

    #[test]
    fn signature_decoding_accepts_both_prefix_forms() {
        let bytes = decode_signature("0xdeadbeef").unwrap();
        assert_eq!(bytes, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode_signature("deadbeef").unwrap(), bytes);
        assert!(decode_signature("0xzz").is_err());
    }
}
