// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! Operator info endpoint.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use tracing::info;

use crate::error::ApiError;
use crate::service::OperatorInfo;
use crate::state::AppState;

use super::{
    decode_json_body, decode_signature, require_json_content_type, DataEnvelope,
    OperatorTypeQuery,
};

/// Same body shape as a credential request; the signature proves the
/// caller controls the identity it is asking about.
pub type OperatorInfoRequest = super::credentials::CreateCredentialRequest;

#[utoipa::path(
    post,
    path = "/rescue/v1/info",
    request_body = OperatorInfoRequest,
    params(OperatorTypeQuery),
    tag = "Operators",
    responses(
        (status = 200, body = OperatorInfo),
        (status = 400, description = "Malformed request body or message"),
        (status = 401, description = "Signature or timestamp rejected"),
        (status = 403, description = "Operator not authorized"),
    )
)]
pub async fn get_operator_info(
    State(state): State<AppState>,
    Query(query): Query<OperatorTypeQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DataEnvelope<OperatorInfo>>, ApiError> {
    require_json_content_type(&headers)?;
    let request: OperatorInfoRequest = decode_json_body(&body)?;
    let operator_type = query.resolve();

    info!(
        address = %request.address,
        version = %request.version,
        operator_type = %operator_type,
        "got operator info request"
    );

    let sig = decode_signature(&request.sig)?;
    let operator_info = state
        .service
        .get_operator_info(request.msg.as_bytes(), &sig, operator_type)
        .await?;

    Ok(Json(DataEnvelope {
        data: operator_info,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{request_body, test_app};
    use crate::clock::Clock;
    use crate::service::testutil::fake_clock;
    use crate::signature::Wallet;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn post_json(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn reports_history_and_quota() {
        let clock = fake_clock();
        let (app, harness) = test_app(clock.clone()).await;
        let wallet = Wallet::random();
        harness.register_node(wallet.address);

        let msg = format!("Rescue Node {}", clock.now().timestamp());

        // Issue one credential first.
        let response = app
            .clone()
            .oneshot(post_json(
                "/rescue/v1/credentials",
                request_body(&wallet, &msg),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(post_json("/rescue/v1/info", request_body(&wallet, &msg)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let data = &body["data"];

        let events = data["credentialEvents"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_i64().unwrap(), clock.now().timestamp());

        let quota = &data["quotaSettings"];
        assert_eq!(quota["count"].as_u64().unwrap(), 4);
        assert_eq!(
            quota["window"].as_i64().unwrap(),
            365 * 24 * 3600 * 1_000_000_000
        );
        assert_eq!(
            quota["authValidityWindow"].as_i64().unwrap(),
            15 * 24 * 3600 * 1_000_000_000
        );
    }

    #[tokio::test]
    async fn empty_history_still_returns_quota() {
        let clock = fake_clock();
        let (app, harness) = test_app(clock.clone()).await;
        let wallet = Wallet::random();
        harness.register_node(wallet.address);

        let msg = format!("Rescue Node {}", clock.now().timestamp());
        let response = app
            .oneshot(post_json("/rescue/v1/info", request_body(&wallet, &msg)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body["data"]["credentialEvents"].as_array().unwrap().len(),
            0
        );
        assert_eq!(body["data"]["quotaSettings"]["count"].as_u64().unwrap(), 4);
    }

    #[tokio::test]
    async fn unknown_identity_is_403() {
        let clock = fake_clock();
        let (app, _harness) = test_app(clock.clone()).await;
        let wallet = Wallet::random();

        let msg = format!("Rescue Node {}", clock.now().timestamp());
        let response = app
            .oneshot(post_json("/rescue/v1/info", request_body(&wallet, &msg)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
