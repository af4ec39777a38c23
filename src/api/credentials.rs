// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Rescue Node

//! Credential issuance endpoint.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::service::quota_for;
use crate::state::AppState;

use super::{
    decode_json_body, decode_signature, require_json_content_type, DataEnvelope,
    OperatorTypeQuery,
};

/// Body of a credential request.
///
/// `msg` carries the exact signed bytes; `sig` is the hex signature with an
/// optional `0x` prefix. `address` and `version` are recorded for
/// diagnostics only; the identity that matters is recovered from the
/// signature.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CreateCredentialRequest {
    pub address: String,
    pub msg: String,
    pub sig: String,
    pub version: String,
}

/// A freshly issued (or reissued) credential.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateCredentialResponse {
    /// Basic-auth username for the rescue node.
    pub username: String,
    /// Basic-auth password for the rescue node.
    pub password: String,
    /// Issuance moment, seconds since epoch.
    pub timestamp: i64,
    /// When the relay stops accepting this credential.
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

#[utoipa::path(
    post,
    path = "/rescue/v1/credentials",
    request_body = CreateCredentialRequest,
    params(OperatorTypeQuery),
    tag = "Credentials",
    responses(
        (status = 201, body = CreateCredentialResponse),
        (status = 400, description = "Malformed request body or message"),
        (status = 401, description = "Signature or timestamp rejected"),
        (status = 403, description = "Operator not authorized or over quota"),
    )
)]
pub async fn create_credential(
    State(state): State<AppState>,
    Query(query): Query<OperatorTypeQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    require_json_content_type(&headers)?;
    let request: CreateCredentialRequest = decode_json_body(&body)?;
    let operator_type = query.resolve();

    info!(
        address = %request.address,
        version = %request.version,
        operator_type = %operator_type,
        "got credential request"
    );

    let sig = decode_signature(&request.sig)?;
    let credential = state
        .service
        .create_credential_with_retry(request.msg.as_bytes(), &sig, operator_type)
        .await?;

    let timestamp = credential.credential.timestamp;
    let response = CreateCredentialResponse {
        username: credential.username(),
        password: credential.password(),
        timestamp,
        expires_at: timestamp + quota_for(operator_type).auth_validity_window.num_seconds(),
    };
    Ok((StatusCode::CREATED, Json(DataEnvelope { data: response })).into_response())
}
