// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Routes of the embedded Terraform identity provider.
//!
//! Every route answers 404 when the provider is disabled.

use std::sync::Arc;

use axum::{
	extract::{Query, State},
	http::{header, HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	Form, Json,
};
use terrareg_server_auth::{AuthError, AuthMethodType, AuthRequest, BearerCredential};
use terrareg_server_idp::{
	AuthorizationRequest, DiscoveryDocument, JsonWebKeySet, RevocationRequest, TerraformIdp,
	TokenRequest, UserInfo,
};

use crate::{api::AppState, auth_middleware::Auth, error::ServerError};

fn enabled(state: &AppState) -> Result<&Arc<TerraformIdp>, ServerError> {
	state
		.idp
		.as_ref()
		.ok_or_else(|| ServerError::NotFound("Terraform IdP is not enabled".to_string()))
}

/// GET /.well-known/openid-configuration
pub async fn openid_configuration(
	State(state): State<AppState>,
) -> Result<Json<DiscoveryDocument>, ServerError> {
	Ok(Json(enabled(&state)?.discovery_document()))
}

/// GET /terraform/oidc/jwks
pub async fn jwks(State(state): State<AppState>) -> Result<Json<JsonWebKeySet>, ServerError> {
	let jwks = enabled(&state)?.jwks();
	Ok(Json(JsonWebKeySet::clone(&jwks)))
}

/// GET /terraform/oidc/authorize
pub async fn authorize(
	State(state): State<AppState>,
	Auth(context): Auth,
	Query(request): Query<AuthorizationRequest>,
) -> Result<Response, ServerError> {
	let redirect = enabled(&state)?.authorize(&context, request).await?;
	Ok((StatusCode::FOUND, [(header::LOCATION, redirect.to_string())]).into_response())
}

/// POST /terraform/oidc/token
pub async fn token(
	State(state): State<AppState>,
	Form(request): Form<TokenRequest>,
) -> Result<Response, ServerError> {
	let response = enabled(&state)?.exchange_code(request).await?;
	Ok((
		[
			(header::CACHE_CONTROL, "no-store"),
			(header::PRAGMA, "no-cache"),
		],
		Json(response),
	)
		.into_response())
}

/// GET /terraform/oidc/userinfo
pub async fn userinfo(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<UserInfo>, ServerError> {
	let idp = enabled(&state)?;
	let request = AuthRequest::new(headers);
	let token = match request.bearer() {
		BearerCredential::Token(token) => token,
		BearerCredential::Empty => {
			return Err(
				AuthError::malformed(AuthMethodType::TerraformOidc, "empty bearer token").into(),
			)
		}
		BearerCredential::Absent => {
			return Err(AuthError::MissingCredential {
				method: AuthMethodType::TerraformOidc,
			}
			.into())
		}
	};
	Ok(Json(idp.userinfo(token).await?))
}

/// POST /terraform/oidc/revoke
pub async fn revoke(
	State(state): State<AppState>,
	Form(request): Form<RevocationRequest>,
) -> Result<StatusCode, ServerError> {
	enabled(&state)?.revoke(request).await?;
	Ok(StatusCode::OK)
}

