// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication status and logout.

use std::collections::{BTreeMap, HashMap};

use axum::{
	body::Bytes,
	extract::State,
	http::{header, HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	Json,
};
use serde::Serialize;
use terrareg_server_auth::AuthRequest;
use tracing::{debug, info};

use crate::{api::AppState, auth_middleware::Auth, error::ServerError};

#[derive(Debug, Serialize)]
pub struct AuthStatus {
	pub authenticated: bool,
	pub read_access: bool,
	pub site_admin: bool,
	pub namespace_permissions: BTreeMap<String, &'static str>,
	pub auth_method: &'static str,
}

/// GET /v1/terrareg/auth/admin/is_authenticated
pub async fn is_authenticated(Auth(context): Auth) -> Json<AuthStatus> {
	Json(AuthStatus {
		authenticated: context.is_authenticated(),
		read_access: context.can_access_read_api(),
		site_admin: context.is_admin(),
		namespace_permissions: context
			.namespace_permissions()
			.iter()
			.map(|(namespace, permission)| (namespace.clone(), permission.as_str()))
			.collect(),
		auth_method: context.provider_type().as_str(),
	})
}

/// POST /logout
///
/// Accepts the CSRF token as the `X-CSRF-Token` header or a urlencoded
/// `csrf_token` form field.
pub async fn logout(
	State(state): State<AppState>,
	Auth(context): Auth,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Response, ServerError> {
	let form: HashMap<String, String> = url::form_urlencoded::parse(&body).into_owned().collect();
	let request = AuthRequest::new(headers)
		.with_form(form)
		.with_sessions(
			state.session_lookup(),
			state.auth_config.session_cookie_name.clone(),
		);

	context.check_csrf_token(request.csrf_token())?;

	if context.provider_type().is_session() {
		if let Some(session_id) = request.session_id() {
			let deleted = state.sessions.delete_session(session_id).await?;
			info!(username = %context.username(), deleted, "session logged out");
		}
	} else {
		debug!(auth_method = %context.provider_type(), "logout without a session");
	}

	let cookie = format!(
		"{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax",
		state.auth_config.session_cookie_name
	);
	Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]).into_response())
}
