// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Authentication middleware for Axum.
//!
//! [`auth_layer`] runs the [`AuthDispatcher`](terrareg_server_auth::AuthDispatcher)
//! once per request and stores the resulting [`AuthContext`] as a request
//! extension. Handlers read it back through [`Auth`] or [`RequireAuth`].
//!
//! A request whose credentials are rejected never reaches a handler; a
//! request with no credentials proceeds with the unauthenticated context.

use std::convert::Infallible;

use axum::{
	body::Body,
	extract::{FromRequestParts, State},
	http::{request::Parts, Request},
	middleware::Next,
	response::{IntoResponse, Response},
};
use terrareg_server_auth::{AuthContext, AuthRequest};
use tracing::{instrument, Span};

use crate::{api::AppState, error::ServerError};

#[instrument(
	name = "auth",
	skip_all,
	fields(
		auth_method = tracing::field::Empty,
		username = tracing::field::Empty,
	)
)]
pub async fn auth_layer(
	State(state): State<AppState>,
	mut request: Request<Body>,
	next: Next,
) -> Response {
	let auth_request = AuthRequest::new(request.headers().clone())
		.with_query(request.uri().query())
		.with_sessions(
			state.session_lookup(),
			state.auth_config.session_cookie_name.clone(),
		);

	let context = match state.dispatcher.authenticate(&auth_request).await {
		Ok(context) => context,
		Err(e) => return ServerError::Auth(e).into_response(),
	};

	let span = Span::current();
	span.record("auth_method", context.provider_type().as_str());
	if context.is_authenticated() {
		span.record("username", context.username());
	}

	request.extensions_mut().insert(context);
	next.run(request).await
}

/// The request's auth context; unauthenticated when the layer did not run.
pub struct Auth(pub AuthContext);

impl<S> FromRequestParts<S> for Auth
where
	S: Send + Sync,
{
	type Rejection = Infallible;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		Ok(Auth(
			parts
				.extensions
				.get::<AuthContext>()
				.cloned()
				.unwrap_or_else(AuthContext::unauthenticated),
		))
	}
}

/// Rejects unauthenticated requests with 401.
pub struct RequireAuth(pub AuthContext);

impl<S> FromRequestParts<S> for RequireAuth
where
	S: Send + Sync,
{
	type Rejection = ServerError;

	async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
		let Auth(context) = Auth::from_request_parts(parts, state)
			.await
			.unwrap_or_else(|never| match never {});
		context.require_authenticated()?;
		Ok(RequireAuth(context))
	}
}
