// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the embedded Terraform identity provider.

use terrareg_server_auth::AuthError;
use thiserror::Error;

pub type IdpResult<T> = Result<T, IdpError>;

#[derive(Debug, Error)]
pub enum IdpError {
	// =========================================================================
	// Protocol Errors (4xx)
	// =========================================================================
	#[error("invalid request: {0}")]
	InvalidRequest(String),

	#[error("unknown client: {0}")]
	ClientNotFound(String),

	#[error("client authentication failed")]
	InvalidClient,

	#[error("redirect URI not registered for client")]
	InvalidRedirectUri,

	#[error("unsupported response type: {0}")]
	UnsupportedResponseType(String),

	#[error("unsupported grant type: {0}")]
	UnsupportedGrantType(String),

	/// Bad, expired or replayed authorization code, or a failed PKCE check.
	#[error("invalid credentials: {0}")]
	InvalidCredential(String),

	#[error("access denied: {0}")]
	AccessDenied(String),

	/// Bearer token rejected at the userinfo endpoint.
	#[error(transparent)]
	Unauthorized(AuthError),

	// =========================================================================
	// Infrastructure Errors (5xx)
	// =========================================================================
	#[error("signing key error: {0}")]
	Key(String),

	#[error("token signing failed: {0}")]
	Signing(String),

	#[error("storage error: {0}")]
	Store(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl IdpError {
	pub fn store(error: impl std::fmt::Display) -> Self {
		IdpError::Store(error.to_string())
	}

	pub fn status_code(&self) -> u16 {
		match self {
			IdpError::InvalidRequest(_)
			| IdpError::InvalidRedirectUri
			| IdpError::UnsupportedResponseType(_)
			| IdpError::UnsupportedGrantType(_)
			| IdpError::InvalidCredential(_) => 400,
			IdpError::InvalidClient => 401,
			IdpError::Unauthorized(e) => e.status_code(),
			IdpError::AccessDenied(_) => 403,
			IdpError::ClientNotFound(_) => 404,
			IdpError::Key(_)
			| IdpError::Signing(_)
			| IdpError::Store(_)
			| IdpError::Serialization(_) => 500,
		}
	}

	/// Stable machine tag used as the `error` field of JSON bodies.
	pub fn tag(&self) -> &'static str {
		match self {
			IdpError::InvalidRequest(_) => "invalid_request",
			IdpError::ClientNotFound(_) => "client_not_found",
			IdpError::InvalidClient => "invalid_client",
			IdpError::InvalidRedirectUri => "invalid_redirect_uri",
			IdpError::UnsupportedResponseType(_) => "unsupported_response_type",
			IdpError::UnsupportedGrantType(_) => "unsupported_grant_type",
			IdpError::InvalidCredential(_) => "invalid_credential",
			IdpError::AccessDenied(_) => "access_denied",
			IdpError::Unauthorized(e) => e.tag(),
			IdpError::Key(_) | IdpError::Signing(_) => "key_error",
			IdpError::Store(_) => "storage_error",
			IdpError::Serialization(_) => "serialization_error",
		}
	}

	pub fn is_internal(&self) -> bool {
		self.status_code() >= 500
	}
}

impl From<AuthError> for IdpError {
	fn from(error: AuthError) -> Self {
		if error.is_internal() {
			IdpError::Store(error.to_string())
		} else {
			IdpError::Unauthorized(error)
		}
	}
}
