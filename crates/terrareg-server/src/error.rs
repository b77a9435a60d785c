// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Server error types and HTTP response conversions.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::{Deserialize, Serialize};
use terrareg_server_auth::AuthError;
use terrareg_server_db::DbError;
use terrareg_server_idp::IdpError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	/// Credential rejected by an auth method.
	#[error(transparent)]
	Auth(#[from] AuthError),

	/// Identity provider protocol or infrastructure error.
	#[error(transparent)]
	Idp(#[from] IdpError),

	#[error("Database error: {0}")]
	Db(#[from] DbError),

	#[error("Invalid request: {0}")]
	BadRequest(String),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Internal error: {0}")]
	Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

fn status(code: u16) -> StatusCode {
	StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let (status, error_response) = match &self {
			ServerError::Auth(e) if e.is_internal() => {
				tracing::error!(auth_method = %e.method(), error = %e, "authentication failed");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					ErrorResponse {
						error: e.tag().to_string(),
						message: e.public_message(),
					},
				)
			}
			ServerError::Auth(e) => {
				tracing::warn!(auth_method = %e.method(), error = e.tag(), "authentication rejected");
				(
					status(e.status_code()),
					ErrorResponse {
						error: e.tag().to_string(),
						message: e.public_message(),
					},
				)
			}
			ServerError::Idp(e) if e.is_internal() => {
				tracing::error!(error = %e, "identity provider error");
				(
					status(e.status_code()),
					ErrorResponse {
						error: e.tag().to_string(),
						message: "An internal error occurred".to_string(),
					},
				)
			}
			ServerError::Idp(e) => {
				tracing::warn!(error = e.tag(), "identity provider request rejected");
				let message = match e {
					IdpError::Unauthorized(auth) => auth.public_message(),
					other => other.to_string(),
				};
				(
					status(e.status_code()),
					ErrorResponse {
						error: e.tag().to_string(),
						message,
					},
				)
			}
			ServerError::Db(e) => {
				tracing::error!(error = %e, "database error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					ErrorResponse {
						error: "database_error".to_string(),
						message: "A database error occurred".to_string(),
					},
				)
			}
			ServerError::BadRequest(msg) => (
				StatusCode::BAD_REQUEST,
				ErrorResponse {
					error: "bad_request".to_string(),
					message: msg.clone(),
				},
			),
			ServerError::NotFound(msg) => (
				StatusCode::NOT_FOUND,
				ErrorResponse {
					error: "not_found".to_string(),
					message: msg.clone(),
				},
			),
			ServerError::Internal(msg) => {
				tracing::error!(error = %msg, "internal error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					ErrorResponse {
						error: "internal_error".to_string(),
						message: "An internal error occurred".to_string(),
					},
				)
			}
		};

		(status, Json(error_response)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use terrareg_server_auth::AuthMethodType;

	async fn body(error: ServerError) -> (StatusCode, ErrorResponse) {
		let response = error.into_response();
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		(status, serde_json::from_slice(&bytes).unwrap())
	}

	#[tokio::test]
	async fn credential_errors_hide_details() {
		let (status, payload) = body(ServerError::Auth(AuthError::InvalidCredential {
			method: AuthMethodType::AdminApiKey,
		}))
		.await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(payload.error, "invalid_credential");
		assert_eq!(payload.message, "invalid credentials");
	}

	#[tokio::test]
	async fn internal_auth_errors_are_500() {
		let (status, payload) = body(ServerError::Auth(AuthError::internal(
			AuthMethodType::AdminSession,
			"sqlite: disk I/O error",
		)))
		.await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(payload.error, "internal_auth_error");
		assert!(!payload.message.contains("sqlite"));
	}

	#[tokio::test]
	async fn idp_errors_keep_their_tag() {
		let (status, payload) = body(ServerError::Idp(IdpError::InvalidCredential(
			"authorization code is invalid".to_string(),
		)))
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(payload.error, "invalid_credential");

		let (status, payload) = body(ServerError::Idp(IdpError::Store("disk full".to_string()))).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert!(!payload.message.contains("disk"));
	}

	fn any_method() -> impl Strategy<Value = AuthMethodType> {
		proptest::sample::select(AuthMethodType::ALL.to_vec())
	}

	proptest! {
		#[test]
		fn only_internal_auth_errors_are_server_errors(method in any_method(), detail in ".{0,40}") {
			let credential = [
				AuthError::MissingCredential { method },
				AuthError::malformed(method, detail.clone()),
				AuthError::InvalidCredential { method },
				AuthError::ExpiredCredential { method },
				AuthError::SignatureInvalid { method },
				AuthError::claims(method, detail.clone()),
			];
			for error in credential {
				let status = ServerError::Auth(error).into_response().status();
				prop_assert_eq!(status, StatusCode::UNAUTHORIZED);
			}

			let status = ServerError::Auth(AuthError::internal(method, detail))
				.into_response()
				.status();
			prop_assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		}
	}
}
