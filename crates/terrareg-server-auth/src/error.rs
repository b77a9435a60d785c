// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication error taxonomy.
//!
//! Every variant carries the [`AuthMethodType`] that raised it so that logs
//! can attribute failures. The user-visible message never distinguishes an
//! unknown key from an unknown session.

use std::fmt;

use thiserror::Error;

use crate::types::AuthMethodType;

#[derive(Debug, Error)]
pub enum AuthError {
	// =========================================================================
	// Credential Errors (401)
	// =========================================================================
	/// No credentials of any shape were presented.
	#[error("authentication required")]
	MissingCredential { method: AuthMethodType },

	/// A credential is present but cannot be parsed.
	#[error("malformed credential: {reason}")]
	MalformedCredential {
		method: AuthMethodType,
		reason: String,
	},

	/// A credential parsed but is wrong (unknown key, bad secret, replayed code).
	#[error("invalid credentials")]
	InvalidCredential { method: AuthMethodType },

	/// A structurally valid credential past its expiry.
	#[error("credential expired")]
	ExpiredCredential { method: AuthMethodType },

	/// The presented session id does not exist.
	#[error("invalid credentials")]
	SessionNotFound { method: AuthMethodType },

	/// JWT signature verification failed.
	#[error("signature verification failed")]
	SignatureInvalid { method: AuthMethodType },

	/// Token claims (issuer, audience, issued-at) were rejected.
	#[error("token claims rejected: {reason}")]
	IssuerAudienceMismatch {
		method: AuthMethodType,
		reason: String,
	},

	// =========================================================================
	// Abstentions
	// =========================================================================
	/// The session payload belongs to a different session method.
	#[error("session payload does not match {method}")]
	ProviderMismatch { method: AuthMethodType },

	// =========================================================================
	// Infrastructure Errors (500)
	// =========================================================================
	#[error("internal authentication error: {message}")]
	Internal {
		method: AuthMethodType,
		message: String,
	},
}

impl AuthError {
	pub fn malformed(method: AuthMethodType, reason: impl Into<String>) -> Self {
		AuthError::MalformedCredential {
			method,
			reason: reason.into(),
		}
	}

	pub fn claims(method: AuthMethodType, reason: impl Into<String>) -> Self {
		AuthError::IssuerAudienceMismatch {
			method,
			reason: reason.into(),
		}
	}

	pub fn internal(method: AuthMethodType, error: impl fmt::Display) -> Self {
		AuthError::Internal {
			method,
			message: error.to_string(),
		}
	}

	/// The method that raised this error.
	pub fn method(&self) -> AuthMethodType {
		match self {
			AuthError::MissingCredential { method }
			| AuthError::MalformedCredential { method, .. }
			| AuthError::InvalidCredential { method }
			| AuthError::ExpiredCredential { method }
			| AuthError::SessionNotFound { method }
			| AuthError::SignatureInvalid { method }
			| AuthError::IssuerAudienceMismatch { method, .. }
			| AuthError::ProviderMismatch { method }
			| AuthError::Internal { method, .. } => *method,
		}
	}

	/// Stable machine-readable tag used in HTTP error bodies.
	pub fn tag(&self) -> &'static str {
		match self {
			AuthError::MissingCredential { .. } => "missing_credential",
			AuthError::MalformedCredential { .. } => "malformed_credential",
			AuthError::InvalidCredential { .. } => "invalid_credential",
			AuthError::ExpiredCredential { .. } => "expired_credential",
			AuthError::SessionNotFound { .. } => "session_not_found",
			AuthError::SignatureInvalid { .. } => "signature_invalid",
			AuthError::IssuerAudienceMismatch { .. } => "issuer_audience_mismatch",
			AuthError::ProviderMismatch { .. } => "provider_mismatch",
			AuthError::Internal { .. } => "internal_auth_error",
		}
	}

	/// Errors the dispatcher treats as "not my credentials" and walks past.
	pub fn is_abstention(&self) -> bool {
		matches!(
			self,
			AuthError::SessionNotFound { .. } | AuthError::ProviderMismatch { .. }
		)
	}

	/// Returns true if this error should be logged at error level.
	pub fn is_internal(&self) -> bool {
		matches!(self, AuthError::Internal { .. })
	}

	/// Returns the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			AuthError::Internal { .. } => 500,
			_ => 401,
		}
	}

	/// Message safe to return to the client.
	pub fn public_message(&self) -> String {
		match self {
			AuthError::Internal { .. } => "an internal error occurred".to_string(),
			other => other.to_string(),
		}
	}
}
