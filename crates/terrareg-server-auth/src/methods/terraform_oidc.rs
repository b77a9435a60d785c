// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bearer access tokens minted by the embedded Terraform identity provider.

use std::sync::Arc;

use async_trait::async_trait;
use terrareg_common_secret::Secret;
use tracing::debug;

use super::AuthMethod;
use crate::context::AuthContext;
use crate::error::AuthError;
use crate::request::{AuthRequest, BearerCredential};
use crate::store::TerraformTokenVerifier;
use crate::types::AuthMethodType;

/// A compact JWS has three non-empty dot separated segments.
pub(crate) fn looks_like_jwt(token: &str) -> bool {
	let mut segments = 0;
	for segment in token.split('.') {
		if segment.is_empty() {
			return false;
		}
		segments += 1;
	}
	segments == 3
}

pub struct TerraformOidc {
	verifier: Option<Arc<dyn TerraformTokenVerifier>>,
}

impl TerraformOidc {
	pub fn new(verifier: Option<Arc<dyn TerraformTokenVerifier>>) -> Self {
		Self { verifier }
	}
}

#[async_trait]
impl AuthMethod for TerraformOidc {
	fn method_type(&self) -> AuthMethodType {
		AuthMethodType::TerraformOidc
	}

	fn is_enabled(&self) -> bool {
		self.verifier.is_some()
	}

	async fn authenticate(&self, request: &AuthRequest) -> Result<Option<AuthContext>, AuthError> {
		let Some(verifier) = &self.verifier else {
			return Ok(None);
		};

		let token = match request.bearer() {
			BearerCredential::Absent => return Ok(None),
			BearerCredential::Empty => {
				return Err(AuthError::malformed(
					AuthMethodType::TerraformOidc,
					"bearer token missing",
				))
			}
			BearerCredential::Token(token) => token,
		};

		if !looks_like_jwt(token) {
			debug!("bearer token is not a JWT, abstaining");
			return Ok(None);
		}

		let identity = verifier.verify_access_token(token).await?;

		Ok(Some(
			AuthContext::builder(AuthMethodType::TerraformOidc, identity.username)
				.terraform_api(true)
				.terraform_auth_token(Secret::new(token.to_string()))
				.provider_data("sub", identity.subject)
				.provider_data("client_id", identity.client_id)
				.provider_data("scope", identity.scope)
				.build(),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{request, StaticTerraformVerifier};

	fn method() -> TerraformOidc {
		TerraformOidc::new(Some(Arc::new(
			StaticTerraformVerifier::default().with_token("h.c.s", "alice"),
		)))
	}

	#[test]
	fn jwt_shape() {
		assert!(looks_like_jwt("a.b.c"));
		assert!(!looks_like_jwt("a.b"));
		assert!(!looks_like_jwt("a..c"));
		assert!(!looks_like_jwt("a.b.c.d"));
		assert!(!looks_like_jwt("opaque-token"));
	}

	#[tokio::test]
	async fn valid_token_grants_terraform_access() {
		let ctx = method()
			.authenticate(&request(&[("authorization", "Bearer h.c.s")]))
			.await
			.unwrap()
			.unwrap();

		assert_eq!(ctx.provider_type(), AuthMethodType::TerraformOidc);
		assert_eq!(ctx.username(), "alice");
		assert!(ctx.can_access_terraform_api());
		assert!(!ctx.can_access_read_api());
		assert!(!ctx.is_admin());
		assert_eq!(ctx.terraform_auth_token().unwrap().expose(), "h.c.s");
		assert_eq!(ctx.provider_data()["sub"], "sub-alice");
	}

	#[tokio::test]
	async fn empty_bearer_is_malformed() {
		let err = method()
			.authenticate(&request(&[("authorization", "Bearer ")]))
			.await
			.unwrap_err();
		assert_eq!(err.tag(), "malformed_credential");
		assert_eq!(err.method(), AuthMethodType::TerraformOidc);
	}

	#[tokio::test]
	async fn opaque_bearer_abstains() {
		let result = method()
			.authenticate(&request(&[("authorization", "Bearer INTERNAL")]))
			.await
			.unwrap();
		assert!(result.is_none());
	}

	#[tokio::test]
	async fn forged_jwt_rejects() {
		let err = method()
			.authenticate(&request(&[("authorization", "Bearer x.y.z")]))
			.await
			.unwrap_err();
		assert_eq!(err.tag(), "signature_invalid");
	}

	#[tokio::test]
	async fn disabled_without_verifier() {
		let method = TerraformOidc::new(None);
		assert!(!method.is_enabled());
		let result = method
			.authenticate(&request(&[("authorization", "Bearer ")]))
			.await
			.unwrap();
		assert!(result.is_none());
	}
}
