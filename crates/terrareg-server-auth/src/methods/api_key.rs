// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Static API keys presented in `X-Terrareg-ApiKey`.
//!
//! Missing, empty and unknown keys all abstain so that later methods can
//! still identify the request.

use async_trait::async_trait;
use terrareg_common_secret::SecretString;
use tracing::debug;

use super::AuthMethod;
use crate::context::AuthContext;
use crate::error::AuthError;
use crate::request::{AuthRequest, API_KEY_HEADER};
use crate::types::AuthMethodType;

pub const ADMIN_USERNAME: &str = "Admin";
pub const PUBLISH_USERNAME: &str = "Publish API Key";
pub const UPLOAD_USERNAME: &str = "Upload API Key";

/// Constant-time membership test. Every key is compared, no early exit.
pub(crate) fn matches_any(keys: &[SecretString], candidate: &str) -> bool {
	keys.iter()
		.fold(false, |found, key| key.matches(candidate) | found)
}

pub struct AdminApiKey {
	token: Option<SecretString>,
}

impl AdminApiKey {
	pub fn new(token: Option<SecretString>) -> Self {
		Self {
			token: token.filter(|t| !t.is_blank()),
		}
	}
}

#[async_trait]
impl AuthMethod for AdminApiKey {
	fn method_type(&self) -> AuthMethodType {
		AuthMethodType::AdminApiKey
	}

	fn is_enabled(&self) -> bool {
		self.token.is_some()
	}

	async fn authenticate(&self, request: &AuthRequest) -> Result<Option<AuthContext>, AuthError> {
		let (Some(token), Some(presented)) = (&self.token, request.header(API_KEY_HEADER)) else {
			return Ok(None);
		};

		if !token.matches(presented) {
			debug!("admin API key did not match");
			return Ok(None);
		}

		Ok(Some(
			AuthContext::builder(AuthMethodType::AdminApiKey, ADMIN_USERNAME)
				.builtin_admin()
				.publish_any_namespace()
				.upload_any_namespace()
				.terraform_api(true)
				.build(),
		))
	}
}

pub struct PublishApiKey {
	keys: Vec<SecretString>,
}

impl PublishApiKey {
	pub fn new(keys: Vec<SecretString>) -> Self {
		Self {
			keys: keys.into_iter().filter(|k| !k.is_blank()).collect(),
		}
	}
}

#[async_trait]
impl AuthMethod for PublishApiKey {
	fn method_type(&self) -> AuthMethodType {
		AuthMethodType::PublishApiKey
	}

	fn is_enabled(&self) -> bool {
		!self.keys.is_empty()
	}

	async fn authenticate(&self, request: &AuthRequest) -> Result<Option<AuthContext>, AuthError> {
		let Some(presented) = request.header(API_KEY_HEADER) else {
			return Ok(None);
		};

		if !matches_any(&self.keys, presented) {
			return Ok(None);
		}

		Ok(Some(
			AuthContext::builder(AuthMethodType::PublishApiKey, PUBLISH_USERNAME)
				.publish_any_namespace()
				.terraform_api(true)
				.build(),
		))
	}
}

pub struct UploadApiKey {
	keys: Vec<SecretString>,
}

impl UploadApiKey {
	pub fn new(keys: Vec<SecretString>) -> Self {
		Self {
			keys: keys.into_iter().filter(|k| !k.is_blank()).collect(),
		}
	}
}

#[async_trait]
impl AuthMethod for UploadApiKey {
	fn method_type(&self) -> AuthMethodType {
		AuthMethodType::UploadApiKey
	}

	fn is_enabled(&self) -> bool {
		!self.keys.is_empty()
	}

	async fn authenticate(&self, request: &AuthRequest) -> Result<Option<AuthContext>, AuthError> {
		let Some(presented) = request.header(API_KEY_HEADER) else {
			return Ok(None);
		};

		if !matches_any(&self.keys, presented) {
			return Ok(None);
		}

		Ok(Some(
			AuthContext::builder(AuthMethodType::UploadApiKey, UPLOAD_USERNAME)
				.upload_any_namespace()
				.terraform_api(true)
				.build(),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::request;
	use crate::types::PermissionType;
	use terrareg_common_secret::Secret;

	fn secret(value: &str) -> SecretString {
		Secret::new(value.to_string())
	}

	mod admin {
		use super::*;

		#[tokio::test]
		async fn matching_token_is_builtin_admin() {
			let method = AdminApiKey::new(Some(secret("ADMIN-TOK")));
			let ctx = method
				.authenticate(&request(&[(API_KEY_HEADER, "ADMIN-TOK")]))
				.await
				.unwrap()
				.unwrap();

			assert_eq!(ctx.provider_type(), AuthMethodType::AdminApiKey);
			assert!(ctx.is_authenticated());
			assert!(ctx.is_admin());
			assert!(ctx.is_builtin_admin());
			assert_eq!(ctx.username(), "Admin");
			assert!(!ctx.requires_csrf());
			assert!(ctx.can_access_terraform_api());
			assert!(!ctx.can_access_read_api());
			assert!(ctx.can_publish_module_version("anything"));
			assert!(ctx.check_namespace_access(PermissionType::Full, "anything"));
		}

		#[tokio::test]
		async fn empty_header_abstains() {
			let method = AdminApiKey::new(Some(secret("ADMIN-TOK")));
			let result = method
				.authenticate(&request(&[(API_KEY_HEADER, "")]))
				.await
				.unwrap();
			assert!(result.is_none());
		}

		#[tokio::test]
		async fn wrong_token_abstains() {
			let method = AdminApiKey::new(Some(secret("ADMIN-TOK")));
			let result = method
				.authenticate(&request(&[(API_KEY_HEADER, "ADMIN-TOX")]))
				.await
				.unwrap();
			assert!(result.is_none());
		}

		#[tokio::test]
		async fn bearer_is_not_an_api_key() {
			let method = AdminApiKey::new(Some(secret("ADMIN-TOK")));
			let result = method
				.authenticate(&request(&[("authorization", "Bearer ADMIN-TOK")]))
				.await
				.unwrap();
			assert!(result.is_none());
		}

		#[test]
		fn blank_token_disables() {
			assert!(!AdminApiKey::new(Some(secret(""))).is_enabled());
			assert!(!AdminApiKey::new(None).is_enabled());
		}
	}

	mod publish_and_upload {
		use super::*;

		#[tokio::test]
		async fn upload_key_grants_upload_only() {
			let method = UploadApiKey::new(vec![secret("UPLOAD-1")]);
			let ctx = method
				.authenticate(&request(&[(API_KEY_HEADER, "UPLOAD-1")]))
				.await
				.unwrap()
				.unwrap();

			assert_eq!(ctx.provider_type(), AuthMethodType::UploadApiKey);
			assert!(!ctx.is_admin());
			assert_eq!(ctx.username(), "Upload API Key");
			assert!(ctx.can_upload_module_version("ns"));
			assert!(!ctx.can_publish_module_version("ns"));
			assert!(ctx.can_access_terraform_api());
			assert!(!ctx.can_access_read_api());
		}

		#[tokio::test]
		async fn publish_key_grants_publish_only() {
			let method = PublishApiKey::new(vec![secret("PUB-1"), secret("PUB-2")]);
			let ctx = method
				.authenticate(&request(&[(API_KEY_HEADER, "PUB-2")]))
				.await
				.unwrap()
				.unwrap();

			assert_eq!(ctx.username(), "Publish API Key");
			assert!(ctx.can_publish_module_version("ns"));
			assert!(!ctx.can_upload_module_version("ns"));
		}

		#[tokio::test]
		async fn other_list_key_abstains() {
			let method = PublishApiKey::new(vec![secret("PUB-1")]);
			let result = method
				.authenticate(&request(&[(API_KEY_HEADER, "UPLOAD-1")]))
				.await
				.unwrap();
			assert!(result.is_none());
		}

		#[test]
		fn empty_list_disables() {
			assert!(!UploadApiKey::new(vec![]).is_enabled());
			assert!(!UploadApiKey::new(vec![secret(" ")]).is_enabled());
		}

		#[test]
		fn matches_any_checks_every_key() {
			let keys = vec![secret("a"), secret("b"), secret("c")];
			assert!(matches_any(&keys, "c"));
			assert!(!matches_any(&keys, "d"));
			assert!(!matches_any(&[], "a"));
		}
	}
}
