// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bearer token used by the module extraction and scanning pipeline.

use async_trait::async_trait;
use terrareg_common_secret::SecretString;

use super::AuthMethod;
use crate::context::AuthContext;
use crate::error::AuthError;
use crate::request::AuthRequest;
use crate::types::AuthMethodType;

pub const INTERNAL_EXTRACTION_USERNAME: &str = "Terraform Internal Extraction";

pub struct TerraformInternalExtraction {
	token: Option<SecretString>,
}

impl TerraformInternalExtraction {
	pub fn new(token: Option<SecretString>) -> Self {
		Self {
			token: token.filter(|t| !t.is_blank()),
		}
	}
}

#[async_trait]
impl AuthMethod for TerraformInternalExtraction {
	fn method_type(&self) -> AuthMethodType {
		AuthMethodType::TerraformInternalExtraction
	}

	fn is_enabled(&self) -> bool {
		self.token.is_some()
	}

	async fn authenticate(&self, request: &AuthRequest) -> Result<Option<AuthContext>, AuthError> {
		let (Some(token), Some(presented)) = (&self.token, request.bearer_token()) else {
			return Ok(None);
		};

		if !token.matches(presented) {
			return Ok(None);
		}

		Ok(Some(
			AuthContext::builder(
				AuthMethodType::TerraformInternalExtraction,
				INTERNAL_EXTRACTION_USERNAME,
			)
			.admin(true)
			.publish_any_namespace()
			.upload_any_namespace()
			.terraform_api(true)
			.build(),
		))
	}
}
