// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Terraform analytics keys, configured as `token[:environment]`.

use async_trait::async_trait;
use terrareg_common_secret::{Secret, SecretString};

use super::AuthMethod;
use crate::context::AuthContext;
use crate::error::AuthError;
use crate::request::{AuthRequest, ANALYTICS_KEY_HEADER};
use crate::types::AuthMethodType;

pub const ANALYTICS_USERNAME: &str = "Terraform Analytics";

/// A configured analytics key split into its token and environment tag.
#[derive(Debug, Clone)]
pub struct AnalyticsKey {
	token: SecretString,
	environment: Option<String>,
}

impl AnalyticsKey {
	pub fn parse(entry: &SecretString) -> Self {
		let (token, environment) = match entry.expose().split_once(':') {
			Some((token, environment)) => (token, Some(environment.to_string())),
			None => (entry.expose().as_str(), None),
		};
		Self {
			token: Secret::new(token.trim().to_string()),
			environment: environment.filter(|e| !e.is_empty()),
		}
	}

	pub fn environment(&self) -> Option<&str> {
		self.environment.as_deref()
	}
}

pub struct TerraformAnalyticsAuthKey {
	keys: Vec<AnalyticsKey>,
}

impl TerraformAnalyticsAuthKey {
	pub fn new(entries: Vec<SecretString>) -> Self {
		Self {
			keys: entries
				.iter()
				.map(AnalyticsKey::parse)
				.filter(|k| !k.token.is_blank())
				.collect(),
		}
	}

	fn find(&self, token: &str) -> Option<&AnalyticsKey> {
		let mut found = None;
		for key in &self.keys {
			if key.token.matches(token) && found.is_none() {
				found = Some(key);
			}
		}
		found
	}
}

#[async_trait]
impl AuthMethod for TerraformAnalyticsAuthKey {
	fn method_type(&self) -> AuthMethodType {
		AuthMethodType::TerraformAnalyticsAuthKey
	}

	fn is_enabled(&self) -> bool {
		!self.keys.is_empty()
	}

	async fn authenticate(&self, request: &AuthRequest) -> Result<Option<AuthContext>, AuthError> {
		let Some(presented) = request
			.header(ANALYTICS_KEY_HEADER)
			.or_else(|| request.bearer_token())
		else {
			return Ok(None);
		};

		// Only the part before the first ':' identifies the key.
		let token = presented.split(':').next().unwrap_or_default().trim();
		if token.is_empty() {
			return Ok(None);
		}

		let Some(key) = self.find(token) else {
			return Ok(None);
		};

		let mut builder =
			AuthContext::builder(AuthMethodType::TerraformAnalyticsAuthKey, ANALYTICS_USERNAME)
				.terraform_api(true)
				.provider_data("scope", "analytics");
		if let Some(environment) = key.environment() {
			builder = builder.provider_data("environment", environment);
		}

		Ok(Some(builder.build()))
	}
}
