// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! API key and session configuration.

use serde::Deserialize;
use terrareg_common_secret::SecretString;

const DEFAULT_SESSION_COOKIE_NAME: &str = "session_id";
const DEFAULT_SESSION_EXPIRY_MINS: u64 = 60;
const DEFAULT_SESSION_CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Authentication configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct AuthConfig {
	/// Enables the admin API key method when set.
	pub admin_authentication_token: Option<SecretString>,
	pub upload_api_keys: Vec<SecretString>,
	pub publish_api_keys: Vec<SecretString>,
	/// Entries of the form `token[:environment]`.
	pub analytics_auth_keys: Vec<SecretString>,
	pub internal_extraction_analytics_token: Option<SecretString>,
	pub session_cookie_name: String,
	pub session_expiry_mins: u64,
	pub session_cleanup_interval_secs: u64,
}

impl Default for AuthConfig {
	fn default() -> Self {
		AuthConfigLayer::default().finalize()
	}
}

/// Authentication configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfigLayer {
	#[serde(default)]
	pub admin_authentication_token: Option<SecretString>,
	#[serde(default)]
	pub upload_api_keys: Option<Vec<SecretString>>,
	#[serde(default)]
	pub publish_api_keys: Option<Vec<SecretString>>,
	#[serde(default)]
	pub analytics_auth_keys: Option<Vec<SecretString>>,
	#[serde(default)]
	pub internal_extraction_analytics_token: Option<SecretString>,
	#[serde(default)]
	pub session_cookie_name: Option<String>,
	#[serde(default)]
	pub session_expiry_mins: Option<u64>,
	#[serde(default)]
	pub session_cleanup_interval_secs: Option<u64>,
}

impl AuthConfigLayer {
	pub fn merge(&mut self, other: AuthConfigLayer) {
		if other.admin_authentication_token.is_some() {
			self.admin_authentication_token = other.admin_authentication_token;
		}
		if other.upload_api_keys.is_some() {
			self.upload_api_keys = other.upload_api_keys;
		}
		if other.publish_api_keys.is_some() {
			self.publish_api_keys = other.publish_api_keys;
		}
		if other.analytics_auth_keys.is_some() {
			self.analytics_auth_keys = other.analytics_auth_keys;
		}
		if other.internal_extraction_analytics_token.is_some() {
			self.internal_extraction_analytics_token = other.internal_extraction_analytics_token;
		}
		if other.session_cookie_name.is_some() {
			self.session_cookie_name = other.session_cookie_name;
		}
		if other.session_expiry_mins.is_some() {
			self.session_expiry_mins = other.session_expiry_mins;
		}
		if other.session_cleanup_interval_secs.is_some() {
			self.session_cleanup_interval_secs = other.session_cleanup_interval_secs;
		}
	}

	pub fn finalize(self) -> AuthConfig {
		AuthConfig {
			admin_authentication_token: self
				.admin_authentication_token
				.filter(|t| !t.is_blank()),
			upload_api_keys: self.upload_api_keys.unwrap_or_default(),
			publish_api_keys: self.publish_api_keys.unwrap_or_default(),
			analytics_auth_keys: self.analytics_auth_keys.unwrap_or_default(),
			internal_extraction_analytics_token: self
				.internal_extraction_analytics_token
				.filter(|t| !t.is_blank()),
			session_cookie_name: self
				.session_cookie_name
				.unwrap_or_else(|| DEFAULT_SESSION_COOKIE_NAME.to_string()),
			session_expiry_mins: self
				.session_expiry_mins
				.unwrap_or(DEFAULT_SESSION_EXPIRY_MINS),
			session_cleanup_interval_secs: self
				.session_cleanup_interval_secs
				.unwrap_or(DEFAULT_SESSION_CLEANUP_INTERVAL_SECS),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use terrareg_common_secret::Secret;

	#[test]
	fn test_defaults() {
		let config = AuthConfigLayer::default().finalize();
		assert!(config.admin_authentication_token.is_none());
		assert!(config.upload_api_keys.is_empty());
		assert_eq!(config.session_cookie_name, "session_id");
		assert_eq!(config.session_expiry_mins, 60);
		assert_eq!(config.session_cleanup_interval_secs, 3600);
	}

	#[test]
	fn test_blank_admin_token_disables_method() {
		let layer = AuthConfigLayer {
			admin_authentication_token: Some(Secret::new("   ".to_string())),
			..Default::default()
		};
		assert!(layer.finalize().admin_authentication_token.is_none());
	}

	#[test]
	fn test_keys_survive_finalize() {
		let layer = AuthConfigLayer {
			publish_api_keys: Some(vec![Secret::new("PUB-1".to_string())]),
			..Default::default()
		};
		let config = layer.finalize();
		assert_eq!(config.publish_api_keys.len(), 1);
		assert!(config.publish_api_keys[0].matches("PUB-1"));
	}

	#[test]
	fn test_debug_redacts_tokens() {
		let layer = AuthConfigLayer {
			admin_authentication_token: Some(Secret::new("ADMIN-TOK".to_string())),
			..Default::default()
		};
		let debug = format!("{:?}", layer.finalize());
		assert!(!debug.contains("ADMIN-TOK"));
	}
}
