// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Embedded Terraform identity provider configuration.

use std::path::PathBuf;

use serde::Deserialize;
use terrareg_common_secret::SecretString;

const DEFAULT_CLIENT_ID: &str = "terraform-cli";
const DEFAULT_KEY_MAX_AGE_SECS: u64 = 7 * 24 * 3600;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 900;

fn default_redirect_uris() -> Vec<String> {
	vec![
		"http://localhost/login".to_string(),
		"http://127.0.0.1/login".to_string(),
	]
}

#[derive(Debug, Clone)]
pub struct TerraformOidcConfig {
	pub enabled: bool,
	/// Value of the `iss` claim; defaults to the HTTP base URL.
	pub issuer: String,
	/// PEM encoded RSA private key; a key is generated when unset.
	pub signing_key_path: Option<PathBuf>,
	pub client_id: String,
	/// Confidential client secret. Without it the client is public and must use PKCE.
	pub client_secret: Option<SecretString>,
	pub redirect_uris: Vec<String>,
	pub key_max_age_secs: u64,
	/// Periodic signing key rotation; disabled when unset.
	pub key_rotation_interval_secs: Option<u64>,
	pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TerraformOidcConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
	#[serde(default)]
	pub issuer: Option<String>,
	#[serde(default)]
	pub signing_key_path: Option<PathBuf>,
	#[serde(default)]
	pub client_id: Option<String>,
	#[serde(default)]
	pub client_secret: Option<SecretString>,
	#[serde(default)]
	pub redirect_uris: Option<Vec<String>>,
	#[serde(default)]
	pub key_max_age_secs: Option<u64>,
	#[serde(default)]
	pub key_rotation_interval_secs: Option<u64>,
	#[serde(default)]
	pub cleanup_interval_secs: Option<u64>,
}

impl TerraformOidcConfigLayer {
	pub fn merge(&mut self, other: TerraformOidcConfigLayer) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.issuer.is_some() {
			self.issuer = other.issuer;
		}
		if other.signing_key_path.is_some() {
			self.signing_key_path = other.signing_key_path;
		}
		if other.client_id.is_some() {
			self.client_id = other.client_id;
		}
		if other.client_secret.is_some() {
			self.client_secret = other.client_secret;
		}
		if other.redirect_uris.is_some() {
			self.redirect_uris = other.redirect_uris;
		}
		if other.key_max_age_secs.is_some() {
			self.key_max_age_secs = other.key_max_age_secs;
		}
		if other.key_rotation_interval_secs.is_some() {
			self.key_rotation_interval_secs = other.key_rotation_interval_secs;
		}
		if other.cleanup_interval_secs.is_some() {
			self.cleanup_interval_secs = other.cleanup_interval_secs;
		}
	}

	/// Resolve the section; `base_url` supplies the default issuer.
	pub fn finalize(self, base_url: &str) -> TerraformOidcConfig {
		TerraformOidcConfig {
			enabled: self.enabled.unwrap_or(false),
			issuer: self
				.issuer
				.filter(|s| !s.trim().is_empty())
				.map(|s| s.trim_end_matches('/').to_string())
				.unwrap_or_else(|| base_url.to_string()),
			signing_key_path: self.signing_key_path,
			client_id: self
				.client_id
				.unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
			client_secret: self.client_secret.filter(|s| !s.is_blank()),
			redirect_uris: self.redirect_uris.unwrap_or_else(default_redirect_uris),
			key_max_age_secs: self.key_max_age_secs.unwrap_or(DEFAULT_KEY_MAX_AGE_SECS),
			key_rotation_interval_secs: self.key_rotation_interval_secs.filter(|s| *s > 0),
			cleanup_interval_secs: self
				.cleanup_interval_secs
				.unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
		}
	}
}
