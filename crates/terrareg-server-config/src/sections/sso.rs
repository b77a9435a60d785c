// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single sign-on feature gates.

use serde::Deserialize;

/// SSO configuration (runtime, fully resolved).
#[derive(Debug, Clone, Default)]
pub struct SsoConfig {
	/// Enables OpenID Connect sessions; also the expected `aud` of ID tokens.
	pub openid_connect_client_id: Option<String>,
	/// Upstream issuer used to discover the JWKS for ID token validation.
	pub openid_connect_issuer: Option<String>,
	/// Enables SAML sessions.
	pub saml2_idp_metadata_url: Option<String>,
}

impl SsoConfig {
	pub fn openid_connect_enabled(&self) -> bool {
		self.openid_connect_client_id.is_some()
	}

	pub fn saml_enabled(&self) -> bool {
		self.saml2_idp_metadata_url.is_some()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SsoConfigLayer {
	#[serde(default)]
	pub openid_connect_client_id: Option<String>,
	#[serde(default)]
	pub openid_connect_issuer: Option<String>,
	#[serde(default)]
	pub saml2_idp_metadata_url: Option<String>,
}

impl SsoConfigLayer {
	pub fn merge(&mut self, other: SsoConfigLayer) {
		if other.openid_connect_client_id.is_some() {
			self.openid_connect_client_id = other.openid_connect_client_id;
		}
		if other.openid_connect_issuer.is_some() {
			self.openid_connect_issuer = other.openid_connect_issuer;
		}
		if other.saml2_idp_metadata_url.is_some() {
			self.saml2_idp_metadata_url = other.saml2_idp_metadata_url;
		}
	}

	pub fn finalize(self) -> SsoConfig {
		let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
		SsoConfig {
			openid_connect_client_id: non_empty(self.openid_connect_client_id),
			openid_connect_issuer: non_empty(self.openid_connect_issuer)
				.map(|s| s.trim_end_matches('/').to_string()),
			saml2_idp_metadata_url: non_empty(self.saml2_idp_metadata_url),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_disabled_by_default() {
		let config = SsoConfigLayer::default().finalize();
		assert!(!config.openid_connect_enabled());
		assert!(!config.saml_enabled());
	}

	#[test]
	fn test_blank_values_disable() {
		let layer = SsoConfigLayer {
			openid_connect_client_id: Some(" ".to_string()),
			..Default::default()
		};
		assert!(!layer.finalize().openid_connect_enabled());
	}

	#[test]
	fn test_issuer_trailing_slash_trimmed() {
		let layer = SsoConfigLayer {
			openid_connect_client_id: Some("terrareg".to_string()),
			openid_connect_issuer: Some("https://sso.example.com/".to_string()),
			..Default::default()
		};
		let config = layer.finalize();
		assert!(config.openid_connect_enabled());
		assert_eq!(
			config.openid_connect_issuer.as_deref(),
			Some("https://sso.example.com")
		);
	}
}
