// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Registered OAuth clients of the Terraform identity provider.

use std::collections::HashMap;

use terrareg_common_secret::SecretString;
use terrareg_server_config::TerraformOidcConfig;
use url::{Host, Url};

use crate::error::{IdpError, IdpResult};

#[derive(Debug, Clone)]
pub struct IdpClient {
	pub client_id: String,
	/// Public clients have no secret and must use PKCE.
	pub client_secret: Option<SecretString>,
	pub redirect_uris: Vec<Url>,
}

impl IdpClient {
	pub fn is_public(&self) -> bool {
		self.client_secret.is_none()
	}

	/// Exact match, or loopback on any port with the same scheme and path.
	pub fn redirect_uri_allowed(&self, candidate: &Url) -> bool {
		self.redirect_uris.iter().any(|registered| {
			registered == candidate
				|| (is_loopback(registered)
					&& is_loopback(candidate)
					&& registered.scheme() == candidate.scheme()
					&& registered.path() == candidate.path())
		})
	}

	fn authenticate(&self, presented: Option<&str>) -> IdpResult<()> {
		match (&self.client_secret, presented) {
			(None, _) => Ok(()),
			(Some(secret), Some(presented)) if secret.matches(presented) => Ok(()),
			(Some(_), _) => Err(IdpError::InvalidClient),
		}
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

#[derive(Debug, Default)]
pub struct ClientRegistry {
	clients: HashMap<String, IdpClient>,
}

impl ClientRegistry {
	pub fn from_config(config: &TerraformOidcConfig) -> IdpResult<Self> {
		let redirect_uris = config
			.redirect_uris
			.iter()
			.map(|uri| {
				Url::parse(uri)
					.map_err(|e| IdpError::InvalidRequest(format!("invalid redirect URI {uri}: {e}")))
			})
			.collect::<IdpResult<Vec<_>>>()?;

		let mut registry = Self::default();
		registry.register(IdpClient {
			client_id: config.client_id.clone(),
			client_secret: config.client_secret.clone(),
			redirect_uris,
		});
		Ok(registry)
	}

	pub fn register(&mut self, client: IdpClient) {
		self.clients.insert(client.client_id.clone(), client);
	}

	pub fn get(&self, client_id: &str) -> IdpResult<&IdpClient> {
		self.clients
			.get(client_id)
			.ok_or_else(|| IdpError::ClientNotFound(client_id.to_string()))
	}

	/// Unknown client: [`IdpError::ClientNotFound`]. Wrong or missing secret
	/// for a confidential client: [`IdpError::InvalidClient`].
	pub fn authenticate(&self, client_id: &str, secret: Option<&str>) -> IdpResult<&IdpClient> {
		let client = self.get(client_id)?;
		client.authenticate(secret)?;
		Ok(client)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use terrareg_common_secret::Secret;

	fn client(secret: Option<&str>) -> IdpClient {
		IdpClient {
			client_id: "terraform-cli".to_string(),
			client_secret: secret.map(|s| Secret::new(s.to_string())),
			redirect_uris: vec![
				Url::parse("http://localhost/login").unwrap(),
				Url::parse("https://ci.example.com/callback").unwrap(),
			],
		}
	}

	fn url(s: &str) -> Url {
		Url::parse(s).unwrap()
	}

	mod redirects {
		use super::*;

		#[test]
		fn loopback_any_port() {
			let c = client(None);
			assert!(c.redirect_uri_allowed(&url("http://localhost:10003/login")));
			assert!(c.redirect_uri_allowed(&url("http://127.0.0.1:10000/login")));
			assert!(c.redirect_uri_allowed(&url("http://[::1]:10010/login")));
		}

		#[test]
		fn loopback_path_and_scheme_must_match() {
			let c = client(None);
			assert!(!c.redirect_uri_allowed(&url("http://localhost:10003/other")));
			assert!(!c.redirect_uri_allowed(&url("https://localhost:10003/login")));
		}

		#[test]
		fn non_loopback_must_be_exact() {
			let c = client(None);
			assert!(c.redirect_uri_allowed(&url("https://ci.example.com/callback")));
			assert!(!c.redirect_uri_allowed(&url("https://ci.example.com:8443/callback")));
			assert!(!c.redirect_uri_allowed(&url("https://evil.example.com/callback")));
		}
	}

	mod authentication {
		use super::*;

		fn registry(secret: Option<&str>) -> ClientRegistry {
			let mut registry = ClientRegistry::default();
			registry.register(client(secret));
			registry
		}

		#[test]
		fn unknown_client() {
			let err = registry(None).authenticate("nope", None).unwrap_err();
			assert!(matches!(err, IdpError::ClientNotFound(_)));
		}

		#[test]
		fn confidential_client_secret() {
			let registry = registry(Some("S"));
			assert!(registry.authenticate("terraform-cli", Some("S")).is_ok());
			assert!(matches!(
				registry.authenticate("terraform-cli", Some("wrong")).unwrap_err(),
				IdpError::InvalidClient
			));
			assert!(matches!(
				registry.authenticate("terraform-cli", None).unwrap_err(),
				IdpError::InvalidClient
			));
		}

		#[test]
		fn public_client() {
			let registry = registry(None);
			let client = registry.authenticate("terraform-cli", None).unwrap();
			assert!(client.is_public());
		}
	}
}
