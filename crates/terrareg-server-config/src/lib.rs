// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Terrareg registry server.
//!
//! Sources are layered (defaults, `/etc/terrareg/server.toml`, then
//! `TERRAREG_*` environment variables) and resolved into a [`ServerConfig`].
//!
//! ```ignore
//! use terrareg_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub auth: AuthConfig,
	pub sso: SsoConfig,
	pub terraform_oidc: TerraformOidcConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

impl Default for ServerConfig {
	fn default() -> Self {
		// Defaults always validate.
		finalize_unchecked(ServerConfigLayer::default())
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`TERRAREG_*`)
/// 2. Config file (`/etc/terrareg/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let config = finalize_unchecked(layer);

	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		admin_api_key = config.auth.admin_authentication_token.is_some(),
		upload_api_keys = config.auth.upload_api_keys.len(),
		publish_api_keys = config.auth.publish_api_keys.len(),
		analytics_auth_keys = config.auth.analytics_auth_keys.len(),
		internal_extraction = config.auth.internal_extraction_analytics_token.is_some(),
		openid_connect = config.sso.openid_connect_enabled(),
		saml = config.sso.saml_enabled(),
		terraform_oidc = config.terraform_oidc.enabled,
		"Server configuration loaded"
	);

	Ok(config)
}

fn finalize_unchecked(layer: ServerConfigLayer) -> ServerConfig {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let auth = layer.auth.unwrap_or_default().finalize();
	let sso = layer.sso.unwrap_or_default().finalize();
	let terraform_oidc = layer
		.terraform_oidc
		.unwrap_or_default()
		.finalize(&http.base_url);

	ServerConfig {
		http,
		database,
		logging,
		auth,
		sso,
		terraform_oidc,
	}
}

/// Validate cross-field configuration rules.
fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	let auth = &config.auth;
	let lists = [
		("upload_api_keys", &auth.upload_api_keys),
		("publish_api_keys", &auth.publish_api_keys),
		("analytics_auth_keys", &auth.analytics_auth_keys),
	];
	for (name, keys) in lists {
		if keys.iter().any(|k| k.is_blank()) {
			return Err(ConfigError::Validation(format!(
				"{name} contains an empty key"
			)));
		}
	}

	if auth.session_expiry_mins == 0 {
		return Err(ConfigError::Validation(
			"session_expiry_mins must be greater than zero".to_string(),
		));
	}

	if config.sso.openid_connect_enabled() {
		if let Some(issuer) = &config.sso.openid_connect_issuer {
			require_absolute_url("sso.openid_connect_issuer", issuer)?;
		}
	}

	let oidc = &config.terraform_oidc;
	if oidc.enabled {
		require_absolute_url("terraform_oidc.issuer", &oidc.issuer)?;
		if oidc.redirect_uris.is_empty() {
			return Err(ConfigError::Validation(
				"terraform_oidc.redirect_uris must list at least one URI".to_string(),
			));
		}
		for uri in &oidc.redirect_uris {
			require_absolute_url("terraform_oidc.redirect_uris", uri)?;
		}
		if oidc.key_max_age_secs == 0 {
			return Err(ConfigError::Validation(
				"terraform_oidc.key_max_age_secs must be greater than zero".to_string(),
			));
		}
		if let Some(interval) = oidc.key_rotation_interval_secs {
			if interval > oidc.key_max_age_secs {
				return Err(ConfigError::Validation(format!(
					"terraform_oidc.key_rotation_interval_secs ({interval}) exceeds key_max_age_secs ({})",
					oidc.key_max_age_secs
				)));
			}
		}
	}

	Ok(())
}

fn require_absolute_url(key: &str, value: &str) -> Result<(), ConfigError> {
	match url::Url::parse(value) {
		Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(()),
		_ => Err(ConfigError::InvalidValue {
			key: key.to_string(),
			message: format!("'{value}' is not an absolute http(s) URL"),
		}),
	}
}
