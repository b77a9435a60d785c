// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use terrareg_common_secret::{load_secret_env, load_secret_list_env};
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuthConfigLayer, DatabaseConfigLayer, HttpConfigLayer, LogFormat, LoggingConfigLayer,
	SsoConfigLayer, TerraformOidcConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/terrareg/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: TERRAREG_<FIELD>. Secrets also accept TERRAREG_<FIELD>_FILE.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			database: Some(load_database_from_env()?),
			logging: Some(load_logging_from_env()?),
			auth: Some(load_auth_from_env()?),
			sso: Some(load_sso_from_env()?),
			terraform_oidc: Some(load_terraform_oidc_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u16 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|v| {
		v.split(',')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(String::from)
			.collect()
	})
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("TERRAREG_HOST"),
		port: env_u16("TERRAREG_PORT")?,
		base_url: env_var("TERRAREG_BASE_URL"),
	})
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("TERRAREG_DATABASE_URL"),
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("TERRAREG_LOG_FORMAT") {
		Some(v) => Some(v.parse::<LogFormat>().map_err(|message| {
			ConfigError::InvalidValue {
				key: "TERRAREG_LOG_FORMAT".to_string(),
				message,
			}
		})?),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("TERRAREG_LOG_LEVEL"),
		format,
	})
}

fn load_auth_from_env() -> Result<AuthConfigLayer, ConfigError> {
	Ok(AuthConfigLayer {
		admin_authentication_token: load_secret_env("TERRAREG_ADMIN_AUTHENTICATION_TOKEN")?,
		upload_api_keys: load_secret_list_env("TERRAREG_UPLOAD_API_KEYS")?,
		publish_api_keys: load_secret_list_env("TERRAREG_PUBLISH_API_KEYS")?,
		analytics_auth_keys: load_secret_list_env("TERRAREG_ANALYTICS_AUTH_KEYS")?,
		internal_extraction_analytics_token: load_secret_env(
			"TERRAREG_INTERNAL_EXTRACTION_ANALYTICS_TOKEN",
		)?,
		session_cookie_name: env_var("TERRAREG_SESSION_COOKIE_NAME"),
		session_expiry_mins: env_u64("TERRAREG_SESSION_EXPIRY_MINS")?,
		session_cleanup_interval_secs: env_u64("TERRAREG_SESSION_CLEANUP_INTERVAL_SECS")?,
	})
}

fn load_sso_from_env() -> Result<SsoConfigLayer, ConfigError> {
	Ok(SsoConfigLayer {
		openid_connect_client_id: env_var("TERRAREG_OPENID_CONNECT_CLIENT_ID"),
		openid_connect_issuer: env_var("TERRAREG_OPENID_CONNECT_ISSUER"),
		saml2_idp_metadata_url: env_var("TERRAREG_SAML2_IDP_METADATA_URL"),
	})
}

fn load_terraform_oidc_from_env() -> Result<TerraformOidcConfigLayer, ConfigError> {
	Ok(TerraformOidcConfigLayer {
		enabled: env_bool("TERRAREG_TERRAFORM_OIDC_ENABLED"),
		issuer: env_var("TERRAREG_TERRAFORM_OIDC_ISSUER"),
		signing_key_path: env_var("TERRAREG_TERRAFORM_OIDC_SIGNING_KEY_PATH").map(PathBuf::from),
		client_id: env_var("TERRAREG_TERRAFORM_OIDC_CLIENT_ID"),
		client_secret: load_secret_env("TERRAREG_TERRAFORM_OIDC_CLIENT_SECRET")?,
		redirect_uris: env_list("TERRAREG_TERRAFORM_OIDC_REDIRECT_URIS"),
		key_max_age_secs: env_u64("TERRAREG_TERRAFORM_OIDC_KEY_MAX_AGE_SECS")?,
		key_rotation_interval_secs: env_u64("TERRAREG_TERRAFORM_OIDC_KEY_ROTATION_INTERVAL_SECS")?,
		cleanup_interval_secs: env_u64("TERRAREG_TERRAFORM_OIDC_CLEANUP_INTERVAL_SECS")?,
	})
}
