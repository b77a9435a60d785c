// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization code flow of the Terraform identity provider.
//!
//! ```text
//! GET  /authorize  admin session  -> 302 redirect_uri?code=..&state=..
//! POST /token      code (+secret/PKCE) -> access_token + id_token
//! GET  /userinfo   Bearer access_token -> {sub, name, email}
//! POST /revoke     client + token -> token deleted
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use terrareg_server_auth::{
	generate_session_token, AuthContext, AuthError, AuthMethodType, TerraformIdentity,
	TerraformTokenVerifier,
};
use terrareg_server_config::TerraformOidcConfig;
use tracing::{info, instrument, warn};
use url::Url;

use crate::client::ClientRegistry;
use crate::error::{IdpError, IdpResult};
use crate::jwt::{self, AccessTokenClaims, IdTokenClaims};
use crate::keys::{JsonWebKeySet, KeyManager};
use crate::pkce::{verify_code_verifier, CodeChallengeMethod};
use crate::store::{
	hash_code, AccessTokenRecord, AuthorizationCodeRecord, CleanupStats, IdpStore,
};

pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
pub const AUTHORIZATION_PATH: &str = "/terraform/oidc/authorize";
pub const TOKEN_PATH: &str = "/terraform/oidc/token";
pub const USERINFO_PATH: &str = "/terraform/oidc/userinfo";
pub const JWKS_PATH: &str = "/terraform/oidc/jwks";
pub const REVOCATION_PATH: &str = "/terraform/oidc/revoke";

pub const AUTHORIZATION_CODE_TTL_SECS: i64 = 10 * 60;
pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;
pub const SUBJECT_TTL_SECS: i64 = 365 * 24 * 3600;

pub const SUPPORTED_SCOPES: [&str; 3] = ["openid", "profile", "email"];
const DEFAULT_SCOPE: &str = "openid";

const METHOD: AuthMethodType = AuthMethodType::TerraformOidc;

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryDocument {
	pub issuer: String,
	pub authorization_endpoint: String,
	pub token_endpoint: String,
	pub userinfo_endpoint: String,
	pub jwks_uri: String,
	pub revocation_endpoint: String,
	pub response_types_supported: Vec<&'static str>,
	pub grant_types_supported: Vec<&'static str>,
	pub subject_types_supported: Vec<&'static str>,
	pub id_token_signing_alg_values_supported: Vec<&'static str>,
	pub scopes_supported: Vec<&'static str>,
	pub token_endpoint_auth_methods_supported: Vec<&'static str>,
	pub code_challenge_methods_supported: Vec<&'static str>,
	pub claims_supported: Vec<&'static str>,
}

/// Query string of the authorization endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationRequest {
	pub response_type: String,
	pub client_id: String,
	pub redirect_uri: String,
	#[serde(default)]
	pub state: Option<String>,
	#[serde(default)]
	pub scope: Option<String>,
	#[serde(default)]
	pub nonce: Option<String>,
	#[serde(default)]
	pub code_challenge: Option<String>,
	#[serde(default)]
	pub code_challenge_method: Option<String>,
}

/// Form body of the token endpoint.
#[derive(Clone, Deserialize)]
pub struct TokenRequest {
	pub grant_type: String,
	#[serde(default)]
	pub code: Option<String>,
	#[serde(default)]
	pub redirect_uri: Option<String>,
	#[serde(default)]
	pub client_id: Option<String>,
	#[serde(default)]
	pub client_secret: Option<String>,
	#[serde(default)]
	pub code_verifier: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
	pub access_token: String,
	pub token_type: String,
	pub expires_in: i64,
	pub id_token: String,
	pub scope: String,
}

/// Form body of the revocation endpoint.
#[derive(Clone, Deserialize)]
pub struct RevocationRequest {
	pub token: String,
	pub client_id: String,
	#[serde(default)]
	pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	pub sub: String,
	pub name: String,
	pub preferred_username: String,
	pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
	pub storage: CleanupStats,
	pub evicted_keys: usize,
}

// =============================================================================
// Provider
// =============================================================================

pub struct TerraformIdp {
	issuer: String,
	keys: Arc<KeyManager>,
	clients: ClientRegistry,
	store: Arc<dyn IdpStore>,
	key_max_age: Duration,
}

impl TerraformIdp {
	pub fn new(
		config: &TerraformOidcConfig,
		keys: Arc<KeyManager>,
		store: Arc<dyn IdpStore>,
	) -> IdpResult<Self> {
		Ok(Self {
			issuer: config.issuer.trim_end_matches('/').to_string(),
			keys,
			clients: ClientRegistry::from_config(config)?,
			store,
			key_max_age: Duration::seconds(i64::try_from(config.key_max_age_secs).unwrap_or(i64::MAX)),
		})
	}

	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	pub fn endpoint(&self, path: &str) -> String {
		format!("{}{path}", self.issuer)
	}

	pub fn keys(&self) -> &Arc<KeyManager> {
		&self.keys
	}

	pub fn discovery_document(&self) -> DiscoveryDocument {
		DiscoveryDocument {
			issuer: self.issuer.clone(),
			authorization_endpoint: self.endpoint(AUTHORIZATION_PATH),
			token_endpoint: self.endpoint(TOKEN_PATH),
			userinfo_endpoint: self.endpoint(USERINFO_PATH),
			jwks_uri: self.endpoint(JWKS_PATH),
			revocation_endpoint: self.endpoint(REVOCATION_PATH),
			response_types_supported: vec!["code"],
			grant_types_supported: vec!["authorization_code"],
			subject_types_supported: vec!["pairwise"],
			id_token_signing_alg_values_supported: vec!["RS256"],
			scopes_supported: SUPPORTED_SCOPES.to_vec(),
			token_endpoint_auth_methods_supported: vec!["client_secret_post", "none"],
			code_challenge_methods_supported: vec!["S256", "plain"],
			claims_supported: vec!["iss", "sub", "aud", "exp", "iat", "nonce", "name", "email"],
		}
	}

	pub fn jwks(&self) -> Arc<JsonWebKeySet> {
		self.keys.jwks()
	}

	/// Mint an authorization code for an admin session and build the
	/// redirect back to the client.
	///
	/// Client and redirect URI are validated before the caller's identity so
	/// that an unregistered redirect never receives an error redirect.
	#[instrument(skip_all, fields(client_id = %request.client_id))]
	pub async fn authorize(
		&self,
		context: &AuthContext,
		request: AuthorizationRequest,
	) -> IdpResult<Url> {
		let client = self.clients.get(&request.client_id)?;
		let mut redirect =
			Url::parse(&request.redirect_uri).map_err(|_| IdpError::InvalidRedirectUri)?;
		if !client.redirect_uri_allowed(&redirect) {
			warn!(redirect_uri = %request.redirect_uri, "redirect URI not registered");
			return Err(IdpError::InvalidRedirectUri);
		}
		if request.response_type != "code" {
			return Err(IdpError::UnsupportedResponseType(request.response_type));
		}
		let scope = normalize_scope(request.scope.as_deref())?;

		let code_challenge_method = match (&request.code_challenge, &request.code_challenge_method) {
			(Some(_), Some(method)) => Some(
				method
					.parse::<CodeChallengeMethod>()
					.map_err(IdpError::InvalidRequest)?,
			),
			(Some(_), None) => Some(CodeChallengeMethod::default()),
			(None, Some(_)) => {
				return Err(IdpError::InvalidRequest(
					"code_challenge_method without code_challenge".to_string(),
				))
			}
			(None, None) => None,
		};
		if client.is_public() && request.code_challenge.is_none() {
			return Err(IdpError::InvalidRequest(
				"PKCE is required for public clients".to_string(),
			));
		}

		if !context.is_authenticated() {
			return Err(IdpError::Unauthorized(AuthError::MissingCredential {
				method: METHOD,
			}));
		}
		if !context.provider_type().is_session() || !context.is_admin() {
			warn!(
				auth_method = %context.provider_type(),
				username = %context.username(),
				"authorization refused"
			);
			return Err(IdpError::AccessDenied(
				"an authenticated admin session is required".to_string(),
			));
		}

		let code = generate_session_token();
		let record = AuthorizationCodeRecord {
			client_id: client.client_id.clone(),
			redirect_uri: request.redirect_uri.clone(),
			scope,
			username: context.username().to_string(),
			email: context
				.provider_data()
				.get("email")
				.and_then(|v| v.as_str())
				.map(str::to_string),
			nonce: request.nonce,
			code_challenge: request.code_challenge,
			code_challenge_method,
		};
		let expiry = Utc::now() + Duration::seconds(AUTHORIZATION_CODE_TTL_SECS);
		self.store
			.store_authorization_code(&hash_code(&code), &record, expiry)
			.await?;

		{
			let mut query = redirect.query_pairs_mut();
			query.append_pair("code", &code);
			if let Some(state) = &request.state {
				query.append_pair("state", state);
			}
		}

		info!(username = %record.username, "issued authorization code");
		Ok(redirect)
	}

	/// Exchange an authorization code for an access token and ID token.
	/// The code is consumed before any other check, so a failed exchange
	/// still burns it.
	#[instrument(skip_all, fields(client_id = ?request.client_id, grant_type = %request.grant_type))]
	pub async fn exchange_code(&self, request: TokenRequest) -> IdpResult<TokenResponse> {
		if request.grant_type != "authorization_code" {
			return Err(IdpError::UnsupportedGrantType(request.grant_type));
		}
		let client_id = request
			.client_id
			.as_deref()
			.ok_or_else(|| IdpError::InvalidRequest("client_id is required".to_string()))?;
		let client = self
			.clients
			.authenticate(client_id, request.client_secret.as_deref())?;
		let code = request
			.code
			.as_deref()
			.filter(|c| !c.is_empty())
			.ok_or_else(|| IdpError::InvalidRequest("code is required".to_string()))?;

		let now = Utc::now();
		let record = self
			.store
			.consume_authorization_code(&hash_code(code), now)
			.await?
			.ok_or_else(|| {
				warn!("authorization code unknown, expired or already used");
				IdpError::InvalidCredential("authorization code is invalid".to_string())
			})?;

		if record.client_id != client.client_id {
			return Err(IdpError::InvalidCredential(
				"authorization code was issued to another client".to_string(),
			));
		}
		if let Some(redirect_uri) = &request.redirect_uri {
			if *redirect_uri != record.redirect_uri {
				return Err(IdpError::InvalidCredential(
					"redirect_uri does not match".to_string(),
				));
			}
		}
		if let Some(challenge) = &record.code_challenge {
			let method = record.code_challenge_method.unwrap_or_default();
			let verifier = request.code_verifier.as_deref().ok_or_else(|| {
				IdpError::InvalidCredential("code_verifier is required".to_string())
			})?;
			if !verify_code_verifier(challenge, method, verifier) {
				return Err(IdpError::InvalidCredential(
					"code_verifier does not match".to_string(),
				));
			}
		}

		let subject = self
			.store
			.get_or_create_subject(
				&record.username,
				&client.client_id,
				&generate_session_token(),
				now + Duration::seconds(SUBJECT_TTL_SECS),
			)
			.await?;

		let iat = now.timestamp();
		let exp = iat + ACCESS_TOKEN_TTL_SECS;

		let access_token = jwt::sign(
			&self.keys,
			&AccessTokenClaims {
				iss: self.issuer.clone(),
				sub: subject.clone(),
				aud: client.client_id.clone(),
				exp,
				iat,
				jti: generate_session_token(),
				client_id: client.client_id.clone(),
				scope: record.scope.clone(),
			},
		)?;
		let signature = jwt::token_signature(&access_token)
			.ok_or_else(|| IdpError::Signing("signed token has no signature".to_string()))?;
		self.store
			.store_access_token(
				signature,
				&AccessTokenRecord {
					client_id: client.client_id.clone(),
					subject: subject.clone(),
					username: record.username.clone(),
					scope: record.scope.clone(),
					email: record.email.clone(),
				},
				now + Duration::seconds(ACCESS_TOKEN_TTL_SECS),
			)
			.await?;

		let id_token = jwt::sign(
			&self.keys,
			&IdTokenClaims {
				iss: self.issuer.clone(),
				sub: subject,
				aud: client.client_id.clone(),
				exp,
				iat,
				nonce: record.nonce,
				name: Some(record.username.clone()),
				email: record.email,
				terraform_workspace_id: None,
				terraform_run_id: None,
			},
		)?;

		info!(username = %record.username, "issued Terraform access token");
		Ok(TokenResponse {
			access_token,
			token_type: "Bearer".to_string(),
			expires_in: ACCESS_TOKEN_TTL_SECS,
			id_token,
			scope: record.scope,
		})
	}

	/// Verify an access token and load its stored grant. A token whose
	/// record is gone (revoked or expired) is an invalid credential.
	pub async fn verify_bearer(
		&self,
		token: &str,
		now: DateTime<Utc>,
	) -> Result<(AccessTokenClaims, AccessTokenRecord), AuthError> {
		let claims: AccessTokenClaims =
			jwt::verify(&self.keys, token, &self.issuer, now.timestamp())?;
		let signature = jwt::token_signature(token)
			.ok_or_else(|| AuthError::malformed(METHOD, "token has no signature"))?;
		let record = self
			.store
			.find_access_token(signature, now)
			.await
			.map_err(|e| AuthError::internal(METHOD, e))?
			.ok_or(AuthError::InvalidCredential { method: METHOD })?;
		Ok((claims, record))
	}

	pub async fn userinfo(&self, token: &str) -> IdpResult<UserInfo> {
		let (_, record) = self.verify_bearer(token, Utc::now()).await?;
		Ok(UserInfo {
			sub: record.subject,
			name: record.username.clone(),
			preferred_username: record.username,
			email: record.email,
		})
	}

	/// Tokens that are unknown or belong to another client are ignored
	/// (RFC 7009 section 2.2).
	#[instrument(skip_all, fields(client_id = %request.client_id))]
	pub async fn revoke(&self, request: RevocationRequest) -> IdpResult<()> {
		let client = self
			.clients
			.authenticate(&request.client_id, request.client_secret.as_deref())?;
		let Some(signature) = jwt::token_signature(&request.token) else {
			return Ok(());
		};

		match self.store.find_access_token(signature, Utc::now()).await? {
			Some(record) if record.client_id == client.client_id => {
				self.store.revoke_access_token(signature).await?;
				info!(username = %record.username, "revoked Terraform access token");
			}
			Some(_) => warn!("revocation requested by a different client"),
			None => {}
		}
		Ok(())
	}

	/// Drop expired codes, tokens and subjects, then evict aged keys.
	pub async fn cleanup(&self, now: DateTime<Utc>) -> IdpResult<MaintenanceReport> {
		let storage = self.store.cleanup_expired(now).await?;
		let evicted_keys = self.keys.cleanup(self.key_max_age, now);
		Ok(MaintenanceReport {
			storage,
			evicted_keys,
		})
	}

	/// Generate a new signing key on the blocking pool.
	pub async fn rotate_keys(&self) -> IdpResult<String> {
		let keys = self.keys.clone();
		tokio::task::spawn_blocking(move || keys.rotate())
			.await
			.map_err(|e| IdpError::Key(e.to_string()))?
	}
}

fn normalize_scope(scope: Option<&str>) -> IdpResult<String> {
	let mut scopes: Vec<&str> = Vec::new();
	for item in scope.unwrap_or_default().split_whitespace() {
		if !SUPPORTED_SCOPES.contains(&item) {
			return Err(IdpError::InvalidRequest(format!("unsupported scope: {item}")));
		}
		if !scopes.contains(&item) {
			scopes.push(item);
		}
	}
	if scopes.is_empty() {
		return Ok(DEFAULT_SCOPE.to_string());
	}
	Ok(scopes.join(" "))
}

#[async_trait]
impl TerraformTokenVerifier for TerraformIdp {
	async fn verify_access_token(&self, token: &str) -> Result<TerraformIdentity, AuthError> {
		let (claims, record) = self.verify_bearer(token, Utc::now()).await?;
		Ok(TerraformIdentity {
			subject: claims.sub,
			username: record.username,
			client_id: record.client_id,
			scope: record.scope,
		})
	}
}
