// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and router assembly.

use std::sync::Arc;

use axum::{
	middleware::from_fn_with_state,
	routing::{get, post},
	Router,
};
use sqlx::SqlitePool;
use terrareg_server_auth::{
	methods::{
		AdminApiKey, AdminSession, GitHubSession, OpenIdConnectSession, PublishApiKey, SamlSession,
		TerraformAnalyticsAuthKey, TerraformInternalExtraction, TerraformOidc, UploadApiKey,
	},
	AuthDispatcher, AuthMethod, JwksOpenIdConnectValidator, OpenIdConnectValidator, SessionLookup,
	TerraformTokenVerifier, UserGroupLookup,
};
use terrareg_server_config::{AuthConfig, ServerConfig};
use terrareg_server_db::{IdpRepository, SessionRepository, UserGroupRepository};
use terrareg_server_idp::{
	KeyManager, TerraformIdp, AUTHORIZATION_PATH, DISCOVERY_PATH, JWKS_PATH, REVOCATION_PATH,
	TOKEN_PATH, USERINFO_PATH,
};
use tracing::{info, warn};

use crate::{auth_middleware::auth_layer, error::ServerError, routes};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
	pub dispatcher: Arc<AuthDispatcher>,
	pub sessions: SessionRepository,
	pub user_groups: UserGroupRepository,
	pub auth_config: Arc<AuthConfig>,
	/// Present only when the Terraform IdP is enabled.
	pub idp: Option<Arc<TerraformIdp>>,
	pub terraform_client_id: String,
}

impl AppState {
	pub fn session_lookup(&self) -> Arc<dyn SessionLookup> {
		Arc::new(self.sessions.clone())
	}
}

/// Register every authentication method in a dispatcher.
///
/// Methods whose configuration is absent stay registered but report
/// themselves disabled.
pub fn build_dispatcher(
	config: &ServerConfig,
	groups: Arc<dyn UserGroupLookup>,
	terraform_verifier: Option<Arc<dyn TerraformTokenVerifier>>,
	oidc_validator: Option<Arc<dyn OpenIdConnectValidator>>,
) -> AuthDispatcher {
	let auth = &config.auth;
	let methods: Vec<Arc<dyn AuthMethod>> = vec![
		Arc::new(AdminApiKey::new(auth.admin_authentication_token.clone())),
		Arc::new(PublishApiKey::new(auth.publish_api_keys.clone())),
		Arc::new(UploadApiKey::new(auth.upload_api_keys.clone())),
		Arc::new(TerraformInternalExtraction::new(
			auth.internal_extraction_analytics_token.clone(),
		)),
		Arc::new(TerraformAnalyticsAuthKey::new(auth.analytics_auth_keys.clone())),
		Arc::new(TerraformOidc::new(terraform_verifier)),
		Arc::new(AdminSession::new(groups.clone())),
		Arc::new(GitHubSession::new()),
		Arc::new(SamlSession::new(config.sso.saml_enabled(), groups.clone())),
		Arc::new(OpenIdConnectSession::new(
			config.sso.openid_connect_client_id.clone(),
			oidc_validator,
			groups,
		)),
	];
	AuthDispatcher::new(methods)
}

async fn discover_openid_connect(
	config: &ServerConfig,
) -> Option<Arc<dyn OpenIdConnectValidator>> {
	if !config.sso.openid_connect_enabled() {
		return None;
	}
	let issuer = config.sso.openid_connect_issuer.as_deref()?;
	let client_id = config.sso.openid_connect_client_id.as_deref()?;

	let client = reqwest::Client::new();
	match JwksOpenIdConnectValidator::discover(&client, issuer, client_id).await {
		Ok(validator) => {
			info!(%issuer, "OpenID Connect provider discovered");
			Some(Arc::new(validator))
		}
		Err(e) => {
			warn!(%issuer, error = %e, "OpenID Connect discovery failed, sessions will be rejected");
			None
		}
	}
}

async fn build_idp(
	pool: &SqlitePool,
	config: &ServerConfig,
) -> Result<Option<Arc<TerraformIdp>>, ServerError> {
	let oidc = &config.terraform_oidc;
	if !oidc.enabled {
		return Ok(None);
	}

	let key_path = oidc.signing_key_path.clone();
	let keys = tokio::task::spawn_blocking(move || KeyManager::init(key_path.as_deref()))
		.await
		.map_err(|e| ServerError::Internal(format!("signing key task failed: {e}")))??;

	let store = Arc::new(IdpRepository::new(pool.clone()));
	let idp = TerraformIdp::new(oidc, Arc::new(keys), store)?;
	info!(issuer = %idp.issuer(), "Terraform IdP enabled");
	Ok(Some(Arc::new(idp)))
}

/// Build the application state from a migrated pool.
pub async fn create_app_state(
	pool: SqlitePool,
	config: &ServerConfig,
) -> Result<AppState, ServerError> {
	let sessions = SessionRepository::new(pool.clone());
	let user_groups = UserGroupRepository::new(pool.clone());

	let idp = build_idp(&pool, config).await?;
	let terraform_verifier = idp
		.clone()
		.map(|idp| idp as Arc<dyn TerraformTokenVerifier>);
	let oidc_validator = discover_openid_connect(config).await;

	let dispatcher = build_dispatcher(
		config,
		Arc::new(user_groups.clone()),
		terraform_verifier,
		oidc_validator,
	);
	info!(methods = ?dispatcher.enabled_methods(), "authentication methods enabled");

	Ok(AppState {
		dispatcher: Arc::new(dispatcher),
		sessions,
		user_groups,
		auth_config: Arc::new(config.auth.clone()),
		idp,
		terraform_client_id: config.terraform_oidc.client_id.clone(),
	})
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route(
			"/.well-known/terraform.json",
			get(routes::discovery::terraform_services),
		)
		.route(DISCOVERY_PATH, get(routes::idp::openid_configuration))
		.route(JWKS_PATH, get(routes::idp::jwks))
		.route(AUTHORIZATION_PATH, get(routes::idp::authorize))
		.route(TOKEN_PATH, post(routes::idp::token))
		.route(USERINFO_PATH, get(routes::idp::userinfo))
		.route(REVOCATION_PATH, post(routes::idp::revoke))
		.route(
			"/v1/terrareg/auth/admin/is_authenticated",
			get(routes::auth::is_authenticated),
		)
		.route("/logout", post(routes::auth::logout))
		.layer(from_fn_with_state(state.clone(), auth_layer))
		.with_state(state)
}
