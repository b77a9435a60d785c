// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cookie-bound session methods.
//!
//! All four share [`resolve_session`] and differ only in how the payload
//! becomes an identity. Session contexts always require a CSRF token for
//! state-changing requests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use super::session::{resolve_session, GroupPrivileges, ResolvedSession};
use super::AuthMethod;
use crate::context::{AuthContext, AuthContextBuilder, NamespaceMatch};
use crate::error::AuthError;
use crate::request::AuthRequest;
use crate::session::SessionPayload;
use crate::store::{OpenIdConnectValidator, UserGroupLookup};
use crate::types::{AuthMethodType, NamespaceType, PermissionType};

/// SAML attribute names that carry group membership, in lookup order.
const SAML_GROUP_ATTRIBUTES: [&str; 2] = ["groups", "memberOf"];

const SAML_EMAIL_ATTRIBUTE: &str = "email";

fn session_context(
	method: AuthMethodType,
	username: impl Into<String>,
	csrf: ResolvedSession,
	privileges: GroupPrivileges,
) -> AuthContextBuilder {
	AuthContext::builder(method, username)
		.csrf_token(csrf.csrf_token)
		.admin(privileges.is_admin)
		.user_groups(privileges.group_names)
		.namespace_permissions(privileges.namespace_permissions)
		.read_api(true)
		.terraform_api(privileges.is_admin)
}

// =============================================================================
// AdminSession
// =============================================================================

/// Sessions minted by the local admin login.
pub struct AdminSession {
	groups: Arc<dyn UserGroupLookup>,
}

impl AdminSession {
	pub fn new(groups: Arc<dyn UserGroupLookup>) -> Self {
		Self { groups }
	}
}

#[async_trait]
impl AuthMethod for AdminSession {
	fn method_type(&self) -> AuthMethodType {
		AuthMethodType::AdminSession
	}

	fn is_enabled(&self) -> bool {
		true
	}

	async fn authenticate(&self, request: &AuthRequest) -> Result<Option<AuthContext>, AuthError> {
		let method = self.method_type();
		let Some(resolved) = resolve_session(method, request).await? else {
			return Ok(None);
		};
		let SessionPayload::AdminSession {
			user_id,
			username,
			email,
		} = &resolved.payload
		else {
			return Err(AuthError::ProviderMismatch { method });
		};
		let (user_id, username, email) = (*user_id, username.clone(), email.clone());

		let groups = self
			.groups
			.groups_for_user(user_id)
			.await
			.map_err(|e| AuthError::internal(method, e))?;
		let privileges = GroupPrivileges::load(method, self.groups.as_ref(), groups).await?;

		let mut context = session_context(method, username, resolved, privileges);
		if let Some(email) = email {
			context = context.provider_data("email", email);
		}
		Ok(Some(context.build()))
	}
}

// =============================================================================
// GitHubSession
// =============================================================================

/// Sessions minted by the GitHub OAuth login. Organisation membership maps
/// directly to namespace ownership.
#[derive(Default)]
pub struct GitHubSession;

impl GitHubSession {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl AuthMethod for GitHubSession {
	fn method_type(&self) -> AuthMethodType {
		AuthMethodType::GitHubSession
	}

	fn is_enabled(&self) -> bool {
		true
	}

	async fn authenticate(&self, request: &AuthRequest) -> Result<Option<AuthContext>, AuthError> {
		let method = self.method_type();
		let Some(resolved) = resolve_session(method, request).await? else {
			return Ok(None);
		};
		let SessionPayload::GitHubSession {
			provider_source,
			github_username,
			organisations,
		} = &resolved.payload
		else {
			return Err(AuthError::ProviderMismatch { method });
		};

		let mut organisations = organisations.clone();
		if organisations.is_empty() {
			organisations.insert(github_username.clone(), NamespaceType::GithubUser);
		}

		let permissions: HashMap<String, PermissionType> = organisations
			.keys()
			.map(|org| (org.clone(), PermissionType::Full))
			.collect();
		let organisations_data: serde_json::Map<String, Value> = organisations
			.iter()
			.map(|(org, kind)| (org.clone(), Value::from(kind.as_str())))
			.collect();

		Ok(Some(
			AuthContext::builder(method, github_username.clone())
				.csrf_token(resolved.csrf_token.clone())
				.namespace_permissions(permissions)
				.namespace_match(NamespaceMatch::CaseInsensitive)
				.read_api(true)
				.provider_data("provider_source", provider_source.clone())
				.provider_data("organisations", Value::Object(organisations_data))
				.build(),
		))
	}
}

// =============================================================================
// SamlSession
// =============================================================================

/// Sessions minted by the SAML2 login. Group attributes are matched against
/// user group names; names with no matching group are dropped, so
/// `user_groups` only lists groups known to the registry.
pub struct SamlSession {
	enabled: bool,
	groups: Arc<dyn UserGroupLookup>,
}

impl SamlSession {
	pub fn new(enabled: bool, groups: Arc<dyn UserGroupLookup>) -> Self {
		Self { enabled, groups }
	}
}

#[async_trait]
impl AuthMethod for SamlSession {
	fn method_type(&self) -> AuthMethodType {
		AuthMethodType::SamlSession
	}

	fn is_enabled(&self) -> bool {
		self.enabled
	}

	async fn authenticate(&self, request: &AuthRequest) -> Result<Option<AuthContext>, AuthError> {
		let method = self.method_type();
		let Some(resolved) = resolve_session(method, request).await? else {
			return Ok(None);
		};
		let SessionPayload::SamlSession { name_id, userdata } = &resolved.payload else {
			return Err(AuthError::ProviderMismatch { method });
		};
		let name_id = name_id.clone();
		let email = userdata
			.get(SAML_EMAIL_ATTRIBUTE)
			.and_then(|values| values.first())
			.cloned();

		let group_names: Vec<String> = SAML_GROUP_ATTRIBUTES
			.iter()
			.filter_map(|attribute| userdata.get(*attribute))
			.find(|values| !values.is_empty())
			.cloned()
			.unwrap_or_default();

		let groups = if group_names.is_empty() {
			Vec::new()
		} else {
			self.groups
				.groups_by_names(&group_names)
				.await
				.map_err(|e| AuthError::internal(method, e))?
		};
		let privileges = GroupPrivileges::load(method, self.groups.as_ref(), groups).await?;

		let mut context = session_context(method, name_id, resolved, privileges);
		if let Some(email) = email {
			context = context.provider_data("email", email);
		}
		Ok(Some(context.build()))
	}
}

// =============================================================================
// OpenIdConnectSession
// =============================================================================

/// Sessions minted by an external OpenID Connect login. The stored ID token
/// is re-validated on every request.
pub struct OpenIdConnectSession {
	client_id: Option<String>,
	validator: Option<Arc<dyn OpenIdConnectValidator>>,
	groups: Arc<dyn UserGroupLookup>,
}

impl OpenIdConnectSession {
	pub fn new(
		client_id: Option<String>,
		validator: Option<Arc<dyn OpenIdConnectValidator>>,
		groups: Arc<dyn UserGroupLookup>,
	) -> Self {
		Self {
			client_id: client_id.filter(|c| !c.trim().is_empty()),
			validator,
			groups,
		}
	}
}

#[async_trait]
impl AuthMethod for OpenIdConnectSession {
	fn method_type(&self) -> AuthMethodType {
		AuthMethodType::OpenIDConnectSession
	}

	fn is_enabled(&self) -> bool {
		self.client_id.is_some() && self.validator.is_some()
	}

	async fn authenticate(&self, request: &AuthRequest) -> Result<Option<AuthContext>, AuthError> {
		let method = self.method_type();
		let Some(validator) = &self.validator else {
			return Ok(None);
		};
		let Some(resolved) = resolve_session(method, request).await? else {
			return Ok(None);
		};
		let SessionPayload::OpenIdConnectSession {
			openid_connect_id_token,
			openid_connect_expires_at,
		} = &resolved.payload
		else {
			return Err(AuthError::ProviderMismatch { method });
		};

		if *openid_connect_expires_at <= Utc::now().timestamp() {
			debug!("stored OpenID Connect token expired");
			return Ok(None);
		}

		let identity = validator.validate_id_token(openid_connect_id_token).await?;

		let groups = if identity.groups.is_empty() {
			Vec::new()
		} else {
			self.groups
				.groups_by_names(&identity.groups)
				.await
				.map_err(|e| AuthError::internal(method, e))?
		};
		let privileges = GroupPrivileges::load(method, self.groups.as_ref(), groups).await?;

		let mut context = AuthContext::builder(method, identity.username)
			.csrf_token(resolved.csrf_token.clone())
			.admin(privileges.is_admin)
			.user_groups(privileges.group_names)
			.namespace_permissions(privileges.namespace_permissions)
			.read_api(true)
			.terraform_api(privileges.is_admin)
			.provider_data("sub", identity.subject);
		if let Some(email) = identity.email {
			context = context.provider_data("email", email);
		}

		Ok(Some(context.build()))
	}
}
