// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The immutable per-request authorization context.
//!
//! An [`AuthContext`] is produced once per request by the
//! [`AuthDispatcher`](crate::AuthDispatcher) and never mutated afterwards.
//! Handlers make permission decisions through the predicates on this type,
//! never by branching on [`AuthContext::provider_type`].
//!
//! Contexts are built with [`AuthContextBuilder`]; `build()` enforces the
//! structural invariants:
//!
//! - a built-in admin is always an admin
//! - an admin carries an empty namespace map (the empty map means "all")
//! - an unauthenticated context has every flag false

use std::collections::HashMap;

use serde_json::{Map, Value};
use terrareg_common_secret::SecretString;

use crate::error::AuthError;
use crate::types::{AuthMethodType, PermissionType};

/// How namespace names are compared against the permission map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamespaceMatch {
	#[default]
	Exact,
	/// Keys are stored lowercased and lookups are folded.
	CaseInsensitive,
}

#[derive(Debug, Clone)]
pub struct AuthContext {
	provider_type: AuthMethodType,
	authenticated: bool,
	is_admin: bool,
	is_builtin_admin: bool,
	requires_csrf: bool,
	username: String,
	user_groups: Vec<String>,
	namespace_permissions: HashMap<String, PermissionType>,
	namespace_match: NamespaceMatch,
	can_publish_any_namespace: bool,
	can_upload_any_namespace: bool,
	can_access_read_api: bool,
	can_access_terraform_api: bool,
	terraform_auth_token: Option<SecretString>,
	csrf_token: Option<SecretString>,
	provider_data: Map<String, Value>,
}

impl AuthContext {
	/// The sentinel context produced when every method abstains.
	pub fn unauthenticated() -> Self {
		Self {
			provider_type: AuthMethodType::NotAuthenticated,
			authenticated: false,
			is_admin: false,
			is_builtin_admin: false,
			requires_csrf: false,
			username: String::new(),
			user_groups: Vec::new(),
			namespace_permissions: HashMap::new(),
			namespace_match: NamespaceMatch::Exact,
			can_publish_any_namespace: false,
			can_upload_any_namespace: false,
			can_access_read_api: false,
			can_access_terraform_api: false,
			terraform_auth_token: None,
			csrf_token: None,
			provider_data: Map::new(),
		}
	}

	pub fn builder(
		provider_type: AuthMethodType,
		username: impl Into<String>,
	) -> AuthContextBuilder {
		AuthContextBuilder::new(provider_type, username)
	}

	// =========================================================================
	// Attributes
	// =========================================================================

	pub fn provider_type(&self) -> AuthMethodType {
		self.provider_type
	}

	pub fn is_authenticated(&self) -> bool {
		self.authenticated
	}

	pub fn is_admin(&self) -> bool {
		self.authenticated && self.is_admin
	}

	pub fn is_builtin_admin(&self) -> bool {
		self.authenticated && self.is_builtin_admin
	}

	pub fn requires_csrf(&self) -> bool {
		self.requires_csrf
	}

	pub fn username(&self) -> &str {
		&self.username
	}

	pub fn user_groups(&self) -> &[String] {
		&self.user_groups
	}

	/// Resolved namespace permissions. Empty for admins, meaning "all".
	pub fn namespace_permissions(&self) -> &HashMap<String, PermissionType> {
		&self.namespace_permissions
	}

	pub fn terraform_auth_token(&self) -> Option<&SecretString> {
		self.terraform_auth_token.as_ref()
	}

	pub fn provider_data(&self) -> &Map<String, Value> {
		&self.provider_data
	}

	// =========================================================================
	// Permission predicates
	// =========================================================================

	/// Admin, or the stored permission for `namespace` ranks at least `required`.
	pub fn check_namespace_access(&self, required: PermissionType, namespace: &str) -> bool {
		if !self.authenticated {
			return false;
		}
		if self.is_admin {
			return true;
		}
		self.permission_for(namespace)
			.is_some_and(|held| held.satisfies(required))
	}

	pub fn can_upload_module_version(&self, namespace: &str) -> bool {
		self.authenticated
			&& (self.is_admin
				|| self.can_upload_any_namespace
				|| self.check_namespace_access(PermissionType::Modify, namespace))
	}

	pub fn can_publish_module_version(&self, namespace: &str) -> bool {
		self.authenticated
			&& (self.is_admin
				|| self.can_publish_any_namespace
				|| self.check_namespace_access(PermissionType::Full, namespace))
	}

	pub fn can_access_read_api(&self) -> bool {
		self.authenticated && self.can_access_read_api
	}

	pub fn can_access_terraform_api(&self) -> bool {
		self.authenticated && self.can_access_terraform_api
	}

	/// Fails with `MissingCredential` for the unauthenticated sentinel.
	pub fn require_authenticated(&self) -> Result<&Self, AuthError> {
		if self.authenticated {
			Ok(self)
		} else {
			Err(AuthError::MissingCredential {
				method: self.provider_type,
			})
		}
	}

	/// Validates the CSRF token presented with a state-changing request.
	///
	/// Contexts that do not require CSRF always pass. Session contexts compare
	/// the presented token against the session's token in constant time.
	pub fn check_csrf_token(&self, presented: Option<&str>) -> Result<(), AuthError> {
		if !self.requires_csrf {
			return Ok(());
		}

		let valid = match (&self.csrf_token, presented) {
			(Some(expected), Some(presented)) => expected.matches(presented),
			_ => false,
		};

		if valid {
			Ok(())
		} else {
			Err(AuthError::InvalidCredential {
				method: self.provider_type,
			})
		}
	}

	fn permission_for(&self, namespace: &str) -> Option<PermissionType> {
		match self.namespace_match {
			NamespaceMatch::Exact => self.namespace_permissions.get(namespace).copied(),
			NamespaceMatch::CaseInsensitive => self
				.namespace_permissions
				.get(&namespace.to_lowercase())
				.copied(),
		}
	}
}

/// Builder for authenticated contexts.
#[derive(Debug)]
pub struct AuthContextBuilder {
	inner: AuthContext,
}

impl AuthContextBuilder {
	pub fn new(provider_type: AuthMethodType, username: impl Into<String>) -> Self {
		let mut inner = AuthContext::unauthenticated();
		inner.provider_type = provider_type;
		inner.authenticated = provider_type != AuthMethodType::NotAuthenticated;
		inner.username = username.into();
		Self { inner }
	}

	pub fn admin(mut self, is_admin: bool) -> Self {
		self.inner.is_admin = is_admin;
		self
	}

	/// Marks the context as the configured built-in administrator.
	pub fn builtin_admin(mut self) -> Self {
		self.inner.is_builtin_admin = true;
		self.inner.is_admin = true;
		self
	}

	/// Session-backed contexts require CSRF validation against this token.
	pub fn csrf_token(mut self, token: SecretString) -> Self {
		self.inner.requires_csrf = true;
		self.inner.csrf_token = Some(token);
		self
	}

	pub fn user_groups(mut self, groups: Vec<String>) -> Self {
		self.inner.user_groups = groups;
		self
	}

	pub fn namespace_permissions(mut self, permissions: HashMap<String, PermissionType>) -> Self {
		self.inner.namespace_permissions = permissions;
		self
	}

	pub fn namespace_match(mut self, namespace_match: NamespaceMatch) -> Self {
		self.inner.namespace_match = namespace_match;
		self
	}

	pub fn publish_any_namespace(mut self) -> Self {
		self.inner.can_publish_any_namespace = true;
		self
	}

	pub fn upload_any_namespace(mut self) -> Self {
		self.inner.can_upload_any_namespace = true;
		self
	}

	pub fn read_api(mut self, allowed: bool) -> Self {
		self.inner.can_access_read_api = allowed;
		self
	}

	pub fn terraform_api(mut self, allowed: bool) -> Self {
		self.inner.can_access_terraform_api = allowed;
		self
	}

	pub fn terraform_auth_token(mut self, token: SecretString) -> Self {
		self.inner.terraform_auth_token = Some(token);
		self
	}

	pub fn provider_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.inner.provider_data.insert(key.into(), value.into());
		self
	}

	pub fn build(self) -> AuthContext {
		let mut ctx = self.inner;

		if !ctx.authenticated {
			return AuthContext::unauthenticated();
		}

		if ctx.is_builtin_admin {
			ctx.is_admin = true;
		}

		if ctx.is_admin {
			ctx.namespace_permissions.clear();
		} else if ctx.namespace_match == NamespaceMatch::CaseInsensitive {
			ctx.namespace_permissions = fold_case(ctx.namespace_permissions);
		}

		ctx
	}
}

fn fold_case(permissions: HashMap<String, PermissionType>) -> HashMap<String, PermissionType> {
	let mut folded: HashMap<String, PermissionType> = HashMap::with_capacity(permissions.len());
	for (namespace, permission) in permissions {
		let entry = folded
			.entry(namespace.to_lowercase())
			.or_insert(permission);
		if permission > *entry {
			*entry = permission;
		}
	}
	folded
}
