// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::AuthError;
use crate::group::{NamespaceGrant, UserGroup};
use crate::request::AuthRequest;
use crate::session::{Session, SessionPayload};
use crate::store::{
	OpenIdConnectIdentity, OpenIdConnectValidator, SessionLookup, StoreError, TerraformIdentity,
	TerraformTokenVerifier, UserGroupLookup,
};
use crate::types::{AuthMethodType, PermissionType};

pub const COOKIE_NAME: &str = "session_id";

#[derive(Default)]
pub struct InMemorySessions {
	sessions: Mutex<HashMap<String, Session>>,
	lookups: AtomicUsize,
}

impl InMemorySessions {
	pub fn insert(&self, session: Session) {
		self.sessions
			.lock()
			.unwrap()
			.insert(session.id.clone(), session);
	}

	pub fn lookups(&self) -> usize {
		self.lookups.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl SessionLookup for InMemorySessions {
	async fn find_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
		self.lookups.fetch_add(1, Ordering::SeqCst);
		Ok(self.sessions.lock().unwrap().get(session_id).cloned())
	}
}

#[derive(Default)]
pub struct InMemoryGroups {
	groups: Vec<UserGroup>,
	members: Vec<(i64, i64)>,
	grants: Vec<(i64, NamespaceGrant)>,
	failing: bool,
}

impl InMemoryGroups {
	pub fn with_group(mut self, id: i64, name: &str, site_admin: bool) -> Self {
		self.groups.push(UserGroup {
			id,
			name: name.to_string(),
			site_admin,
			description: None,
		});
		self
	}

	pub fn with_member(mut self, user_id: i64, group_id: i64) -> Self {
		self.members.push((user_id, group_id));
		self
	}

	pub fn with_grant(mut self, group_id: i64, namespace: &str, permission: PermissionType) -> Self {
		self.grants
			.push((group_id, NamespaceGrant::new(namespace, permission)));
		self
	}

	pub fn failing(mut self) -> Self {
		self.failing = true;
		self
	}

	fn check(&self) -> Result<(), StoreError> {
		if self.failing {
			Err(StoreError::new("database is locked"))
		} else {
			Ok(())
		}
	}
}

#[async_trait]
impl UserGroupLookup for InMemoryGroups {
	async fn groups_for_user(&self, user_id: i64) -> Result<Vec<UserGroup>, StoreError> {
		self.check()?;
		Ok(self
			.groups
			.iter()
			.filter(|g| self.members.contains(&(user_id, g.id)))
			.cloned()
			.collect())
	}

	async fn groups_by_names(&self, names: &[String]) -> Result<Vec<UserGroup>, StoreError> {
		self.check()?;
		Ok(self
			.groups
			.iter()
			.filter(|g| names.contains(&g.name))
			.cloned()
			.collect())
	}

	async fn namespace_grants(&self, group_ids: &[i64]) -> Result<Vec<NamespaceGrant>, StoreError> {
		self.check()?;
		Ok(self
			.grants
			.iter()
			.filter(|(id, _)| group_ids.contains(id))
			.map(|(_, grant)| grant.clone())
			.collect())
	}
}

/// Accepts exactly the tokens it was given.
#[derive(Default)]
pub struct StaticTerraformVerifier {
	tokens: HashMap<String, TerraformIdentity>,
}

impl StaticTerraformVerifier {
	pub fn with_token(mut self, token: &str, username: &str) -> Self {
		self.tokens.insert(
			token.to_string(),
			TerraformIdentity {
				subject: format!("sub-{username}"),
				username: username.to_string(),
				client_id: "terraform-cli".to_string(),
				scope: "openid".to_string(),
			},
		);
		self
	}
}

#[async_trait]
impl TerraformTokenVerifier for StaticTerraformVerifier {
	async fn verify_access_token(&self, token: &str) -> Result<TerraformIdentity, AuthError> {
		self.tokens
			.get(token)
			.cloned()
			.ok_or(AuthError::SignatureInvalid {
				method: AuthMethodType::TerraformOidc,
			})
	}
}

/// Accepts one ID token and rejects everything else with a bad signature.
pub struct StaticOidcValidator {
	pub accepted_token: String,
	pub identity: OpenIdConnectIdentity,
}

#[async_trait]
impl OpenIdConnectValidator for StaticOidcValidator {
	async fn validate_id_token(&self, id_token: &str) -> Result<OpenIdConnectIdentity, AuthError> {
		if id_token == self.accepted_token {
			Ok(self.identity.clone())
		} else {
			Err(AuthError::SignatureInvalid {
				method: AuthMethodType::OpenIDConnectSession,
			})
		}
	}
}

pub fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
	let mut map = HeaderMap::new();
	for (name, value) in pairs {
		map.append(
			HeaderName::from_bytes(name.as_bytes()).unwrap(),
			HeaderValue::from_str(value).unwrap(),
		);
	}
	map
}

pub fn request(pairs: &[(&str, &str)]) -> AuthRequest {
	AuthRequest::new(header_map(pairs))
}

/// Store a session for `payload` and return a request carrying its cookie.
pub fn session_request(
	sessions: &Arc<InMemorySessions>,
	payload: &SessionPayload,
	lifetime: Duration,
) -> (Session, AuthRequest) {
	let session = Session::new(payload, lifetime).unwrap();
	sessions.insert(session.clone());
	let cookie = format!("{COOKIE_NAME}={}", session.id);
	let request = AuthRequest::new(header_map(&[("cookie", cookie.as_str())]))
		.with_sessions(sessions.clone(), COOKIE_NAME);
	(session, request)
}
