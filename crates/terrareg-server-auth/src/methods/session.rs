// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared session resolution for the cookie-bound methods.

use std::collections::HashMap;

use terrareg_common_secret::{Secret, SecretString};
use tracing::debug;

use crate::error::AuthError;
use crate::group::{is_site_admin, resolve_namespace_permissions, UserGroup};
use crate::request::AuthRequest;
use crate::session::SessionPayload;
use crate::store::UserGroupLookup;
use crate::types::{AuthMethodType, PermissionType};

/// A live session whose payload belongs to the calling method.
pub(crate) struct ResolvedSession {
	pub payload: SessionPayload,
	pub csrf_token: SecretString,
}

/// Load the request's session on behalf of `method`.
///
/// - no session id: `Ok(None)`
/// - unknown id: [`AuthError::SessionNotFound`]
/// - expired: `Ok(None)`
/// - payload owned by another method: [`AuthError::ProviderMismatch`]
pub(crate) async fn resolve_session(
	method: AuthMethodType,
	request: &AuthRequest,
) -> Result<Option<ResolvedSession>, AuthError> {
	if request.session_id().is_none() {
		return Ok(None);
	}

	let session = request
		.session()
		.await
		.map_err(|e| AuthError::internal(method, e))?
		.ok_or(AuthError::SessionNotFound { method })?;

	if session.is_expired() {
		debug!(%method, "session expired");
		return Ok(None);
	}

	let payload = session
		.payload()
		.map_err(|_| AuthError::ProviderMismatch { method })?;
	if payload.method_type() != method {
		return Err(AuthError::ProviderMismatch { method });
	}

	Ok(Some(ResolvedSession {
		payload,
		csrf_token: Secret::new(session.csrf_token.clone()),
	}))
}

/// Group-derived privileges for a session identity.
pub(crate) struct GroupPrivileges {
	pub is_admin: bool,
	pub group_names: Vec<String>,
	pub namespace_permissions: HashMap<String, PermissionType>,
}

impl GroupPrivileges {
	pub async fn load(
		method: AuthMethodType,
		lookup: &dyn UserGroupLookup,
		groups: Vec<UserGroup>,
	) -> Result<Self, AuthError> {
		let is_admin = is_site_admin(&groups);
		let group_ids: Vec<i64> = groups.iter().map(|g| g.id).collect();

		let namespace_permissions = if is_admin || group_ids.is_empty() {
			HashMap::new()
		} else {
			let grants = lookup
				.namespace_grants(&group_ids)
				.await
				.map_err(|e| AuthError::internal(method, e))?;
			resolve_namespace_permissions(grants)
		};

		Ok(Self {
			is_admin,
			group_names: groups.into_iter().map(|g| g.name).collect(),
			namespace_permissions,
		})
	}
}
