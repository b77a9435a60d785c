// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Collaborator seams consumed by the auth methods.
//!
//! Persistence and token verification live behind these traits so that auth
//! methods stay stateless and testable without a database.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::group::{NamespaceGrant, UserGroup};
use crate::session::Session;

/// A persistence failure surfaced by a lookup.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
	pub fn new(error: impl fmt::Display) -> Self {
		Self(error.to_string())
	}
}

#[async_trait]
pub trait SessionLookup: Send + Sync {
	/// Fetch a session by id. Expired sessions are still returned.
	async fn find_session(&self, session_id: &str) -> Result<Option<Session>, StoreError>;
}

#[async_trait]
pub trait UserGroupLookup: Send + Sync {
	async fn groups_for_user(&self, user_id: i64) -> Result<Vec<UserGroup>, StoreError>;

	/// Groups whose names appear in `names`; unknown names are ignored.
	async fn groups_by_names(&self, names: &[String]) -> Result<Vec<UserGroup>, StoreError>;

	/// Every namespace permission row held by any of `group_ids`.
	async fn namespace_grants(&self, group_ids: &[i64]) -> Result<Vec<NamespaceGrant>, StoreError>;
}

/// Identity carried by a verified Terraform IdP access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerraformIdentity {
	/// Pairwise subject, not the user's real identifier.
	pub subject: String,
	pub username: String,
	pub client_id: String,
	pub scope: String,
}

#[async_trait]
pub trait TerraformTokenVerifier: Send + Sync {
	/// Verify a bearer access token minted by the embedded IdP.
	async fn verify_access_token(&self, token: &str) -> Result<TerraformIdentity, AuthError>;
}

/// Identity asserted by a verified upstream OpenID Connect ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdConnectIdentity {
	pub subject: String,
	pub username: String,
	pub email: Option<String>,
	pub groups: Vec<String>,
}

#[async_trait]
pub trait OpenIdConnectValidator: Send + Sync {
	/// Verify signature, issuer, audience and expiry of an ID token.
	async fn validate_id_token(&self, id_token: &str) -> Result<OpenIdConnectIdentity, AuthError>;
}
