// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistent login sessions and their provider payloads.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use terrareg_common_secret::REDACTED;

use crate::types::{AuthMethodType, NamespaceType};

/// Length in bytes of session ids and CSRF tokens before hex encoding.
const TOKEN_BYTES: usize = 32;

/// Generate a random 256-bit token, hex encoded.
pub fn generate_session_token() -> String {
	let mut bytes = [0u8; TOKEN_BYTES];
	rand::thread_rng().fill_bytes(&mut bytes);
	hex::encode(bytes)
}

/// Identity material deposited by the login flow that minted a session.
///
/// Serialized with an `auth_method` discriminator naming the session method
/// that owns the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "auth_method")]
pub enum SessionPayload {
	AdminSession {
		user_id: i64,
		username: String,
		#[serde(default)]
		email: Option<String>,
	},
	GitHubSession {
		provider_source: String,
		github_username: String,
		#[serde(default)]
		organisations: BTreeMap<String, NamespaceType>,
	},
	SamlSession {
		#[serde(rename = "samlNameId")]
		name_id: String,
		#[serde(rename = "samlUserdata", default)]
		userdata: BTreeMap<String, Vec<String>>,
	},
	#[serde(rename = "OpenIDConnectSession")]
	OpenIdConnectSession {
		openid_connect_id_token: String,
		/// Unix seconds.
		openid_connect_expires_at: i64,
	},
}

impl SessionPayload {
	/// The session method that consumes this payload.
	pub fn method_type(&self) -> AuthMethodType {
		match self {
			SessionPayload::AdminSession { .. } => AuthMethodType::AdminSession,
			SessionPayload::GitHubSession { .. } => AuthMethodType::GitHubSession,
			SessionPayload::SamlSession { .. } => AuthMethodType::SamlSession,
			SessionPayload::OpenIdConnectSession { .. } => AuthMethodType::OpenIDConnectSession,
		}
	}

	pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
		serde_json::to_vec(self)
	}

	pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
		serde_json::from_slice(bytes)
	}
}

/// A server-side session referenced by an opaque id.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
	pub id: String,
	pub provider_source_auth: Vec<u8>,
	pub expiry: DateTime<Utc>,
	pub csrf_token: String,
}

impl Session {
	/// Mint a session with fresh id and CSRF token.
	pub fn new(payload: &SessionPayload, lifetime: Duration) -> Result<Self, serde_json::Error> {
		Ok(Self {
			id: generate_session_token(),
			provider_source_auth: payload.encode()?,
			expiry: Utc::now() + lifetime,
			csrf_token: generate_session_token(),
		})
	}

	pub fn is_expired(&self) -> bool {
		self.is_expired_at(Utc::now())
	}

	/// Closed interval: a session whose expiry equals `now` is expired.
	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		now >= self.expiry
	}

	pub fn payload(&self) -> Result<SessionPayload, serde_json::Error> {
		SessionPayload::decode(&self.provider_source_auth)
	}
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("id", &REDACTED)
			.field("provider_source_auth_len", &self.provider_source_auth.len())
			.field("expiry", &self.expiry)
			.field("csrf_token", &REDACTED)
			.finish()
	}
}
