// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence seam for authorization codes, access tokens and pairwise
//! subjects.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{IdpError, IdpResult};
use crate::pkce::CodeChallengeMethod;

/// Codes are stored under their SHA-256 so a leaked table cannot be replayed.
pub fn hash_code(code: &str) -> String {
	hex::encode(Sha256::digest(code.as_bytes()))
}

/// Storage key of a pairwise subject. The client id is length-prefixed so
/// ids containing `:` cannot collide.
pub fn subject_key(username: &str, client_id: &str) -> String {
	format!("{}:{client_id}:{username}", client_id.len())
}

/// State captured at the authorization endpoint and consumed by `/token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCodeRecord {
	pub client_id: String,
	pub redirect_uri: String,
	pub scope: String,
	pub username: String,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub nonce: Option<String>,
	#[serde(default)]
	pub code_challenge: Option<String>,
	#[serde(default)]
	pub code_challenge_method: Option<CodeChallengeMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRecord {
	pub client_id: String,
	pub subject: String,
	pub username: String,
	pub scope: String,
	#[serde(default)]
	pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
	pub authorization_codes: u64,
	pub access_tokens: u64,
	pub subjects: u64,
}

impl CleanupStats {
	pub fn total(&self) -> u64 {
		self.authorization_codes + self.access_tokens + self.subjects
	}
}

#[async_trait]
pub trait IdpStore: Send + Sync {
	async fn store_authorization_code(
		&self,
		code_hash: &str,
		record: &AuthorizationCodeRecord,
		expiry: DateTime<Utc>,
	) -> IdpResult<()>;

	/// Delete and return the code in one step. Expired codes are deleted
	/// and reported as absent.
	async fn consume_authorization_code(
		&self,
		code_hash: &str,
		now: DateTime<Utc>,
	) -> IdpResult<Option<AuthorizationCodeRecord>>;

	async fn store_access_token(
		&self,
		signature: &str,
		record: &AccessTokenRecord,
		expiry: DateTime<Utc>,
	) -> IdpResult<()>;

	async fn find_access_token(
		&self,
		signature: &str,
		now: DateTime<Utc>,
	) -> IdpResult<Option<AccessTokenRecord>>;

	/// Returns whether a token was deleted.
	async fn revoke_access_token(&self, signature: &str) -> IdpResult<bool>;

	/// Return the stored subject for `(username, client_id)`, storing
	/// `candidate` when there is none.
	async fn get_or_create_subject(
		&self,
		username: &str,
		client_id: &str,
		candidate: &str,
		expiry: DateTime<Utc>,
	) -> IdpResult<String>;

	async fn cleanup_expired(&self, now: DateTime<Utc>) -> IdpResult<CleanupStats>;
}

type Entries = HashMap<String, (Vec<u8>, DateTime<Utc>)>;

/// Process-local [`IdpStore`], for tests and single-node setups without a
/// database.
#[derive(Default)]
pub struct InMemoryIdpStore {
	codes: Mutex<Entries>,
	tokens: Mutex<Entries>,
	subjects: Mutex<Entries>,
}

fn lock(entries: &Mutex<Entries>) -> std::sync::MutexGuard<'_, Entries> {
	entries
		.lock()
		.unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn purge(entries: &Mutex<Entries>, now: DateTime<Utc>) -> u64 {
	let mut entries = lock(entries);
	let before = entries.len();
	entries.retain(|_, (_, expiry)| *expiry > now);
	(before - entries.len()) as u64
}

#[async_trait]
impl IdpStore for InMemoryIdpStore {
	async fn store_authorization_code(
		&self,
		code_hash: &str,
		record: &AuthorizationCodeRecord,
		expiry: DateTime<Utc>,
	) -> IdpResult<()> {
		let data = serde_json::to_vec(record)?;
		lock(&self.codes).insert(code_hash.to_string(), (data, expiry));
		Ok(())
	}

	async fn consume_authorization_code(
		&self,
		code_hash: &str,
		now: DateTime<Utc>,
	) -> IdpResult<Option<AuthorizationCodeRecord>> {
		let removed = lock(&self.codes).remove(code_hash);
		match removed {
			Some((data, expiry)) if expiry > now => Ok(Some(serde_json::from_slice(&data)?)),
			_ => Ok(None),
		}
	}

	async fn store_access_token(
		&self,
		signature: &str,
		record: &AccessTokenRecord,
		expiry: DateTime<Utc>,
	) -> IdpResult<()> {
		let data = serde_json::to_vec(record)?;
		lock(&self.tokens).insert(signature.to_string(), (data, expiry));
		Ok(())
	}

	async fn find_access_token(
		&self,
		signature: &str,
		now: DateTime<Utc>,
	) -> IdpResult<Option<AccessTokenRecord>> {
		let found = lock(&self.tokens).get(signature).cloned();
		match found {
			Some((data, expiry)) if expiry > now => Ok(Some(serde_json::from_slice(&data)?)),
			_ => Ok(None),
		}
	}

	async fn revoke_access_token(&self, signature: &str) -> IdpResult<bool> {
		Ok(lock(&self.tokens).remove(signature).is_some())
	}

	async fn get_or_create_subject(
		&self,
		username: &str,
		client_id: &str,
		candidate: &str,
		expiry: DateTime<Utc>,
	) -> IdpResult<String> {
		let mut subjects = lock(&self.subjects);
		let (data, _) = subjects
			.entry(subject_key(username, client_id))
			.or_insert_with(|| (candidate.as_bytes().to_vec(), expiry));
		String::from_utf8(data.clone()).map_err(IdpError::store)
	}

	async fn cleanup_expired(&self, now: DateTime<Utc>) -> IdpResult<CleanupStats> {
		Ok(CleanupStats {
			authorization_codes: purge(&self.codes, now),
			access_tokens: purge(&self.tokens, now),
			subjects: purge(&self.subjects, now),
		})
	}
}

#[cfg(test)]
pub(crate) fn sample_code_record() -> AuthorizationCodeRecord {
	AuthorizationCodeRecord {
		client_id: "terraform-cli".to_string(),
		redirect_uri: "http://localhost:10000/login".to_string(),
		scope: "openid".to_string(),
		username: "Admin".to_string(),
		email: None,
		nonce: None,
		code_challenge: None,
		code_challenge_method: None,
	}
}
