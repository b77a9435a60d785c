// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage for the Terraform identity provider.
//!
//! All three tables share a `(key, data, expiry)` shape. Codes are keyed by
//! their hash, access tokens by their JWT signature and subjects by
//! `<client_id>:<username>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use terrareg_server_idp::store::subject_key;
use terrareg_server_idp::{
	AccessTokenRecord, AuthorizationCodeRecord, CleanupStats, IdpResult, IdpStore,
};

use crate::error::DbError;
use crate::timestamp;

const AUTH_CODES: &str = "terraform_idp_auth_codes";
const ACCESS_TOKENS: &str = "terraform_idp_access_tokens";
const SUBJECTS: &str = "terraform_idp_subject_identifiers";

#[derive(Clone)]
pub struct IdpRepository {
	pool: SqlitePool,
}

impl IdpRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	async fn put(
		&self,
		table: &'static str,
		key: &str,
		data: &[u8],
		expiry: DateTime<Utc>,
	) -> Result<(), DbError> {
		sqlx::query(&format!(
			r#"
			INSERT INTO {table} (key, data, expiry) VALUES (?, ?, ?)
			ON CONFLICT(key) DO UPDATE SET data = excluded.data, expiry = excluded.expiry
			"#
		))
		.bind(key)
		.bind(data)
		.bind(timestamp::encode(expiry))
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	async fn purge(&self, table: &'static str, now: DateTime<Utc>) -> Result<u64, DbError> {
		let result = sqlx::query(&format!("DELETE FROM {table} WHERE expiry <= ?"))
			.bind(timestamp::encode(now))
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}

	#[tracing::instrument(skip(self, code_hash, record), fields(client_id = %record.client_id))]
	pub async fn store_authorization_code(
		&self,
		code_hash: &str,
		record: &AuthorizationCodeRecord,
		expiry: DateTime<Utc>,
	) -> Result<(), DbError> {
		let data = serde_json::to_vec(record)?;
		self.put(AUTH_CODES, code_hash, &data, expiry).await
	}

	/// Single statement, so two concurrent exchanges cannot both see the row.
	#[tracing::instrument(skip(self, code_hash))]
	pub async fn consume_authorization_code(
		&self,
		code_hash: &str,
		now: DateTime<Utc>,
	) -> Result<Option<AuthorizationCodeRecord>, DbError> {
		let row = sqlx::query(
			"DELETE FROM terraform_idp_auth_codes WHERE key = ? RETURNING data, expiry",
		)
		.bind(code_hash)
		.fetch_optional(&self.pool)
		.await?;

		let Some(row) = row else {
			return Ok(None);
		};
		let expiry: String = row.try_get("expiry")?;
		if timestamp::decode(&expiry)? <= now {
			tracing::debug!("authorization code expired");
			return Ok(None);
		}
		let data: Vec<u8> = row.try_get("data")?;
		Ok(Some(serde_json::from_slice(&data)?))
	}

	#[tracing::instrument(skip(self, signature, record), fields(client_id = %record.client_id))]
	pub async fn store_access_token(
		&self,
		signature: &str,
		record: &AccessTokenRecord,
		expiry: DateTime<Utc>,
	) -> Result<(), DbError> {
		let data = serde_json::to_vec(record)?;
		self.put(ACCESS_TOKENS, signature, &data, expiry).await
	}

	#[tracing::instrument(skip(self, signature))]
	pub async fn find_access_token(
		&self,
		signature: &str,
		now: DateTime<Utc>,
	) -> Result<Option<AccessTokenRecord>, DbError> {
		let data: Option<Vec<u8>> = sqlx::query_scalar(
			"SELECT data FROM terraform_idp_access_tokens WHERE key = ? AND expiry > ?",
		)
		.bind(signature)
		.bind(timestamp::encode(now))
		.fetch_optional(&self.pool)
		.await?;

		data.map(|data| serde_json::from_slice(&data))
			.transpose()
			.map_err(DbError::from)
	}

	#[tracing::instrument(skip(self, signature))]
	pub async fn revoke_access_token(&self, signature: &str) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM terraform_idp_access_tokens WHERE key = ?")
			.bind(signature)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	/// Insert-if-absent, then read back, so concurrent first logins agree on
	/// one subject.
	#[tracing::instrument(skip(self, candidate))]
	pub async fn get_or_create_subject(
		&self,
		username: &str,
		client_id: &str,
		candidate: &str,
		expiry: DateTime<Utc>,
	) -> Result<String, DbError> {
		let key = subject_key(username, client_id);
		sqlx::query(
			r#"
			INSERT INTO terraform_idp_subject_identifiers (key, data, expiry) VALUES (?, ?, ?)
			ON CONFLICT(key) DO NOTHING
			"#,
		)
		.bind(&key)
		.bind(candidate.as_bytes())
		.bind(timestamp::encode(expiry))
		.execute(&self.pool)
		.await?;

		let data: Vec<u8> =
			sqlx::query_scalar("SELECT data FROM terraform_idp_subject_identifiers WHERE key = ?")
				.bind(&key)
				.fetch_one(&self.pool)
				.await?;
		String::from_utf8(data).map_err(|e| DbError::Internal(format!("invalid subject: {e}")))
	}

	#[tracing::instrument(skip(self))]
	pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<CleanupStats, DbError> {
		let stats = CleanupStats {
			authorization_codes: self.purge(AUTH_CODES, now).await?,
			access_tokens: self.purge(ACCESS_TOKENS, now).await?,
			subjects: self.purge(SUBJECTS, now).await?,
		};
		if stats.total() > 0 {
			tracing::debug!(
				authorization_codes = stats.authorization_codes,
				access_tokens = stats.access_tokens,
				subjects = stats.subjects,
				"cleaned up expired identity provider state"
			);
		}
		Ok(stats)
	}
}

#[async_trait]
impl IdpStore for IdpRepository {
	async fn store_authorization_code(
		&self,
		code_hash: &str,
		record: &AuthorizationCodeRecord,
		expiry: DateTime<Utc>,
	) -> IdpResult<()> {
		Ok(self
			.store_authorization_code(code_hash, record, expiry)
			.await?)
	}

	async fn consume_authorization_code(
		&self,
		code_hash: &str,
		now: DateTime<Utc>,
	) -> IdpResult<Option<AuthorizationCodeRecord>> {
		Ok(self.consume_authorization_code(code_hash, now).await?)
	}

	async fn store_access_token(
		&self,
		signature: &str,
		record: &AccessTokenRecord,
		expiry: DateTime<Utc>,
	) -> IdpResult<()> {
		Ok(self.store_access_token(signature, record, expiry).await?)
	}

	async fn find_access_token(
		&self,
		signature: &str,
		now: DateTime<Utc>,
	) -> IdpResult<Option<AccessTokenRecord>> {
		Ok(self.find_access_token(signature, now).await?)
	}

	async fn revoke_access_token(&self, signature: &str) -> IdpResult<bool> {
		Ok(self.revoke_access_token(signature).await?)
	}

	async fn get_or_create_subject(
		&self,
		username: &str,
		client_id: &str,
		candidate: &str,
		expiry: DateTime<Utc>,
	) -> IdpResult<String> {
		Ok(self
			.get_or_create_subject(username, client_id, candidate, expiry)
			.await?)
	}

	async fn cleanup_expired(&self, now: DateTime<Utc>) -> IdpResult<CleanupStats> {
		Ok(self.cleanup_expired(now).await?)
	}
}
