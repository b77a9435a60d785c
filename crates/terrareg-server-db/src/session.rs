// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Session repository.
//!
//! Sessions are written by login and logout handlers and read by the auth
//! dispatcher through [`SessionLookup`]. Lookups return expired rows; the
//! session methods decide what expiry means and the cleanup job deletes them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use terrareg_server_auth::{Session, SessionLookup, StoreError};

use crate::error::DbError;
use crate::timestamp;

#[async_trait]
pub trait SessionStore: Send + Sync {
	async fn create_session(&self, session: &Session) -> Result<(), DbError>;
	async fn get_session_by_id(&self, id: &str) -> Result<Option<Session>, DbError>;
	async fn delete_session(&self, id: &str) -> Result<bool, DbError>;
	async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, DbError>;
}

#[derive(Clone)]
pub struct SessionRepository {
	pool: SqlitePool,
}

impl SessionRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, session), fields(expiry = %session.expiry))]
	pub async fn create_session(&self, session: &Session) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO sessions (id, provider_source_auth, expiry, csrf_token)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(&session.id)
		.bind(&session.provider_source_auth)
		.bind(timestamp::encode(session.expiry))
		.bind(&session.csrf_token)
		.execute(&self.pool)
		.await?;

		tracing::debug!("session created");
		Ok(())
	}

	/// Does not check expiry.
	#[tracing::instrument(skip(self, id))]
	pub async fn get_session_by_id(&self, id: &str) -> Result<Option<Session>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, provider_source_auth, expiry, csrf_token
			FROM sessions
			WHERE id = ?
			"#,
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|row| -> Result<Session, DbError> {
			let expiry: String = row.try_get("expiry")?;
			Ok(Session {
				id: row.try_get("id")?,
				provider_source_auth: row.try_get("provider_source_auth")?,
				expiry: timestamp::decode(&expiry)?,
				csrf_token: row.try_get("csrf_token")?,
			})
		})
		.transpose()
	}

	#[tracing::instrument(skip(self, id))]
	pub async fn delete_session(&self, id: &str) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
			.bind(id)
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::debug!("session deleted");
		}
		Ok(deleted)
	}

	/// Delete sessions whose expiry is at or before `now`.
	#[tracing::instrument(skip(self))]
	pub async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
		let result = sqlx::query("DELETE FROM sessions WHERE expiry <= ?")
			.bind(timestamp::encode(now))
			.execute(&self.pool)
			.await?;

		let count = result.rows_affected();
		if count > 0 {
			tracing::debug!(count, "cleaned up expired sessions");
		}
		Ok(count)
	}
}

#[async_trait]
impl SessionStore for SessionRepository {
	async fn create_session(&self, session: &Session) -> Result<(), DbError> {
		self.create_session(session).await
	}

	async fn get_session_by_id(&self, id: &str) -> Result<Option<Session>, DbError> {
		self.get_session_by_id(id).await
	}

	async fn delete_session(&self, id: &str) -> Result<bool, DbError> {
		self.delete_session(id).await
	}

	async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
		self.cleanup_expired_sessions(now).await
	}
}

#[async_trait]
impl SessionLookup for SessionRepository {
	async fn find_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
		Ok(self.get_session_by_id(session_id).await?)
	}
}
