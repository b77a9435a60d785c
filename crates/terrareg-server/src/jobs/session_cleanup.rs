// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use terrareg_server_db::SessionStore;
use tracing::instrument;

use super::{Job, JobContext, JobError, JobOutput};

pub struct SessionCleanupJob {
	sessions: Arc<dyn SessionStore>,
}

impl SessionCleanupJob {
	pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
		Self { sessions }
	}
}

#[async_trait]
impl Job for SessionCleanupJob {
	fn id(&self) -> &str {
		"session-cleanup"
	}

	fn name(&self) -> &str {
		"Session Cleanup"
	}

	fn description(&self) -> &str {
		"Delete expired sessions from database"
	}

	#[instrument(skip(self, ctx), fields(job_id = "session-cleanup"))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let sessions_deleted = self
			.sessions
			.cleanup_expired_sessions(Utc::now())
			.await
			.map_err(JobError::retryable)?;

		tracing::info!(sessions_deleted, "Session cleanup completed");

		Ok(JobOutput {
			message: format!("Deleted {sessions_deleted} expired sessions"),
			metadata: Some(serde_json::json!({ "sessions_deleted": sessions_deleted })),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use terrareg_server_auth::{Session, SessionPayload};
	use terrareg_server_db::{create_pool, run_migrations, SessionRepository};
	use tokio_util::sync::CancellationToken;

	fn payload() -> SessionPayload {
		SessionPayload::AdminSession {
			user_id: 1,
			username: "admin".to_string(),
			email: None,
		}
	}

	#[tokio::test]
	async fn deletes_only_expired_sessions() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("sessions.db").display());
		let pool = create_pool(&url).await.unwrap();
		run_migrations(&pool).await.unwrap();
		let repo = SessionRepository::new(pool);

		let live = Session::new(&payload(), Duration::minutes(30)).unwrap();
		let expired = Session::new(&payload(), Duration::minutes(-5)).unwrap();
		repo.create_session(&live).await.unwrap();
		repo.create_session(&expired).await.unwrap();

		let job = SessionCleanupJob::new(Arc::new(repo.clone()));
		let ctx = JobContext {
			cancellation_token: CancellationToken::new(),
		};
		let output = job.run(&ctx).await.unwrap();

		assert_eq!(output.metadata.unwrap()["sessions_deleted"], 1);
		assert!(repo.get_session_by_id(&live.id).await.unwrap().is_some());
		assert!(repo.get_session_by_id(&expired.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn cancelled_job_does_nothing() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("sessions.db").display());
		let pool = create_pool(&url).await.unwrap();
		run_migrations(&pool).await.unwrap();

		let job = SessionCleanupJob::new(Arc::new(SessionRepository::new(pool)));
		let token = CancellationToken::new();
		token.cancel();
		let err = job
			.run(&JobContext {
				cancellation_token: token,
			})
			.await
			.unwrap_err();
		assert!(matches!(err, JobError::Cancelled));
	}
}
