// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic background jobs.
//!
//! Jobs are registered with a [`JobScheduler`] and run on their own tokio
//! task. Shutdown cancels a shared [`CancellationToken`]; a job in flight
//! sees the cancellation through its [`JobContext`].

mod idp_maintenance;
mod session_cleanup;

pub use idp_maintenance::{IdpCleanupJob, KeyRotationJob};
pub use session_cleanup::SessionCleanupJob;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

const BASE_RETRY_DELAY_SECS: u64 = 1;
const MAX_RETRY_DELAY_SECS: u64 = 60;
const MAX_RETRIES: u32 = 3;

pub struct JobContext {
	pub cancellation_token: CancellationToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobOutput {
	pub message: String,
	pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
	#[error("job failed: {message}")]
	Failed { message: String, retryable: bool },

	#[error("job cancelled")]
	Cancelled,

	#[error("job not found: {0}")]
	NotFound(String),
}

impl JobError {
	pub fn retryable(error: impl std::fmt::Display) -> Self {
		JobError::Failed {
			message: error.to_string(),
			retryable: true,
		}
	}
}

#[async_trait]
pub trait Job: Send + Sync {
	fn id(&self) -> &str;
	fn name(&self) -> &str;
	fn description(&self) -> &str;
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError>;
}

struct RegisteredJob {
	job: Arc<dyn Job>,
	interval: Duration,
}

pub struct JobScheduler {
	jobs: HashMap<String, RegisteredJob>,
	shutdown: CancellationToken,
	handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for JobScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl JobScheduler {
	pub fn new() -> Self {
		Self {
			jobs: HashMap::new(),
			shutdown: CancellationToken::new(),
			handles: Mutex::new(Vec::new()),
		}
	}

	pub fn register_periodic(&mut self, job: Arc<dyn Job>, interval: Duration) {
		let id = job.id().to_string();
		self.jobs.insert(id, RegisteredJob { job, interval });
	}

	pub fn job_ids(&self) -> Vec<String> {
		self.jobs.keys().cloned().collect()
	}

	/// Spawn one loop per registered job. The first run happens after one
	/// interval has elapsed.
	#[instrument(skip(self))]
	pub async fn start(&self) {
		let mut handles = self.handles.lock().await;

		for (job_id, registered) in &self.jobs {
			let job = Arc::clone(&registered.job);
			let interval = registered.interval;
			let shutdown = self.shutdown.clone();
			let job_id = job_id.clone();

			let handle = tokio::spawn(async move {
				loop {
					tokio::select! {
						_ = tokio::time::sleep(interval) => {
							let _ = run_job_with_retry(&job, &shutdown).await;
						}
						_ = shutdown.cancelled() => {
							info!(job_id = %job_id, "Shutting down periodic job");
							break;
						}
					}
				}
			});
			handles.push(handle);
		}

		info!(job_count = handles.len(), "Job scheduler started");
	}

	/// Run a job now, outside its schedule.
	#[instrument(skip(self))]
	pub async fn trigger_job(&self, job_id: &str) -> Result<JobOutput, JobError> {
		let registered = self
			.jobs
			.get(job_id)
			.ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
		run_job_with_retry(&registered.job, &self.shutdown).await
	}

	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		self.shutdown.cancel();

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("Job scheduler shut down");
	}
}

fn backoff_delay(retry_count: u32) -> Duration {
	let secs = BASE_RETRY_DELAY_SECS.saturating_mul(1u64 << retry_count.min(16));
	Duration::from_secs(secs.min(MAX_RETRY_DELAY_SECS))
}

async fn run_job_with_retry(
	job: &Arc<dyn Job>,
	shutdown: &CancellationToken,
) -> Result<JobOutput, JobError> {
	let ctx = JobContext {
		cancellation_token: shutdown.clone(),
	};
	let mut retry_count = 0u32;

	loop {
		match job.run(&ctx).await {
			Ok(output) => {
				info!(job_id = %job.id(), message = %output.message, "Job completed successfully");
				return Ok(output);
			}
			Err(JobError::Failed { message, retryable }) if retryable && retry_count < MAX_RETRIES => {
				retry_count += 1;
				let delay = backoff_delay(retry_count);
				warn!(
					job_id = %job.id(),
					retry_count,
					delay_secs = delay.as_secs(),
					error = %message,
					"Job failed, retrying"
				);
				tokio::select! {
					_ = tokio::time::sleep(delay) => {}
					_ = shutdown.cancelled() => return Err(JobError::Cancelled),
				}
			}
			Err(JobError::Cancelled) => {
				info!(job_id = %job.id(), "Job cancelled");
				return Err(JobError::Cancelled);
			}
			Err(e) => {
				error!(job_id = %job.id(), error = %e, "Job failed");
				return Err(e);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	struct Flaky {
		failures: u32,
		calls: AtomicU32,
	}

	#[async_trait]
	impl Job for Flaky {
		fn id(&self) -> &str {
			"flaky"
		}

		fn name(&self) -> &str {
			"Flaky"
		}

		fn description(&self) -> &str {
			"Fails a fixed number of times"
		}

		async fn run(&self, _ctx: &JobContext) -> Result<JobOutput, JobError> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst);
			if call < self.failures {
				return Err(JobError::retryable("transient"));
			}
			Ok(JobOutput {
				message: format!("succeeded after {call} failures"),
				metadata: None,
			})
		}
	}

	fn flaky(failures: u32) -> Arc<Flaky> {
		Arc::new(Flaky {
			failures,
			calls: AtomicU32::new(0),
		})
	}

	mod backoff {
		use super::*;

		#[test]
		fn doubles_and_caps() {
			assert_eq!(backoff_delay(1), Duration::from_secs(2));
			assert_eq!(backoff_delay(2), Duration::from_secs(4));
			assert_eq!(backoff_delay(10), Duration::from_secs(MAX_RETRY_DELAY_SECS));
			assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(MAX_RETRY_DELAY_SECS));
		}
	}

	mod scheduler {
		use super::*;

		#[tokio::test(start_paused = true)]
		async fn trigger_retries_transient_failures() {
			let job = flaky(2);
			let mut scheduler = JobScheduler::new();
			scheduler.register_periodic(job.clone(), Duration::from_secs(3600));

			let output = scheduler.trigger_job("flaky").await.unwrap();
			assert_eq!(output.message, "succeeded after 2 failures");
			assert_eq!(job.calls.load(Ordering::SeqCst), 3);
		}

		#[tokio::test(start_paused = true)]
		async fn gives_up_after_max_retries() {
			let job = flaky(u32::MAX);
			let mut scheduler = JobScheduler::new();
			scheduler.register_periodic(job.clone(), Duration::from_secs(3600));

			let err = scheduler.trigger_job("flaky").await.unwrap_err();
			assert!(matches!(err, JobError::Failed { .. }));
			assert_eq!(job.calls.load(Ordering::SeqCst), MAX_RETRIES + 1);
		}

		#[tokio::test]
		async fn unknown_job_is_not_found() {
			let scheduler = JobScheduler::new();
			let err = scheduler.trigger_job("missing").await.unwrap_err();
			assert!(matches!(err, JobError::NotFound(id) if id == "missing"));
		}

		#[tokio::test(start_paused = true)]
		async fn periodic_jobs_run_until_shutdown() {
			let job = flaky(0);
			let mut scheduler = JobScheduler::new();
			scheduler.register_periodic(job.clone(), Duration::from_secs(60));
			scheduler.start().await;

			tokio::time::sleep(Duration::from_secs(150)).await;
			scheduler.shutdown().await;

			assert_eq!(job.calls.load(Ordering::SeqCst), 2);
			assert_eq!(scheduler.job_ids(), vec!["flaky".to_string()]);
		}
	}
}
