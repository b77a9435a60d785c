// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use terrareg_server_idp::TerraformIdp;
use tracing::instrument;

use super::{Job, JobContext, JobError, JobOutput};

/// Purges expired authorization codes, access tokens and subjects, and
/// evicts retired signing keys past their maximum age.
pub struct IdpCleanupJob {
	idp: Arc<TerraformIdp>,
}

impl IdpCleanupJob {
	pub fn new(idp: Arc<TerraformIdp>) -> Self {
		Self { idp }
	}
}

#[async_trait]
impl Job for IdpCleanupJob {
	fn id(&self) -> &str {
		"terraform-idp-cleanup"
	}

	fn name(&self) -> &str {
		"Terraform IdP Cleanup"
	}

	fn description(&self) -> &str {
		"Delete expired Terraform IdP grants and evict aged signing keys"
	}

	#[instrument(skip(self, ctx), fields(job_id = "terraform-idp-cleanup"))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let report = self
			.idp
			.cleanup(Utc::now())
			.await
			.map_err(JobError::retryable)?;

		tracing::info!(
			authorization_codes = report.storage.authorization_codes,
			access_tokens = report.storage.access_tokens,
			subjects = report.storage.subjects,
			evicted_keys = report.evicted_keys,
			"Terraform IdP cleanup completed"
		);

		Ok(JobOutput {
			message: format!(
				"Deleted {} expired IdP records, evicted {} keys",
				report.storage.total(),
				report.evicted_keys
			),
			metadata: Some(serde_json::json!({
				"authorization_codes_deleted": report.storage.authorization_codes,
				"access_tokens_deleted": report.storage.access_tokens,
				"subjects_deleted": report.storage.subjects,
				"evicted_keys": report.evicted_keys,
			})),
		})
	}
}

pub struct KeyRotationJob {
	idp: Arc<TerraformIdp>,
}

impl KeyRotationJob {
	pub fn new(idp: Arc<TerraformIdp>) -> Self {
		Self { idp }
	}
}

#[async_trait]
impl Job for KeyRotationJob {
	fn id(&self) -> &str {
		"terraform-idp-key-rotation"
	}

	fn name(&self) -> &str {
		"Terraform IdP Key Rotation"
	}

	fn description(&self) -> &str {
		"Generate a new Terraform IdP signing key"
	}

	#[instrument(skip(self, ctx), fields(job_id = "terraform-idp-key-rotation"))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let kid = self
			.idp
			.rotate_keys()
			.await
			.map_err(|e| JobError::Failed {
				message: e.to_string(),
				retryable: false,
			})?;

		Ok(JobOutput {
			message: format!("Signing key rotated to {kid}"),
			metadata: Some(serde_json::json!({ "kid": kid })),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use terrareg_server_config::TerraformOidcConfig;
	use terrareg_server_idp::{InMemoryIdpStore, KeyManager};
	use tokio_util::sync::CancellationToken;

	const TEST_KEY: &str = include_str!(concat!(
		env!("CARGO_MANIFEST_DIR"),
		"/../../testdata/rsa_signing_key.pem"
	));

	fn idp() -> Arc<TerraformIdp> {
		let config = TerraformOidcConfig {
			enabled: true,
			issuer: "https://registry.example.com".to_string(),
			signing_key_path: None,
			client_id: "terraform-cli".to_string(),
			client_secret: None,
			redirect_uris: vec!["http://localhost/login".to_string()],
			key_max_age_secs: 3600,
			key_rotation_interval_secs: None,
			cleanup_interval_secs: 900,
		};
		let keys = KeyManager::from_pem(TEST_KEY).unwrap();
		Arc::new(
			TerraformIdp::new(&config, Arc::new(keys), Arc::new(InMemoryIdpStore::default()))
				.unwrap(),
		)
	}

	fn ctx() -> JobContext {
		JobContext {
			cancellation_token: CancellationToken::new(),
		}
	}

	#[tokio::test]
	async fn cleanup_reports_counts() {
		let job = IdpCleanupJob::new(idp());
		let output = job.run(&ctx()).await.unwrap();
		let metadata = output.metadata.unwrap();
		assert_eq!(metadata["authorization_codes_deleted"], 0);
		assert_eq!(metadata["evicted_keys"], 0);
	}

	#[tokio::test]
	async fn rotation_replaces_the_signing_key() {
		let idp = idp();
		let before = idp.keys().signing_key().kid().to_string();

		let output = KeyRotationJob::new(idp.clone()).run(&ctx()).await.unwrap();

		let after = idp.keys().signing_key().kid().to_string();
		assert_ne!(before, after);
		assert_eq!(output.metadata.unwrap()["kid"], after);
		assert_eq!(idp.jwks().keys.len(), 2);
	}

	#[tokio::test]
	async fn cleanup_after_rotation_keeps_previous_key() {
		let idp = idp();
		let before = idp.keys().signing_key().kid().to_string();
		KeyRotationJob::new(idp.clone()).run(&ctx()).await.unwrap();

		let output = IdpCleanupJob::new(idp.clone()).run(&ctx()).await.unwrap();

		assert_eq!(output.metadata.unwrap()["evicted_keys"], 0);
		assert!(idp.keys().verification_key(&before).is_some());
	}
}
