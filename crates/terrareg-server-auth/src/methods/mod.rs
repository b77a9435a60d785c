// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication methods.
//!
//! Each method is a stateless factory turning an [`AuthRequest`] into an
//! [`AuthContext`]. The whole contract is the return value of
//! [`AuthMethod::authenticate`]:
//!
//! | Result | Meaning |
//! |---|---|
//! | `Ok(Some(ctx))` | credentials present and valid |
//! | `Ok(None)` | abstain: not this method's credentials |
//! | `Err(e)` | reject: credentials claimed for this method but invalid |
//!
//! Abstaining methods have no side effects. Methods never write state, so a
//! cancelled request leaves nothing behind.

mod analytics;
mod api_key;
mod internal_extraction;
mod session;
mod sessions;
mod terraform_oidc;

pub use analytics::{AnalyticsKey, TerraformAnalyticsAuthKey};
pub use api_key::{AdminApiKey, PublishApiKey, UploadApiKey};
pub use internal_extraction::TerraformInternalExtraction;
pub use sessions::{AdminSession, GitHubSession, OpenIdConnectSession, SamlSession};
pub use terraform_oidc::TerraformOidc;

use async_trait::async_trait;

use crate::context::AuthContext;
use crate::error::AuthError;
use crate::request::AuthRequest;
use crate::types::AuthMethodType;

#[async_trait]
pub trait AuthMethod: Send + Sync {
	fn method_type(&self) -> AuthMethodType;

	/// Derived from static configuration; disabled methods are skipped.
	fn is_enabled(&self) -> bool;

	async fn authenticate(&self, request: &AuthRequest) -> Result<Option<AuthContext>, AuthError>;
}
