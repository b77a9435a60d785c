// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ordered dispatch over the configured authentication methods.

use std::sync::Arc;

use tracing::{debug, error, instrument, warn, Span};

use crate::context::AuthContext;
use crate::error::AuthError;
use crate::methods::AuthMethod;
use crate::request::AuthRequest;
use crate::types::AuthMethodType;

/// Runs each enabled method in priority order and returns the first context
/// produced. Falls through to [`AuthContext::unauthenticated`] when every
/// method abstains.
pub struct AuthDispatcher {
	methods: Vec<Arc<dyn AuthMethod>>,
}

impl AuthDispatcher {
	/// Methods with equal priority keep their registration order.
	pub fn new(mut methods: Vec<Arc<dyn AuthMethod>>) -> Self {
		methods.sort_by_key(|m| m.method_type().priority());
		Self { methods }
	}

	pub fn enabled_methods(&self) -> Vec<AuthMethodType> {
		self.methods
			.iter()
			.filter(|m| m.is_enabled())
			.map(|m| m.method_type())
			.collect()
	}

	#[instrument(
		name = "authenticate",
		skip_all,
		fields(auth_method = tracing::field::Empty, username = tracing::field::Empty)
	)]
	pub async fn authenticate(&self, request: &AuthRequest) -> Result<AuthContext, AuthError> {
		for method in self.methods.iter().filter(|m| m.is_enabled()) {
			match method.authenticate(request).await {
				Ok(Some(context)) => {
					let span = Span::current();
					span.record("auth_method", context.provider_type().as_str());
					span.record("username", context.username());
					debug!("request authenticated");
					return Ok(context);
				}
				Ok(None) => continue,
				Err(e) if e.is_abstention() => {
					debug!(method = %method.method_type(), error = %e, "method abstained");
					continue;
				}
				Err(e) if e.is_internal() => {
					error!(method = %method.method_type(), error = %e, "authentication failed");
					return Err(e);
				}
				Err(e) => {
					warn!(method = %method.method_type(), reason = e.tag(), "credentials rejected");
					return Err(e);
				}
			}
		}

		Span::current().record("auth_method", AuthMethodType::NotAuthenticated.as_str());
		Ok(AuthContext::unauthenticated())
	}
}
