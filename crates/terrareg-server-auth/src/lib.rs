// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authentication and authorization core for the Terrareg server.
//!
//! Requests are wrapped in an [`AuthRequest`] and passed to the
//! [`AuthDispatcher`], which walks the configured [`AuthMethod`]s in priority
//! order and yields an immutable [`AuthContext`]. Handlers consult the
//! context's permission predicates; they never look at raw credentials.

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod group;
pub mod methods;
pub mod oidc;
pub mod request;
pub mod session;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use context::{AuthContext, AuthContextBuilder, NamespaceMatch};
pub use dispatcher::AuthDispatcher;
pub use error::AuthError;
pub use group::{
	is_site_admin, resolve_namespace_permissions, NamespaceGrant, NamespacePermission, UserGroup,
};
pub use methods::AuthMethod;
pub use oidc::JwksOpenIdConnectValidator;
pub use request::{AuthRequest, BearerCredential};
pub use session::{generate_session_token, Session, SessionPayload};
pub use store::{
	OpenIdConnectIdentity, OpenIdConnectValidator, SessionLookup, StoreError, TerraformIdentity,
	TerraformTokenVerifier, UserGroupLookup,
};
pub use types::{AuthMethodType, NamespaceType, PermissionType};
