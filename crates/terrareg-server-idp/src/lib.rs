// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Embedded OpenID Connect identity provider used by `terraform login`.
//!
//! The registry acts as the IdP: an admin session authorizes the Terraform
//! CLI, which exchanges the code for an RS256 access token. Subjects are
//! pairwise per client so the token never carries the real user id.

pub mod client;
pub mod error;
pub mod jwt;
pub mod keys;
pub mod pkce;
pub mod provider;
pub mod store;

pub use client::{ClientRegistry, IdpClient};
pub use error::{IdpError, IdpResult};
pub use jwt::{AccessTokenClaims, IdTokenClaims};
pub use keys::{JsonWebKey, JsonWebKeySet, KeyManager, SigningKey};
pub use pkce::CodeChallengeMethod;
pub use provider::{
	AuthorizationRequest, DiscoveryDocument, MaintenanceReport, RevocationRequest, TerraformIdp,
	TokenRequest, TokenResponse, UserInfo, AUTHORIZATION_PATH, DISCOVERY_PATH, JWKS_PATH,
	REVOCATION_PATH, TOKEN_PATH, USERINFO_PATH,
};
pub use store::{
	AccessTokenRecord, AuthorizationCodeRecord, CleanupStats, IdpStore, InMemoryIdpStore,
};
