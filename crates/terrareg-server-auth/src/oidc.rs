// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ID token validation against an external OpenID Connect provider.
//!
//! The provider's signing keys are fetched once through discovery and held
//! in memory. Only RS256 is accepted.

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::AuthError;
use crate::store::{OpenIdConnectIdentity, OpenIdConnectValidator};
use crate::types::AuthMethodType;

const METHOD: AuthMethodType = AuthMethodType::OpenIDConnectSession;

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
	issuer: String,
	jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
	sub: String,
	#[serde(default)]
	preferred_username: Option<String>,
	#[serde(default)]
	name: Option<String>,
	#[serde(default)]
	email: Option<String>,
	#[serde(default)]
	groups: Vec<String>,
}

pub struct JwksOpenIdConnectValidator {
	issuer: String,
	client_id: String,
	jwks: JwkSet,
}

impl JwksOpenIdConnectValidator {
	pub fn new(issuer: impl Into<String>, client_id: impl Into<String>, jwks: JwkSet) -> Self {
		Self {
			issuer: issuer.into(),
			client_id: client_id.into(),
			jwks,
		}
	}

	/// Fetch `{issuer}/.well-known/openid-configuration` and the key set it
	/// points at.
	#[instrument(skip(client, client_id))]
	pub async fn discover(
		client: &reqwest::Client,
		issuer: &str,
		client_id: &str,
	) -> Result<Self, AuthError> {
		let discovery_url = format!(
			"{}/.well-known/openid-configuration",
			issuer.trim_end_matches('/')
		);
		let document: DiscoveryDocument = client
			.get(&discovery_url)
			.send()
			.await
			.and_then(|r| r.error_for_status())
			.map_err(|e| AuthError::internal(METHOD, e))?
			.json()
			.await
			.map_err(|e| AuthError::internal(METHOD, e))?;

		let jwks: JwkSet = client
			.get(&document.jwks_uri)
			.send()
			.await
			.and_then(|r| r.error_for_status())
			.map_err(|e| AuthError::internal(METHOD, e))?
			.json()
			.await
			.map_err(|e| AuthError::internal(METHOD, e))?;

		info!(
			issuer = %document.issuer,
			keys = jwks.keys.len(),
			"loaded OpenID Connect signing keys"
		);
		Ok(Self::new(document.issuer, client_id, jwks))
	}

	fn validate(&self, id_token: &str) -> Result<IdTokenClaims, AuthError> {
		let header = decode_header(id_token).map_err(|e| map_jwt_error(e.kind()))?;
		if header.alg != Algorithm::RS256 {
			return Err(AuthError::malformed(METHOD, "unsupported signing algorithm"));
		}
		let kid = header
			.kid
			.ok_or_else(|| AuthError::malformed(METHOD, "token has no key id"))?;
		let jwk = self
			.jwks
			.find(&kid)
			.ok_or(AuthError::SignatureInvalid { method: METHOD })?;
		let key = DecodingKey::from_jwk(jwk).map_err(|e| AuthError::internal(METHOD, e))?;

		let mut validation = Validation::new(Algorithm::RS256);
		validation.set_issuer(&[&self.issuer]);
		validation.set_audience(&[&self.client_id]);
		validation.leeway = 0;

		decode::<IdTokenClaims>(id_token, &key, &validation)
			.map(|data| data.claims)
			.map_err(|e| map_jwt_error(e.kind()))
	}
}

fn map_jwt_error(kind: &ErrorKind) -> AuthError {
	match kind {
		ErrorKind::ExpiredSignature => AuthError::ExpiredCredential { method: METHOD },
		ErrorKind::InvalidSignature => AuthError::SignatureInvalid { method: METHOD },
		ErrorKind::InvalidIssuer => AuthError::claims(METHOD, "issuer mismatch"),
		ErrorKind::InvalidAudience => AuthError::claims(METHOD, "audience mismatch"),
		ErrorKind::ImmatureSignature => AuthError::claims(METHOD, "token not yet valid"),
		other => AuthError::malformed(METHOD, format!("{other:?}")),
	}
}

#[async_trait]
impl OpenIdConnectValidator for JwksOpenIdConnectValidator {
	async fn validate_id_token(&self, id_token: &str) -> Result<OpenIdConnectIdentity, AuthError> {
		let claims = self.validate(id_token)?;
		debug!(sub = %claims.sub, "validated OpenID Connect ID token");

		let username = claims
			.preferred_username
			.or(claims.name)
			.unwrap_or_else(|| claims.sub.clone());

		Ok(OpenIdConnectIdentity {
			subject: claims.sub,
			username,
			email: claims.email,
			groups: claims.groups,
		})
	}
}
