// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! RS256 JWTs issued by the Terraform identity provider.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use terrareg_server_auth::{AuthError, AuthMethodType};

use crate::error::{IdpError, IdpResult};
use crate::keys::KeyManager;

const METHOD: AuthMethodType = AuthMethodType::TerraformOidc;

/// Claims every token carries and [`verify`] checks.
pub trait RegisteredClaims {
	fn issuer(&self) -> &str;
	fn expires_at(&self) -> i64;
	fn issued_at(&self) -> i64;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	pub iss: String,
	/// Pairwise subject for this client.
	pub sub: String,
	pub aud: String,
	pub exp: i64,
	pub iat: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub nonce: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub terraform_workspace_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub terraform_run_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
	pub iss: String,
	pub sub: String,
	pub aud: String,
	pub exp: i64,
	pub iat: i64,
	pub jti: String,
	pub client_id: String,
	pub scope: String,
}

macro_rules! registered_claims {
	($ty:ty) => {
		impl RegisteredClaims for $ty {
			fn issuer(&self) -> &str {
				&self.iss
			}

			fn expires_at(&self) -> i64 {
				self.exp
			}

			fn issued_at(&self) -> i64 {
				self.iat
			}
		}
	};
}

registered_claims!(IdTokenClaims);
registered_claims!(AccessTokenClaims);

/// Sign `claims` with the current signing key.
pub fn sign<C: Serialize>(keys: &KeyManager, claims: &C) -> IdpResult<String> {
	let key = keys.signing_key();
	let mut header = Header::new(Algorithm::RS256);
	header.typ = Some("JWT".to_string());
	header.kid = Some(key.kid().to_string());

	encode(&header, claims, key.encoding_key()).map_err(|e| IdpError::Signing(e.to_string()))
}

/// Verify signature, issuer and lifetime.
///
/// The `kid` selects any retained key, so tokens signed before a rotation
/// stay valid until their own expiry.
pub fn verify<C>(keys: &KeyManager, token: &str, issuer: &str, now: i64) -> Result<C, AuthError>
where
	C: DeserializeOwned + RegisteredClaims,
{
	let header = decode_header(token).map_err(|e| map_jwt_error(e.kind()))?;
	if header.alg != Algorithm::RS256 {
		return Err(AuthError::malformed(METHOD, "unsupported signing algorithm"));
	}
	let kid = header
		.kid
		.ok_or_else(|| AuthError::malformed(METHOD, "token has no key id"))?;
	let key = keys
		.verification_key(&kid)
		.ok_or(AuthError::SignatureInvalid { method: METHOD })?;

	// Time and issuer checks below use the caller's clock.
	let mut validation = Validation::new(Algorithm::RS256);
	validation.validate_exp = false;
	validation.validate_aud = false;
	validation.required_spec_claims.clear();

	let claims = decode::<C>(token, key.decoding_key(), &validation)
		.map_err(|e| map_jwt_error(e.kind()))?
		.claims;

	if claims.issuer() != issuer {
		return Err(AuthError::claims(METHOD, "issuer mismatch"));
	}
	if now >= claims.expires_at() {
		return Err(AuthError::ExpiredCredential { method: METHOD });
	}
	if now < claims.issued_at() {
		return Err(AuthError::claims(METHOD, "token issued in the future"));
	}

	Ok(claims)
}

fn map_jwt_error(kind: &ErrorKind) -> AuthError {
	match kind {
		ErrorKind::InvalidSignature => AuthError::SignatureInvalid { method: METHOD },
		ErrorKind::ExpiredSignature => AuthError::ExpiredCredential { method: METHOD },
		other => AuthError::malformed(METHOD, format!("{other:?}")),
	}
}

/// The signature segment, used as the storage key for access tokens.
pub fn token_signature(token: &str) -> Option<&str> {
	let mut parts = token.split('.');
	match (parts.next(), parts.next(), parts.next(), parts.next()) {
		(Some(_), Some(_), Some(signature), None) if !signature.is_empty() => Some(signature),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::keys::test_keys::manager;
	use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
	use proptest::prelude::*;

	const ISSUER: &str = "https://registry.example.com";

	fn claims(iat: i64, exp: i64) -> IdTokenClaims {
		IdTokenClaims {
			iss: ISSUER.to_string(),
			sub: "pairwise-1".to_string(),
			aud: "terraform-cli".to_string(),
			exp,
			iat,
			nonce: Some("n-1".to_string()),
			name: Some("Admin".to_string()),
			email: None,
			terraform_workspace_id: None,
			terraform_run_id: None,
		}
	}

	mod sign_and_verify {
		use super::*;

		#[test]
		fn header_carries_kid_and_typ() {
			let keys = manager();
			let token = sign(&keys, &claims(100, 200)).unwrap();
			let header = decode_header(&token).unwrap();
			assert_eq!(header.alg, Algorithm::RS256);
			assert_eq!(header.typ.as_deref(), Some("JWT"));
			assert_eq!(header.kid.as_deref(), Some(keys.signing_key().kid()));
		}

		#[test]
		fn verifies_within_lifetime() {
			let keys = manager();
			let original = claims(100, 200);
			let token = sign(&keys, &original).unwrap();
			let verified: IdTokenClaims = verify(&keys, &token, ISSUER, 150).unwrap();
			assert_eq!(verified, original);
		}

		#[test]
		fn expiry_is_exclusive() {
			let keys = manager();
			let token = sign(&keys, &claims(100, 200)).unwrap();
			let err = verify::<IdTokenClaims>(&keys, &token, ISSUER, 200).unwrap_err();
			assert_eq!(err.tag(), "expired_credential");
		}

		#[test]
		fn issued_in_future_rejected() {
			let keys = manager();
			let token = sign(&keys, &claims(100, 200)).unwrap();
			let err = verify::<IdTokenClaims>(&keys, &token, ISSUER, 99).unwrap_err();
			assert_eq!(err.tag(), "issuer_audience_mismatch");
		}

		#[test]
		fn wrong_issuer_rejected() {
			let keys = manager();
			let token = sign(&keys, &claims(100, 200)).unwrap();
			let err =
				verify::<IdTokenClaims>(&keys, &token, "https://other.example", 150).unwrap_err();
			assert_eq!(err.tag(), "issuer_audience_mismatch");
		}

		#[test]
		fn tampered_claims_rejected() {
			let keys = manager();
			let token = sign(&keys, &claims(100, 200)).unwrap();
			let mut forged = claims(100, 200);
			forged.sub = "someone-else".to_string();
			let forged_b64 = BASE64URL.encode(serde_json::to_vec(&forged).unwrap());

			let parts: Vec<&str> = token.split('.').collect();
			let tampered = format!("{}.{}.{}", parts[0], forged_b64, parts[2]);
			let err = verify::<IdTokenClaims>(&keys, &tampered, ISSUER, 150).unwrap_err();
			assert_eq!(err.tag(), "signature_invalid");
		}

		#[test]
		fn unknown_kid_rejected() {
			let keys = manager();
			let other = KeyManager::generate().unwrap();
			let token = sign(&other, &claims(100, 200)).unwrap();
			let err = verify::<IdTokenClaims>(&keys, &token, ISSUER, 150).unwrap_err();
			assert_eq!(err.tag(), "signature_invalid");
		}

		#[test]
		fn garbage_is_malformed() {
			let keys = manager();
			let err = verify::<IdTokenClaims>(&keys, "a.b.c", ISSUER, 150).unwrap_err();
			assert_eq!(err.tag(), "malformed_credential");
		}

		#[test]
		fn tokens_survive_rotation() {
			let keys = manager();
			let token = sign(&keys, &claims(100, 200)).unwrap();
			keys.rotate().unwrap();
			assert!(verify::<IdTokenClaims>(&keys, &token, ISSUER, 150).is_ok());
			let fresh = sign(&keys, &claims(100, 200)).unwrap();
			assert_ne!(
				decode_header(&fresh).unwrap().kid,
				decode_header(&token).unwrap().kid
			);
		}
	}

	mod signature_segment {
		use super::*;

		#[test]
		fn extracts_third_segment() {
			assert_eq!(token_signature("a.b.c"), Some("c"));
			assert_eq!(token_signature("a.b"), None);
			assert_eq!(token_signature("a.b."), None);
			assert_eq!(token_signature("a.b.c.d"), None);
		}
	}

	proptest! {
		#![proptest_config(ProptestConfig::with_cases(32))]

		#[test]
		fn verification_honours_window(iat in 0i64..1_000, ttl in 1i64..1_000, offset in -10i64..2_010) {
			let keys = manager();
			let exp = iat + ttl;
			let token = sign(&keys, &claims(iat, exp)).unwrap();
			let now = iat + offset;
			let ok = verify::<IdTokenClaims>(&keys, &token, ISSUER, now).is_ok();
			prop_assert_eq!(ok, now >= iat && now < exp);
		}
	}
}
