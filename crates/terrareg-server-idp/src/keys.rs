// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! RSA signing key management.
//!
//! The newest key signs; every retained key verifies. The published JWKS
//! is cached and dropped whenever the key ring changes. Key generation runs
//! outside the lock.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::RngCore;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use crate::error::{IdpError, IdpResult};
use crate::provider::ACCESS_TOKEN_TTL_SECS;

pub const KEY_BITS: usize = 2048;

/// Prefix of generated key ids: `terrareg-{unix_seconds}-{random}`.
const GENERATED_KID_PREFIX: &str = "terrareg-";

/// JSON Web Key Set for public key distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
	pub keys: Vec<JsonWebKey>,
}

/// Public half of an RSA signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
	pub kty: String,
	#[serde(rename = "use")]
	pub key_use: String,
	pub alg: String,
	pub kid: String,
	pub n: String,
	pub e: String,
}

pub struct SigningKey {
	kid: String,
	created_at: DateTime<Utc>,
	encoding: EncodingKey,
	decoding: DecodingKey,
	jwk: JsonWebKey,
}

impl SigningKey {
	fn from_private_key(
		private: &RsaPrivateKey,
		kid: String,
		created_at: DateTime<Utc>,
	) -> IdpResult<Self> {
		let der = private
			.to_pkcs1_der()
			.map_err(|e| IdpError::Key(format!("encoding private key: {e}")))?;
		let encoding = EncodingKey::from_rsa_der(der.as_bytes());

		let n = BASE64URL.encode(private.n().to_bytes_be());
		let e = BASE64URL.encode(private.e().to_bytes_be());
		let decoding = DecodingKey::from_rsa_components(&n, &e)
			.map_err(|e| IdpError::Key(format!("building verification key: {e}")))?;

		Ok(Self {
			jwk: JsonWebKey {
				kty: "RSA".to_string(),
				key_use: "sig".to_string(),
				alg: "RS256".to_string(),
				kid: kid.clone(),
				n,
				e,
			},
			kid,
			created_at,
			encoding,
			decoding,
		})
	}

	fn generate(now: DateTime<Utc>) -> IdpResult<Self> {
		let private = RsaPrivateKey::new(&mut rand::thread_rng(), KEY_BITS)
			.map_err(|e| IdpError::Key(format!("generating key: {e}")))?;
		let mut suffix = [0u8; 4];
		rand::thread_rng().fill_bytes(&mut suffix);
		let kid = format!(
			"{GENERATED_KID_PREFIX}{}-{}",
			now.timestamp(),
			hex::encode(suffix)
		);
		Self::from_private_key(&private, kid, now)
	}

	/// Accepts PKCS#8 or PKCS#1 PEM. The kid is derived from the modulus so
	/// that restarts with the same file publish the same kid.
	fn from_pem(pem: &str, now: DateTime<Utc>) -> IdpResult<Self> {
		let pem = pem.trim();
		let private = match RsaPrivateKey::from_pkcs8_pem(pem) {
			Ok(private) => private,
			Err(pkcs8) => RsaPrivateKey::from_pkcs1_pem(pem)
				.map_err(|_| IdpError::Key(format!("parsing PEM: {pkcs8}")))?,
		};
		let digest = Sha256::digest(private.n().to_bytes_be());
		let kid = format!("file-{}", hex::encode(&digest[..8]));
		Self::from_private_key(&private, kid, now)
	}

	pub fn kid(&self) -> &str {
		&self.kid
	}

	pub fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	pub fn encoding_key(&self) -> &EncodingKey {
		&self.encoding
	}

	pub fn decoding_key(&self) -> &DecodingKey {
		&self.decoding
	}

	pub fn jwk(&self) -> &JsonWebKey {
		&self.jwk
	}
}

impl std::fmt::Debug for SigningKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SigningKey")
			.field("kid", &self.kid)
			.field("created_at", &self.created_at)
			.field("private_key", &"[REDACTED]")
			.finish()
	}
}

/// Creation time encoded in a generated kid, if any.
pub fn kid_timestamp(kid: &str) -> Option<DateTime<Utc>> {
	let rest = kid.strip_prefix(GENERATED_KID_PREFIX)?;
	let (seconds, _) = rest.split_once('-')?;
	Utc.timestamp_opt(seconds.parse().ok()?, 0).single()
}

#[derive(Debug)]
struct RetiredKey {
	key: Arc<SigningKey>,
	retired_at: DateTime<Utc>,
}

#[derive(Debug)]
struct KeyRing {
	active: Arc<SigningKey>,
	/// Retired keys kept for verification, oldest first.
	previous: Vec<RetiredKey>,
	jwks_cache: Option<Arc<JsonWebKeySet>>,
}

impl KeyRing {
	fn all(&self) -> impl Iterator<Item = &Arc<SigningKey>> {
		self.previous
			.iter()
			.map(|r| &r.key)
			.chain(std::iter::once(&self.active))
	}
}

#[derive(Debug)]
pub struct KeyManager {
	ring: RwLock<KeyRing>,
}

impl KeyManager {
	/// Load the key at `path`, or generate one when no path is configured.
	#[instrument(skip_all, fields(path = ?path))]
	pub fn init(path: Option<&Path>) -> IdpResult<Self> {
		let manager = match path {
			Some(path) => {
				let pem = std::fs::read_to_string(path)
					.map_err(|e| IdpError::Key(format!("reading {}: {e}", path.display())))?;
				Self::from_pem(&pem)?
			}
			None => Self::generate()?,
		};
		info!(
			kid = %manager.signing_key().kid(),
			generated = path.is_none(),
			"Terraform IdP signing key ready"
		);
		Ok(manager)
	}

	pub fn from_pem(pem: &str) -> IdpResult<Self> {
		Ok(Self::with_key(SigningKey::from_pem(pem, Utc::now())?))
	}

	pub fn generate() -> IdpResult<Self> {
		Ok(Self::with_key(SigningKey::generate(Utc::now())?))
	}

	fn with_key(key: SigningKey) -> Self {
		Self {
			ring: RwLock::new(KeyRing {
				active: Arc::new(key),
				previous: Vec::new(),
				jwks_cache: None,
			}),
		}
	}

	fn read(&self) -> RwLockReadGuard<'_, KeyRing> {
		self.ring.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write(&self) -> RwLockWriteGuard<'_, KeyRing> {
		self.ring.write().unwrap_or_else(PoisonError::into_inner)
	}

	/// The newest key.
	pub fn signing_key(&self) -> Arc<SigningKey> {
		self.read().active.clone()
	}

	pub fn verification_key(&self, kid: &str) -> Option<Arc<SigningKey>> {
		self.read().all().find(|k| k.kid == kid).cloned()
	}

	pub fn key_ids(&self) -> Vec<String> {
		self.read().all().map(|k| k.kid.clone()).collect()
	}

	pub fn jwks(&self) -> Arc<JsonWebKeySet> {
		if let Some(cached) = self.read().jwks_cache.clone() {
			return cached;
		}

		let mut ring = self.write();
		if let Some(cached) = ring.jwks_cache.clone() {
			return cached;
		}
		let jwks = Arc::new(JsonWebKeySet {
			keys: ring.all().map(|k| k.jwk.clone()).collect(),
		});
		ring.jwks_cache = Some(jwks.clone());
		jwks
	}

	/// Generate a key and make it the signing key.
	pub fn rotate(&self) -> IdpResult<String> {
		self.rotate_at(Utc::now())
	}

	fn rotate_at(&self, now: DateTime<Utc>) -> IdpResult<String> {
		let key = Arc::new(SigningKey::generate(now)?);
		let kid = key.kid.clone();

		{
			let mut ring = self.write();
			let retired = std::mem::replace(&mut ring.active, key);
			ring.previous.push(RetiredKey {
				key: retired,
				retired_at: now,
			});
			ring.jwks_cache = None;
		}

		info!(%kid, "rotated Terraform IdP signing key");
		Ok(kid)
	}

	/// Evict keys retired more than `max_age` ago. A retired key is kept at
	/// least as long as the tokens it signed stay valid. The signing key is
	/// never evicted. Returns the number of evicted keys.
	pub fn cleanup(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
		let grace = max_age.max(Duration::seconds(ACCESS_TOKEN_TTL_SECS));
		let cutoff = now - grace;
		let mut ring = self.write();

		let before = ring.previous.len();
		ring.previous.retain(|r| {
			let keep = r.retired_at >= cutoff;
			if !keep {
				debug!(
					kid = %r.key.kid,
					created_at = %kid_timestamp(&r.key.kid).unwrap_or(r.key.created_at),
					retired_at = %r.retired_at,
					"evicting retired signing key"
				);
			}
			keep
		});
		let evicted = before - ring.previous.len();
		if evicted > 0 {
			ring.jwks_cache = None;
			info!(evicted, "evicted expired Terraform IdP signing keys");
		}
		evicted
	}
}
