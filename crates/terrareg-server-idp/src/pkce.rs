// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Proof Key for Code Exchange (RFC 7636).

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const VERIFIER_MIN_LEN: usize = 43;
const VERIFIER_MAX_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
	#[serde(rename = "plain")]
	Plain,
	#[default]
	S256,
}

impl CodeChallengeMethod {
	pub fn as_str(&self) -> &'static str {
		match self {
			CodeChallengeMethod::Plain => "plain",
			CodeChallengeMethod::S256 => "S256",
		}
	}
}

impl fmt::Display for CodeChallengeMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for CodeChallengeMethod {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"plain" => Ok(CodeChallengeMethod::Plain),
			"S256" => Ok(CodeChallengeMethod::S256),
			other => Err(format!("unsupported code_challenge_method: {other}")),
		}
	}
}

fn is_unreserved(c: char) -> bool {
	c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// 43 to 128 unreserved characters.
pub fn is_valid_verifier(verifier: &str) -> bool {
	(VERIFIER_MIN_LEN..=VERIFIER_MAX_LEN).contains(&verifier.len()) && verifier.chars().all(is_unreserved)
}

pub fn challenge_for(verifier: &str, method: CodeChallengeMethod) -> String {
	match method {
		CodeChallengeMethod::Plain => verifier.to_string(),
		CodeChallengeMethod::S256 => BASE64URL.encode(Sha256::digest(verifier.as_bytes())),
	}
}

pub fn verify_code_verifier(challenge: &str, method: CodeChallengeMethod, verifier: &str) -> bool {
	if !is_valid_verifier(verifier) {
		return false;
	}
	let expected = challenge_for(verifier, method);
	expected.len() == challenge.len() && bool::from(expected.as_bytes().ct_eq(challenge.as_bytes()))
}
