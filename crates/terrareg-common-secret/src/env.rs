// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loading secrets from the environment with the `VAR` / `VAR_FILE`
//! convention used by Docker and Kubernetes secret mounts.

use std::path::PathBuf;
use std::{env, fs};

use thiserror::Error;

use crate::{Secret, SecretString};

#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

/// Load a secret from `{var}_FILE` (preferred) or `{var}`.
///
/// A single trailing newline is stripped from file contents. Returns
/// `Ok(None)` when neither variable is set.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	let file_var = format!("{var}_FILE");

	if let Ok(path_str) = env::var(&file_var) {
		if path_str.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}

		let path = PathBuf::from(&path_str);
		let content = fs::read_to_string(&path).map_err(|e| SecretEnvError::Io {
			path: path.clone(),
			source: e,
		})?;

		let secret = content.strip_suffix('\n').unwrap_or(&content).to_string();
		tracing::debug!(var = %file_var, "loaded secret from file");
		return Ok(Some(Secret::new(secret)));
	}

	if let Ok(value) = env::var(var) {
		return Ok(Some(Secret::new(value)));
	}

	Ok(None)
}

/// Load a comma separated list of secrets, e.g. `TERRAREG_UPLOAD_API_KEYS`.
///
/// Entries are trimmed and blank entries dropped. Returns `Ok(None)` when the
/// variable is unset so that lower-precedence layers can still apply.
pub fn load_secret_list_env(var: &str) -> Result<Option<Vec<SecretString>>, SecretEnvError> {
	let Some(raw) = load_secret_env(var)? else {
		return Ok(None);
	};

	let keys = raw
		.expose()
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(|s| Secret::new(s.to_string()))
		.collect();

	Ok(Some(keys))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use tempfile::NamedTempFile;

	mod load_secret_env_tests {
		use super::*;

		#[test]
		fn returns_none_when_not_set() {
			let var = "TERRAREG_TEST_SECRET_UNSET_9081";
			env::remove_var(var);
			env::remove_var(format!("{var}_FILE"));

			assert!(load_secret_env(var).unwrap().is_none());
		}

		#[test]
		fn reads_direct_value() {
			let var = "TERRAREG_TEST_SECRET_DIRECT_9082";
			env::remove_var(format!("{var}_FILE"));
			env::set_var(var, "ADMIN-TOK");

			let secret = load_secret_env(var).unwrap().unwrap();
			assert_eq!(secret.expose(), "ADMIN-TOK");

			env::remove_var(var);
		}

		#[test]
		fn file_takes_precedence_and_strips_newline() {
			let var = "TERRAREG_TEST_SECRET_FILE_9083";
			let mut file = NamedTempFile::new().unwrap();
			writeln!(file, "from-file").unwrap();

			env::set_var(var, "from-env");
			env::set_var(format!("{var}_FILE"), file.path());

			let secret = load_secret_env(var).unwrap().unwrap();
			assert_eq!(secret.expose(), "from-file");

			env::remove_var(var);
			env::remove_var(format!("{var}_FILE"));
		}

		#[test]
		fn empty_file_path_is_an_error() {
			let var = "TERRAREG_TEST_SECRET_EMPTY_PATH_9084";
			env::set_var(format!("{var}_FILE"), "");

			let err = load_secret_env(var).unwrap_err();
			assert!(matches!(err, SecretEnvError::EmptyPath { .. }));

			env::remove_var(format!("{var}_FILE"));
		}

		#[test]
		fn missing_file_is_an_io_error() {
			let var = "TERRAREG_TEST_SECRET_MISSING_FILE_9085";
			env::set_var(format!("{var}_FILE"), "/nonexistent/terrareg/secret");

			let err = load_secret_env(var).unwrap_err();
			assert!(matches!(err, SecretEnvError::Io { .. }));

			env::remove_var(format!("{var}_FILE"));
		}
	}

	mod load_secret_list_env_tests {
		use super::*;

		#[test]
		fn splits_and_trims() {
			let var = "TERRAREG_TEST_SECRET_LIST_9086";
			env::remove_var(format!("{var}_FILE"));
			env::set_var(var, " UPLOAD-1, ,UPLOAD-2 ");

			let keys = load_secret_list_env(var).unwrap().unwrap();
			let exposed: Vec<&str> = keys.iter().map(|k| k.expose().as_str()).collect();
			assert_eq!(exposed, vec!["UPLOAD-1", "UPLOAD-2"]);

			env::remove_var(var);
		}

		#[test]
		fn unset_is_none() {
			let var = "TERRAREG_TEST_SECRET_LIST_UNSET_9087";
			env::remove_var(var);
			env::remove_var(format!("{var}_FILE"));

			assert!(load_secret_list_env(var).unwrap().is_none());
		}
	}
}
