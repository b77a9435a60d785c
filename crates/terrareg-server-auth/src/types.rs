// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Closed enumerations shared across the authentication core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies the producer of an [`AuthContext`](crate::AuthContext).
///
/// The serialized names are part of the wire contract: they appear in session
/// payload tags, provider data and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthMethodType {
	NotAuthenticated,
	AdminApiKey,
	UploadApiKey,
	PublishApiKey,
	TerraformAnalyticsAuthKey,
	TerraformInternalExtraction,
	AdminSession,
	GitHubSession,
	SamlSession,
	OpenIDConnectSession,
	TerraformOidc,
}

impl AuthMethodType {
	pub const ALL: [AuthMethodType; 11] = [
		AuthMethodType::NotAuthenticated,
		AuthMethodType::AdminApiKey,
		AuthMethodType::UploadApiKey,
		AuthMethodType::PublishApiKey,
		AuthMethodType::TerraformAnalyticsAuthKey,
		AuthMethodType::TerraformInternalExtraction,
		AuthMethodType::AdminSession,
		AuthMethodType::GitHubSession,
		AuthMethodType::SamlSession,
		AuthMethodType::OpenIDConnectSession,
		AuthMethodType::TerraformOidc,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			AuthMethodType::NotAuthenticated => "NotAuthenticated",
			AuthMethodType::AdminApiKey => "AdminApiKey",
			AuthMethodType::UploadApiKey => "UploadApiKey",
			AuthMethodType::PublishApiKey => "PublishApiKey",
			AuthMethodType::TerraformAnalyticsAuthKey => "TerraformAnalyticsAuthKey",
			AuthMethodType::TerraformInternalExtraction => "TerraformInternalExtraction",
			AuthMethodType::AdminSession => "AdminSession",
			AuthMethodType::GitHubSession => "GitHubSession",
			AuthMethodType::SamlSession => "SamlSession",
			AuthMethodType::OpenIDConnectSession => "OpenIDConnectSession",
			AuthMethodType::TerraformOidc => "TerraformOidc",
		}
	}

	/// Dispatch rank; lower runs first. Header credentials outrank cookies and
	/// admin outranks everything else.
	pub fn priority(&self) -> u8 {
		match self {
			AuthMethodType::AdminApiKey => 1,
			AuthMethodType::PublishApiKey => 2,
			AuthMethodType::UploadApiKey => 3,
			AuthMethodType::TerraformInternalExtraction => 4,
			AuthMethodType::TerraformAnalyticsAuthKey => 5,
			AuthMethodType::TerraformOidc => 6,
			AuthMethodType::AdminSession
			| AuthMethodType::GitHubSession
			| AuthMethodType::SamlSession
			| AuthMethodType::OpenIDConnectSession => 7,
			AuthMethodType::NotAuthenticated => u8::MAX,
		}
	}

	/// True for the cookie-bound methods backed by the session store.
	pub fn is_session(&self) -> bool {
		matches!(
			self,
			AuthMethodType::AdminSession
				| AuthMethodType::GitHubSession
				| AuthMethodType::SamlSession
				| AuthMethodType::OpenIDConnectSession
		)
	}
}

impl fmt::Display for AuthMethodType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Namespace permission level. Ordered: `Read < Modify < Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermissionType {
	Read,
	Modify,
	Full,
}

impl PermissionType {
	pub fn rank(&self) -> u8 {
		match self {
			PermissionType::Read => 1,
			PermissionType::Modify => 2,
			PermissionType::Full => 3,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			PermissionType::Read => "READ",
			PermissionType::Modify => "MODIFY",
			PermissionType::Full => "FULL",
		}
	}

	/// Whether holding `self` satisfies a `required` level.
	pub fn satisfies(&self, required: PermissionType) -> bool {
		self.rank() >= required.rank()
	}
}

impl fmt::Display for PermissionType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PermissionType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"READ" => Ok(PermissionType::Read),
			"MODIFY" => Ok(PermissionType::Modify),
			"FULL" => Ok(PermissionType::Full),
			other => Err(format!("unknown permission type: {other}")),
		}
	}
}

/// Implicit namespace ownership carried by federated identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NamespaceType {
	#[default]
	None,
	GithubOrganisation,
	GithubUser,
}

impl NamespaceType {
	pub fn as_str(&self) -> &'static str {
		match self {
			NamespaceType::None => "NONE",
			NamespaceType::GithubOrganisation => "GITHUB_ORGANISATION",
			NamespaceType::GithubUser => "GITHUB_USER",
		}
	}
}

impl FromStr for NamespaceType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"NONE" => Ok(NamespaceType::None),
			"GITHUB_ORGANISATION" => Ok(NamespaceType::GithubOrganisation),
			"GITHUB_USER" => Ok(NamespaceType::GithubUser),
			other => Err(format!("unknown namespace type: {other}")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	mod auth_method_type {
		use super::*;

		#[test]
		fn serde_names_match_display() {
			for method in AuthMethodType::ALL {
				let json = serde_json::to_string(&method).unwrap();
				assert_eq!(json, format!("\"{method}\""));
			}
		}

		#[test]
		fn priority_order_is_strict_for_non_session_methods() {
			let order = [
				AuthMethodType::AdminApiKey,
				AuthMethodType::PublishApiKey,
				AuthMethodType::UploadApiKey,
				AuthMethodType::TerraformInternalExtraction,
				AuthMethodType::TerraformAnalyticsAuthKey,
				AuthMethodType::TerraformOidc,
				AuthMethodType::AdminSession,
			];
			for pair in order.windows(2) {
				assert!(pair[0].priority() < pair[1].priority(), "{pair:?}");
			}
		}

		#[test]
		fn not_authenticated_sorts_last() {
			for method in AuthMethodType::ALL {
				assert!(method.priority() <= AuthMethodType::NotAuthenticated.priority());
			}
		}

		#[test]
		fn session_methods() {
			assert!(AuthMethodType::SamlSession.is_session());
			assert!(!AuthMethodType::TerraformOidc.is_session());
		}
	}

	mod permission_type {
		use super::*;

		#[test]
		fn wire_names() {
			assert_eq!(
				serde_json::to_string(&PermissionType::Modify).unwrap(),
				"\"MODIFY\""
			);
			assert_eq!("full".parse::<PermissionType>().unwrap(), PermissionType::Full);
			assert!("ADMIN".parse::<PermissionType>().is_err());
		}

		#[test]
		fn ordering_follows_rank() {
			assert!(PermissionType::Read < PermissionType::Modify);
			assert!(PermissionType::Modify < PermissionType::Full);
			assert!(PermissionType::Full.satisfies(PermissionType::Read));
			assert!(!PermissionType::Read.satisfies(PermissionType::Modify));
		}

		fn any_permission() -> impl Strategy<Value = PermissionType> {
			prop_oneof![
				Just(PermissionType::Read),
				Just(PermissionType::Modify),
				Just(PermissionType::Full),
			]
		}

		proptest! {
			#[test]
			fn satisfies_agrees_with_ord(held in any_permission(), required in any_permission()) {
				prop_assert_eq!(held.satisfies(required), held >= required);
			}
		}
	}

	mod namespace_type {
		use super::*;

		#[test]
		fn wire_names() {
			assert_eq!(
				serde_json::to_string(&NamespaceType::GithubOrganisation).unwrap(),
				"\"GITHUB_ORGANISATION\""
			);
			let parsed: NamespaceType = serde_json::from_str("\"GITHUB_USER\"").unwrap();
			assert_eq!(parsed, NamespaceType::GithubUser);
			assert_eq!("NONE".parse::<NamespaceType>().unwrap(), NamespaceType::None);
		}
	}
}
