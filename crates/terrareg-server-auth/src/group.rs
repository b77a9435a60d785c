// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User group and namespace permission value objects.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::PermissionType;

/// A group of users. Members of a `site_admin` group are administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
	pub id: i64,
	pub name: String,
	pub site_admin: bool,
	pub description: Option<String>,
}

/// A permission row linking a group to a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacePermission {
	pub group_id: i64,
	pub namespace_id: i64,
	pub permission: PermissionType,
}

/// A permission row with the namespace id already resolved to its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceGrant {
	pub namespace: String,
	pub permission: PermissionType,
}

impl NamespaceGrant {
	pub fn new(namespace: impl Into<String>, permission: PermissionType) -> Self {
		Self {
			namespace: namespace.into(),
			permission,
		}
	}
}

/// A user is an administrator iff any of their groups has `site_admin`.
pub fn is_site_admin(groups: &[UserGroup]) -> bool {
	groups.iter().any(|g| g.site_admin)
}

/// Collapse grants from every joined group into one permission per namespace,
/// keeping the highest level.
pub fn resolve_namespace_permissions<I>(grants: I) -> HashMap<String, PermissionType>
where
	I: IntoIterator<Item = NamespaceGrant>,
{
	let mut resolved: HashMap<String, PermissionType> = HashMap::new();
	for grant in grants {
		resolved
			.entry(grant.namespace)
			.and_modify(|held| {
				if grant.permission > *held {
					*held = grant.permission;
				}
			})
			.or_insert(grant.permission);
	}
	resolved
}
