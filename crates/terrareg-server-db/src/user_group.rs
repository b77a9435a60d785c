// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User groups, memberships and namespace permissions.
//!
//! AdminSession users reach their groups through `user_group_members`; SAML
//! and OpenID Connect sessions name their groups directly. Permission rows
//! are returned with the namespace id already resolved to its name.

use async_trait::async_trait;
use sqlx::{
	sqlite::{SqlitePool, SqliteRow},
	QueryBuilder, Row, Sqlite,
};
use terrareg_server_auth::{
	NamespaceGrant, NamespaceType, PermissionType, StoreError, UserGroup, UserGroupLookup,
};

use crate::error::DbError;

#[async_trait]
pub trait UserGroupStore: Send + Sync {
	async fn find_or_create_namespace(
		&self,
		namespace: &str,
		namespace_type: NamespaceType,
	) -> Result<i64, DbError>;
	async fn create_user_group(
		&self,
		name: &str,
		site_admin: bool,
		description: Option<&str>,
	) -> Result<UserGroup, DbError>;
	async fn get_user_group_by_name(&self, name: &str) -> Result<Option<UserGroup>, DbError>;
	async fn delete_user_group(&self, group_id: i64) -> Result<bool, DbError>;
	async fn add_member(&self, group_id: i64, user_id: i64) -> Result<(), DbError>;
	async fn remove_member(&self, group_id: i64, user_id: i64) -> Result<bool, DbError>;
	async fn set_namespace_permission(
		&self,
		group_id: i64,
		namespace_id: i64,
		permission: PermissionType,
	) -> Result<(), DbError>;
	async fn delete_namespace_permission(
		&self,
		group_id: i64,
		namespace_id: i64,
	) -> Result<bool, DbError>;
	async fn list_groups_for_user(&self, user_id: i64) -> Result<Vec<UserGroup>, DbError>;
	async fn list_groups_by_names(&self, names: &[String]) -> Result<Vec<UserGroup>, DbError>;
	async fn list_namespace_grants(&self, group_ids: &[i64]) -> Result<Vec<NamespaceGrant>, DbError>;
}

#[derive(Clone)]
pub struct UserGroupRepository {
	pool: SqlitePool,
}

fn parse_group_row(row: &SqliteRow) -> Result<UserGroup, DbError> {
	Ok(UserGroup {
		id: row.try_get("id")?,
		name: row.try_get("name")?,
		site_admin: row.try_get("site_admin")?,
		description: row.try_get("description")?,
	})
}

fn unique_violation(e: sqlx::Error, what: impl FnOnce() -> String) -> DbError {
	match &e {
		sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Conflict(what()),
		_ => DbError::Sqlx(e),
	}
}

impl UserGroupRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self))]
	pub async fn find_or_create_namespace(
		&self,
		namespace: &str,
		namespace_type: NamespaceType,
	) -> Result<i64, DbError> {
		sqlx::query(
			r#"
			INSERT INTO namespaces (namespace, namespace_type) VALUES (?, ?)
			ON CONFLICT(namespace) DO NOTHING
			"#,
		)
		.bind(namespace)
		.bind(namespace_type.as_str())
		.execute(&self.pool)
		.await?;

		let id: i64 = sqlx::query_scalar("SELECT id FROM namespaces WHERE namespace = ?")
			.bind(namespace)
			.fetch_one(&self.pool)
			.await?;
		Ok(id)
	}

	#[tracing::instrument(skip(self, description))]
	pub async fn create_user_group(
		&self,
		name: &str,
		site_admin: bool,
		description: Option<&str>,
	) -> Result<UserGroup, DbError> {
		let result = sqlx::query(
			"INSERT INTO user_groups (name, site_admin, description) VALUES (?, ?, ?)",
		)
		.bind(name)
		.bind(site_admin)
		.bind(description)
		.execute(&self.pool)
		.await
		.map_err(|e| unique_violation(e, || format!("user group {name} already exists")))?;

		let group = UserGroup {
			id: result.last_insert_rowid(),
			name: name.to_string(),
			site_admin,
			description: description.map(str::to_string),
		};
		tracing::debug!(group_id = group.id, "user group created");
		Ok(group)
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_user_group_by_name(&self, name: &str) -> Result<Option<UserGroup>, DbError> {
		let row = sqlx::query(
			"SELECT id, name, site_admin, description FROM user_groups WHERE name = ?",
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_group_row).transpose()
	}

	/// Memberships and permissions cascade.
	#[tracing::instrument(skip(self))]
	pub async fn delete_user_group(&self, group_id: i64) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM user_groups WHERE id = ?")
			.bind(group_id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self))]
	pub async fn add_member(&self, group_id: i64, user_id: i64) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO user_group_members (user_id, group_id) VALUES (?, ?)
			ON CONFLICT(user_id, group_id) DO NOTHING
			"#,
		)
		.bind(user_id)
		.bind(group_id)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn remove_member(&self, group_id: i64, user_id: i64) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM user_group_members WHERE user_id = ? AND group_id = ?")
			.bind(user_id)
			.bind(group_id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	/// Upsert: a group holds at most one permission per namespace.
	#[tracing::instrument(skip(self), fields(permission = %permission))]
	pub async fn set_namespace_permission(
		&self,
		group_id: i64,
		namespace_id: i64,
		permission: PermissionType,
	) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO user_group_namespace_permissions (group_id, namespace_id, permission_type)
			VALUES (?, ?, ?)
			ON CONFLICT(group_id, namespace_id) DO UPDATE SET permission_type = excluded.permission_type
			"#,
		)
		.bind(group_id)
		.bind(namespace_id)
		.bind(permission.as_str())
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_namespace_permission(
		&self,
		group_id: i64,
		namespace_id: i64,
	) -> Result<bool, DbError> {
		let result = sqlx::query(
			"DELETE FROM user_group_namespace_permissions WHERE group_id = ? AND namespace_id = ?",
		)
		.bind(group_id)
		.bind(namespace_id)
		.execute(&self.pool)
		.await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_groups_for_user(&self, user_id: i64) -> Result<Vec<UserGroup>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT g.id, g.name, g.site_admin, g.description
			FROM user_groups g
			JOIN user_group_members m ON m.group_id = g.id
			WHERE m.user_id = ?
			ORDER BY g.id
			"#,
		)
		.bind(user_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_group_row).collect()
	}

	#[tracing::instrument(skip(self, names), fields(count = names.len()))]
	pub async fn list_groups_by_names(&self, names: &[String]) -> Result<Vec<UserGroup>, DbError> {
		if names.is_empty() {
			return Ok(Vec::new());
		}

		let mut query = QueryBuilder::<Sqlite>::new(
			"SELECT id, name, site_admin, description FROM user_groups WHERE name IN (",
		);
		let mut separated = query.separated(", ");
		for name in names {
			separated.push_bind(name);
		}
		separated.push_unseparated(") ORDER BY id");

		let rows = query.build().fetch_all(&self.pool).await?;
		rows.iter().map(parse_group_row).collect()
	}

	#[tracing::instrument(skip(self, group_ids), fields(count = group_ids.len()))]
	pub async fn list_namespace_grants(
		&self,
		group_ids: &[i64],
	) -> Result<Vec<NamespaceGrant>, DbError> {
		if group_ids.is_empty() {
			return Ok(Vec::new());
		}

		let mut query = QueryBuilder::<Sqlite>::new(
			r#"
			SELECT n.namespace, p.permission_type
			FROM user_group_namespace_permissions p
			JOIN namespaces n ON n.id = p.namespace_id
			WHERE p.group_id IN ("#,
		);
		let mut separated = query.separated(", ");
		for id in group_ids {
			separated.push_bind(*id);
		}
		separated.push_unseparated(")");

		let rows = query.build().fetch_all(&self.pool).await?;
		rows.iter()
			.map(|row| -> Result<NamespaceGrant, DbError> {
				let permission: String = row.try_get("permission_type")?;
				Ok(NamespaceGrant {
					namespace: row.try_get("namespace")?,
					permission: permission.parse().map_err(DbError::Internal)?,
				})
			})
			.collect()
	}
}

#[async_trait]
impl UserGroupStore for UserGroupRepository {
	async fn find_or_create_namespace(
		&self,
		namespace: &str,
		namespace_type: NamespaceType,
	) -> Result<i64, DbError> {
		self.find_or_create_namespace(namespace, namespace_type).await
	}

	async fn create_user_group(
		&self,
		name: &str,
		site_admin: bool,
		description: Option<&str>,
	) -> Result<UserGroup, DbError> {
		self.create_user_group(name, site_admin, description).await
	}

	async fn get_user_group_by_name(&self, name: &str) -> Result<Option<UserGroup>, DbError> {
		self.get_user_group_by_name(name).await
	}

	async fn delete_user_group(&self, group_id: i64) -> Result<bool, DbError> {
		self.delete_user_group(group_id).await
	}

	async fn add_member(&self, group_id: i64, user_id: i64) -> Result<(), DbError> {
		self.add_member(group_id, user_id).await
	}

	async fn remove_member(&self, group_id: i64, user_id: i64) -> Result<bool, DbError> {
		self.remove_member(group_id, user_id).await
	}

	async fn set_namespace_permission(
		&self,
		group_id: i64,
		namespace_id: i64,
		permission: PermissionType,
	) -> Result<(), DbError> {
		self.set_namespace_permission(group_id, namespace_id, permission)
			.await
	}

	async fn delete_namespace_permission(
		&self,
		group_id: i64,
		namespace_id: i64,
	) -> Result<bool, DbError> {
		self.delete_namespace_permission(group_id, namespace_id).await
	}

	async fn list_groups_for_user(&self, user_id: i64) -> Result<Vec<UserGroup>, DbError> {
		self.list_groups_for_user(user_id).await
	}

	async fn list_groups_by_names(&self, names: &[String]) -> Result<Vec<UserGroup>, DbError> {
		self.list_groups_by_names(names).await
	}

	async fn list_namespace_grants(&self, group_ids: &[i64]) -> Result<Vec<NamespaceGrant>, DbError> {
		self.list_namespace_grants(group_ids).await
	}
}

#[async_trait]
impl UserGroupLookup for UserGroupRepository {
	async fn groups_for_user(&self, user_id: i64) -> Result<Vec<UserGroup>, StoreError> {
		Ok(self.list_groups_for_user(user_id).await?)
	}

	async fn groups_by_names(&self, names: &[String]) -> Result<Vec<UserGroup>, StoreError> {
		Ok(self.list_groups_by_names(names).await?)
	}

	async fn namespace_grants(&self, group_ids: &[i64]) -> Result<Vec<NamespaceGrant>, StoreError> {
		Ok(self.list_namespace_grants(group_ids).await?)
	}
}
