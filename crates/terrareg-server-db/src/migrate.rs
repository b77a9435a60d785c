// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const MIGRATIONS: &[(&str, &str)] = &[
	("001_sessions", include_str!("../migrations/001_sessions.sql")),
	("002_user_groups", include_str!("../migrations/002_user_groups.sql")),
	("003_terraform_idp", include_str!("../migrations/003_terraform_idp.sql")),
];

/// Apply every migration. Statements are idempotent, so this runs on each
/// startup.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	for (name, sql) in MIGRATIONS {
		for stmt in statements(sql) {
			sqlx::query(stmt).execute(pool).await?;
		}
		tracing::debug!(migration = name, "migration applied");
	}
	Ok(())
}

fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').filter(|chunk| {
		chunk.lines().any(|line| {
			let line = line.trim();
			!line.is_empty() && !line.starts_with("--")
		})
	})
}
