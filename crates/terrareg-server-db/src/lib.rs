// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # terrareg-server-db
//!
//! SQLite persistence for sessions, user groups and the Terraform identity
//! provider, via sqlx.
//!
//! Each domain has a `*Store` trait and a `*Repository` holding a
//! `SqlitePool`. Repositories also implement the read seams of the auth
//! crate ([`SessionLookup`](terrareg_server_auth::SessionLookup),
//! [`UserGroupLookup`](terrareg_server_auth::UserGroupLookup)) and the
//! IdP crate's [`IdpStore`](terrareg_server_idp::IdpStore).
//!
//! Lookups where absence is normal return `Result<Option<T>>`; deletes
//! return `Result<bool>`.

mod error;
pub mod idp;
mod migrate;
pub mod pool;
pub mod session;
mod timestamp;
pub mod user_group;

#[cfg(test)]
pub mod testing;

pub use error::{DbError, Result};
pub use idp::IdpRepository;
pub use migrate::run_migrations;
pub use pool::create_pool;
pub use session::{SessionRepository, SessionStore};
pub use user_group::{UserGroupRepository, UserGroupStore};
