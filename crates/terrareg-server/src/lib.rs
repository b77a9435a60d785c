// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Terrareg registry server: authentication middleware, the embedded
//! Terraform identity provider routes and background maintenance jobs.

pub mod api;
pub mod auth_middleware;
pub mod error;
pub mod jobs;
pub mod routes;

pub use api::{build_dispatcher, create_app_state, create_router, AppState};
pub use error::{ErrorResponse, ServerError};
pub use terrareg_server_config::ServerConfig;
pub use terrareg_server_db as db;
