// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Terraform remote service discovery.

use axum::{extract::State, Json};
use serde::Serialize;
use terrareg_server_idp::{AUTHORIZATION_PATH, TOKEN_PATH};

use crate::api::AppState;

/// Local ports the Terraform CLI may listen on for the login redirect.
pub const LOGIN_PORTS: [u16; 2] = [10000, 10010];

#[derive(Debug, Serialize)]
pub struct TerraformServices {
	#[serde(rename = "modules.v1")]
	pub modules_v1: &'static str,
	#[serde(rename = "login.v1", skip_serializing_if = "Option::is_none")]
	pub login_v1: Option<LoginService>,
}

#[derive(Debug, Serialize)]
pub struct LoginService {
	pub client: String,
	pub grant_types: Vec<&'static str>,
	pub authz: String,
	pub token: String,
	pub ports: [u16; 2],
}

/// GET /.well-known/terraform.json
pub async fn terraform_services(State(state): State<AppState>) -> Json<TerraformServices> {
	let login_v1 = state.idp.as_ref().map(|idp| LoginService {
		client: state.terraform_client_id.clone(),
		grant_types: vec!["authz_code"],
		authz: idp.endpoint(AUTHORIZATION_PATH),
		token: idp.endpoint(TOKEN_PATH),
		ports: LOGIN_PORTS,
	});

	Json(TerraformServices {
		modules_v1: "/v1/modules/",
		login_v1,
	})
}
