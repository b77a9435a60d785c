// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Terrareg registry server binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use terrareg_server::{
	create_app_state, create_router,
	jobs::{IdpCleanupJob, JobScheduler, KeyRotationJob, SessionCleanupJob},
};
use terrareg_server_config::{LogFormat, ServerConfig};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Terrareg server - Terraform module registry with an embedded Terraform
/// login identity provider.
#[derive(Parser, Debug)]
#[command(name = "terrareg-server", about = "Terrareg module registry server", version)]
struct Args {
	/// Configuration file, layered between defaults and the environment
	#[arg(long, env = "TERRAREG_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

fn init_tracing(config: &ServerConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	match config.logging.format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json())
			.init(),
		LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => terrareg_server_config::load_config_with_file(path)?,
		None => terrareg_server_config::load_config()?,
	};

	init_tracing(&config);

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		version = version::VERSION,
		"starting terrareg-server"
	);

	let pool = terrareg_server::db::create_pool(&config.database.url).await?;
	terrareg_server::db::run_migrations(&pool).await?;

	let state = create_app_state(pool, &config).await?;

	let mut scheduler = JobScheduler::new();
	scheduler.register_periodic(
		Arc::new(SessionCleanupJob::new(Arc::new(state.sessions.clone()))),
		Duration::from_secs(config.auth.session_cleanup_interval_secs),
	);

	if let Some(idp) = &state.idp {
		scheduler.register_periodic(
			Arc::new(IdpCleanupJob::new(Arc::clone(idp))),
			Duration::from_secs(config.terraform_oidc.cleanup_interval_secs),
		);

		if let Some(interval) = config.terraform_oidc.key_rotation_interval_secs {
			scheduler.register_periodic(
				Arc::new(KeyRotationJob::new(Arc::clone(idp))),
				Duration::from_secs(interval),
			);
			tracing::info!(interval_secs = interval, "Registered signing key rotation job");
		}
	}

	scheduler.start().await;

	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	scheduler.shutdown().await;
	tracing::info!("Server shutdown complete");
	Ok(())
}
