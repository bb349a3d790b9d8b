//! LusoHub API server
//!
//! Owns the limiter's lifecycle: configuration is loaded and validated at
//! startup, the record table sweep runs on a timer owned by this process,
//! and the rate limit layer wraps every route.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod app;
mod prelude;
mod routes;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use lusohub_core::rate_limit::{RateLimitConfig, RateLimiter};

use crate::app::{AppOpts, AppState};
use crate::prelude::*;

#[tokio::main]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	match run().await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("fatal: {}", err);
			ExitCode::FAILURE
		}
	}
}

async fn run() -> LhResult<()> {
	let opts = AppOpts::from_env();
	let config = RateLimitConfig::load(opts.config_file.as_deref())?;
	info!(
		endpoints = config.endpoints.len(),
		allow_list = config.allow_list.len(),
		"rate limit configuration loaded"
	);

	let app: App = Arc::new(AppState { rate_limiter: Arc::new(RateLimiter::new(config)), opts });
	spawn_cleanup(app.clone());

	let router = routes::router(app.clone());
	let listener = tokio::net::TcpListener::bind(&*app.opts.listen).await?;
	info!("listening on {}", app.opts.listen);
	axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	Ok(())
}

/// Periodic record table sweep. The limiter does not schedule itself; the
/// host owns the timer.
fn spawn_cleanup(app: App) {
	tokio::spawn(async move {
		let mut tick = tokio::time::interval(app.opts.cleanup_interval);
		tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
		// the first tick fires immediately
		tick.tick().await;
		loop {
			tick.tick().await;
			let evicted = app.rate_limiter.cleanup_expired_records();
			if evicted > 0 {
				info!(evicted, "swept expired rate limit records");
			}
		}
	});
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		warn!("failed to install shutdown handler: {}", err);
	}
}

// vim: ts=4
