//! App state type

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lusohub_core::rate_limit::RateLimiter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct AppState {
	pub opts: AppOpts,
	pub rate_limiter: Arc<RateLimiter>,
}

pub type App = Arc<AppState>;

#[derive(Debug)]
pub struct AppOpts {
	/// Listen address, e.g. "0.0.0.0:8080"
	pub listen: Box<str>,
	/// How often the record table is swept
	pub cleanup_interval: Duration,
	/// Optional JSON file with rate limit overrides
	pub config_file: Option<PathBuf>,
}

impl AppOpts {
	/// Build options from the environment: `LISTEN`, `CLEANUP_INTERVAL`
	/// (seconds) and `RATE_LIMIT_CONFIG` (path).
	pub fn from_env() -> Self {
		let listen = std::env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
		let cleanup_secs = std::env::var("CLEANUP_INTERVAL")
			.ok()
			.and_then(|v| v.parse().ok())
			.unwrap_or(300);
		let config_file = std::env::var("RATE_LIMIT_CONFIG").ok().map(PathBuf::from);

		Self {
			listen: listen.into(),
			cleanup_interval: Duration::from_secs(cleanup_secs),
			config_file,
		}
	}
}

// vim: ts=4
