//! Rate Limiting Configuration
//!
//! Global defaults plus per-endpoint overrides, constructed once at process
//! start and immutable afterwards. Overrides can be merged in from a JSON
//! file before validation.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::prelude::*;

/// Limit override for a single endpoint path.
#[derive(Clone, Debug)]
pub struct EndpointLimit {
	/// Requests allowed per window
	pub max_requests: u32,
	/// Window length
	pub window: Duration,
	/// Human-readable description, used only in diagnostics
	pub description: Box<str>,
}

impl EndpointLimit {
	fn new(max_requests: u32, window: Duration, description: &str) -> Self {
		Self { max_requests, window, description: description.into() }
	}
}

/// Main rate limit configuration.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
	/// Default window length for endpoints without an override
	pub window: Duration,
	/// Default requests per window
	pub max_requests: u32,
	/// Base block duration applied on the first violation
	pub block_duration: Duration,
	/// Identifiers that bypass limiting entirely (monitoring probes, partner gateways)
	pub allow_list: HashSet<Box<str>>,
	/// Quota multiplier for verified accounts
	pub trusted_multiplier: f64,
	/// Flat quota addition for community members
	pub community_bonus: u32,
	/// Per-endpoint overrides, keyed by request path
	pub endpoints: HashMap<Box<str>, EndpointLimit>,
}

impl Default for RateLimitConfig {
	fn default() -> Self {
		let mut endpoints = HashMap::new();
		endpoints.insert(
			"/api/auth/login".into(),
			EndpointLimit::new(5, Duration::from_secs(60), "Login attempts"),
		);
		endpoints.insert(
			"/api/auth/signup".into(),
			EndpointLimit::new(3, Duration::from_secs(300), "Account creation"),
		);
		endpoints.insert(
			"/api/business-directory".into(),
			EndpointLimit::new(60, Duration::from_secs(60), "Business directory search"),
		);
		endpoints.insert(
			"/api/events".into(),
			EndpointLimit::new(120, Duration::from_secs(60), "Event listings feed"),
		);
		endpoints.insert(
			"/api/matching".into(),
			EndpointLimit::new(30, Duration::from_secs(60), "Match suggestions"),
		);
		endpoints.insert(
			"/api/streaming/token".into(),
			EndpointLimit::new(10, Duration::from_secs(60), "Streaming token issuance"),
		);
		endpoints.insert(
			"/api/contact".into(),
			EndpointLimit::new(5, Duration::from_secs(600), "Contact form"),
		);

		Self {
			window: Duration::from_secs(60),
			max_requests: 100,
			block_duration: Duration::from_secs(300),
			allow_list: HashSet::new(),
			trusted_multiplier: 2.0,
			community_bonus: 10,
			endpoints,
		}
	}
}

impl RateLimitConfig {
	/// Build the configuration: defaults, optionally merged with a JSON
	/// override file, then validated. Invalid configuration is rejected here
	/// rather than silently disabling limiting for an endpoint.
	pub fn load(path: Option<&Path>) -> LhResult<Self> {
		let mut config = Self::default();
		if let Some(path) = path {
			let raw = std::fs::read_to_string(path)?;
			let overrides: RateLimitOverrides = serde_json::from_str(&raw)
				.map_err(|err| Error::Config(format!("invalid override file: {}", err)))?;
			overrides.apply(&mut config);
		}
		config.validate()?;
		Ok(config)
	}

	/// Reject zero limits and zero durations.
	pub fn validate(&self) -> LhResult<()> {
		if self.max_requests == 0 {
			return Err(Error::Config("global max_requests must be positive".into()));
		}
		if self.window.is_zero() {
			return Err(Error::Config("global window must be positive".into()));
		}
		if self.block_duration.is_zero() {
			return Err(Error::Config("block_duration must be positive".into()));
		}
		for (path, limit) in &self.endpoints {
			if limit.max_requests == 0 {
				return Err(Error::Config(format!(
					"endpoint {} ({}): max_requests must be positive",
					path, limit.description
				)));
			}
			if limit.window.is_zero() {
				return Err(Error::Config(format!(
					"endpoint {} ({}): window must be positive",
					path, limit.description
				)));
			}
		}
		Ok(())
	}

	/// Resolve the (max requests, window) pair for an endpoint, falling back
	/// to the global defaults when no override matches.
	pub fn limit_for(&self, endpoint: &str) -> (u32, Duration) {
		self.endpoints
			.get(endpoint)
			.map_or((self.max_requests, self.window), |e| (e.max_requests, e.window))
	}

	/// Longest window across the global default and all overrides. Input to
	/// the cleanup retention period.
	pub fn max_window(&self) -> Duration {
		self.endpoints.values().map(|e| e.window).fold(self.window, Duration::max)
	}
}

/// Overrides read from a JSON file and merged over the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimitOverrides {
	pub window_ms: Option<u64>,
	pub max_requests: Option<u32>,
	pub block_ms: Option<u64>,
	pub allow_list: Option<Vec<String>>,
	pub trusted_multiplier: Option<f64>,
	pub community_bonus: Option<u32>,
	pub endpoints: HashMap<String, EndpointOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointOverride {
	pub max_requests: u32,
	pub window_ms: u64,
	#[serde(default)]
	pub description: Option<String>,
}

impl RateLimitOverrides {
	fn apply(self, config: &mut RateLimitConfig) {
		if let Some(ms) = self.window_ms {
			config.window = Duration::from_millis(ms);
		}
		if let Some(max) = self.max_requests {
			config.max_requests = max;
		}
		if let Some(ms) = self.block_ms {
			config.block_duration = Duration::from_millis(ms);
		}
		if let Some(list) = self.allow_list {
			config.allow_list = list.into_iter().map(Into::into).collect();
		}
		if let Some(mult) = self.trusted_multiplier {
			config.trusted_multiplier = mult;
		}
		if let Some(bonus) = self.community_bonus {
			config.community_bonus = bonus;
		}
		for (path, o) in self.endpoints {
			let description = o.description.as_deref().unwrap_or("Custom endpoint limit");
			config.endpoints.insert(
				path.into(),
				EndpointLimit::new(o.max_requests, Duration::from_millis(o.window_ms), description),
			);
		}
	}
}


// vim: ts=4
