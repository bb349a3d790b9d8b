//! Rate Limiter
//!
//! Sliding-window request counting per (identifier, endpoint) pair with
//! trust/community quota adjustments and progressive blocking. All state
//! lives in one mutex-guarded table owned by the [`RateLimiter`] instance;
//! check-then-increment is atomic per table, so two concurrent requests can
//! never both slip past the last slot of a quota.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use super::config::RateLimitConfig;
use super::context::{Location, TrustLevel, UserContext};
use crate::prelude::*;
use crate::types::duration_millis;

/// Nominal remaining count reported for allow-listed identifiers.
const ALLOW_LIST_REMAINING: u32 = 9999;

/// Upper bound on progressive block growth.
const MAX_BLOCK: Duration = Duration::from_secs(3600);

/// Retry hint unit for a fresh violation, multiplied by the violation count.
const VIOLATION_RETRY_SECS: u64 = 60;

/// Cap on the violation multiplier in the retry hint.
const VIOLATION_RETRY_CAP: u32 = 10;

/// Violation count at which the escalated log path kicks in.
const SEVERE_VIOLATIONS: u32 = 5;

/// Records younger than this count as active in [`RateLimiterStats`].
const ACTIVITY_WINDOW: Duration = Duration::from_secs(300);

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct RecordKey {
	identifier: Box<str>,
	endpoint: Box<str>,
}

impl RecordKey {
	fn new(identifier: &str, endpoint: &str) -> Self {
		Self { identifier: identifier.into(), endpoint: endpoint.into() }
	}
}

/// Per-(identifier, endpoint) counting state.
#[derive(Clone, Debug)]
struct RateLimitRecord {
	/// Requests observed in the current window
	count: u32,
	/// When the current window began
	window_start: Timestamp,
	/// Most recent request; drives block expiry and cleanup
	last_access: Timestamp,
	/// Cumulative violations, decayed one step per served block
	violations: u32,
	/// Classification observed on the most recent request
	context: UserContext,
}

impl RateLimitRecord {
	fn fresh(now: Timestamp, violations: u32, context: UserContext) -> Self {
		Self { count: 1, window_start: now, last_access: now, violations, context }
	}
}

/// Denial severity, tiered by the violation count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationSeverity {
	/// First violation
	Mild,
	/// 2-3 violations
	Repeated,
	/// 4 or more violations
	Severe,
}

impl ViolationSeverity {
	pub fn from_violations(violations: u32) -> Self {
		match violations {
			0 | 1 => ViolationSeverity::Mild,
			2 | 3 => ViolationSeverity::Repeated,
			_ => ViolationSeverity::Severe,
		}
	}

	/// User-facing denial text.
	pub fn message(self) -> &'static str {
		match self {
			ViolationSeverity::Mild => "Request rate too high. Please slow down.",
			ViolationSeverity::Repeated => {
				"Multiple rate limit violations. An extended cooling period is in effect."
			}
			ViolationSeverity::Severe => {
				"Severe rate limit violations. Protective measures are active."
			}
		}
	}
}

/// Outcome of a rate limit check.
#[derive(Clone, Debug)]
pub struct Decision {
	/// Whether the request may proceed
	pub allowed: bool,
	/// Effective limit used for this check (after context adjustments)
	pub limit: u32,
	/// Requests left in the current window
	pub remaining: u32,
	/// When the current window ends
	pub reset_at: Timestamp,
	/// Seconds until a retry is sensible; present on denials
	pub retry_after: Option<u64>,
	/// Denial severity; present on denials
	pub severity: Option<ViolationSeverity>,
}

impl Decision {
	fn allow(limit: u32, remaining: u32, reset_at: Timestamp) -> Self {
		Self { allowed: true, limit, remaining, reset_at, retry_after: None, severity: None }
	}

	fn deny(limit: u32, reset_at: Timestamp, retry_after: u64, severity: ViolationSeverity) -> Self {
		Self {
			allowed: false,
			limit,
			remaining: 0,
			reset_at,
			retry_after: Some(retry_after),
			severity: Some(severity),
		}
	}

	/// Human-readable denial explanation.
	pub fn reason(&self) -> Option<&'static str> {
		self.severity.map(ViolationSeverity::message)
	}
}

/// Aggregate view over the record table.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStats {
	/// Records currently tracked
	pub total_records: usize,
	/// Records accessed within the last five minutes
	pub active_records: usize,
	/// Records with at least one violation on the books
	pub violating_records: usize,
	/// Records whose requester is a community member
	pub community_records: usize,
}

/// Per-endpoint sliding-window rate limiter.
pub struct RateLimiter {
	config: RateLimitConfig,
	records: Mutex<HashMap<RecordKey, RateLimitRecord>>,
}

impl RateLimiter {
	pub fn new(config: RateLimitConfig) -> Self {
		Self { config, records: Mutex::new(HashMap::new()) }
	}

	pub fn config(&self) -> &RateLimitConfig {
		&self.config
	}

	/// Decide whether a request from `identifier` against `endpoint` is
	/// allowed right now.
	pub fn check(&self, identifier: &str, endpoint: &str, context: UserContext) -> Decision {
		self.check_at(Timestamp::now(), identifier, endpoint, context)
	}

	/// Clock-explicit variant of [`check`](Self::check).
	pub fn check_at(
		&self,
		now: Timestamp,
		identifier: &str,
		endpoint: &str,
		context: UserContext,
	) -> Decision {
		// Allow-listed identifiers never touch the record table.
		if self.config.allow_list.contains(identifier) {
			let (limit, window) = self.config.limit_for(endpoint);
			return Decision::allow(limit, ALLOW_LIST_REMAINING.max(limit), now + window);
		}

		let (base_limit, window) = self.config.limit_for(endpoint);
		let window_ms = duration_millis(window);
		// Recomputed on every call so a trust tier change takes effect immediately.
		let effective = effective_limit(&self.config, base_limit, context);

		let mut records = self.records.lock();
		let key = RecordKey::new(identifier, endpoint);

		let Some(record) = records.get_mut(&key) else {
			records.insert(key, RateLimitRecord::fresh(now, 0, context));
			return Decision::allow(effective, effective.saturating_sub(1), now + window);
		};

		if now.since(record.window_start) > window_ms {
			// Window rolled over: counting restarts, violations carry.
			let violations = record.violations;
			*record = RateLimitRecord::fresh(now, violations, context);
			return Decision::allow(effective, effective.saturating_sub(1), now + window);
		}

		let previous_access = record.last_access;
		record.count = record.count.saturating_add(1);
		record.last_access = now;
		record.context = context;
		let reset_at = record.window_start + window;

		if record.violations > 0 {
			// Block expiry is measured from the request before this one.
			let block_expiry = previous_access + block_duration_for(&self.config, record.violations);
			if now < block_expiry {
				let retry_after = remaining_secs(now, block_expiry);
				let severity = ViolationSeverity::from_violations(record.violations);
				// A denial during an active block is not a new violation.
				return Decision::deny(effective, reset_at, retry_after, severity);
			}
		}

		if record.count <= effective {
			// The block (if any) was served out; decay one violation step.
			record.violations = record.violations.saturating_sub(1);
			return Decision::allow(effective, effective - record.count, reset_at);
		}

		record.violations = record.violations.saturating_add(1);
		let violations = record.violations;
		log_violation(identifier, endpoint, record, violations);

		let retry_after = VIOLATION_RETRY_SECS * u64::from(violations.min(VIOLATION_RETRY_CAP));
		Decision::deny(effective, reset_at, retry_after, ViolationSeverity::from_violations(violations))
	}

	/// Evict records idle for longer than the longest window plus the base
	/// block duration. Invoked periodically by the host process.
	pub fn cleanup_expired_records(&self) -> usize {
		self.cleanup_expired_records_at(Timestamp::now())
	}

	pub fn cleanup_expired_records_at(&self, now: Timestamp) -> usize {
		let retention =
			duration_millis(self.config.max_window()) + duration_millis(self.config.block_duration);
		let mut records = self.records.lock();
		let before = records.len();
		records.retain(|_, record| now.since(record.last_access) <= retention);
		let evicted = before - records.len();
		if evicted > 0 {
			debug!(evicted, remaining = records.len(), "rate limit records evicted");
		}
		evicted
	}

	/// Aggregate counts over the record table. Read-only.
	pub fn statistics(&self) -> RateLimiterStats {
		self.statistics_at(Timestamp::now())
	}

	pub fn statistics_at(&self, now: Timestamp) -> RateLimiterStats {
		let activity_ms = duration_millis(ACTIVITY_WINDOW);
		let records = self.records.lock();
		let mut stats = RateLimiterStats { total_records: records.len(), ..Default::default() };
		for record in records.values() {
			if now.since(record.last_access) <= activity_ms {
				stats.active_records += 1;
			}
			if record.violations > 0 {
				stats.violating_records += 1;
			}
			if record.context.is_community_member {
				stats.community_records += 1;
			}
		}
		stats
	}

	#[cfg(test)]
	fn violations_of(&self, identifier: &str, endpoint: &str) -> Option<u32> {
		self.records.lock().get(&RecordKey::new(identifier, endpoint)).map(|r| r.violations)
	}
}

/// Quota after community/trust/location adjustments. Never below the base
/// limit: classification can only help, relative to the unauthenticated
/// baseline.
fn effective_limit(config: &RateLimitConfig, base_limit: u32, context: UserContext) -> u32 {
	let mut effective = f64::from(base_limit);
	if context.is_community_member {
		effective += f64::from(config.community_bonus);
	}
	effective *= match context.trust {
		TrustLevel::Verified => config.trusted_multiplier,
		TrustLevel::Trusted => 1.5,
		TrustLevel::New => 0.8,
	};
	if context.location == Location::Uk {
		effective += 5.0;
	}
	(effective.floor() as u32).max(base_limit)
}

/// Block duration for the current violation count: exponential growth from
/// the configured base, capped at one hour.
fn block_duration_for(config: &RateLimitConfig, violations: u32) -> Duration {
	let exponent = violations.saturating_sub(1).min(12);
	config.block_duration.saturating_mul(1 << exponent).min(MAX_BLOCK)
}

/// Whole seconds until `until`, rounded up so an active block never reports
/// zero.
fn remaining_secs(now: Timestamp, until: Timestamp) -> u64 {
	let ms = until.since(now).max(0);
	((ms + 999) / 1000) as u64
}

/// Security log event for a fresh violation. Must never affect the decision.
fn log_violation(identifier: &str, endpoint: &str, record: &RateLimitRecord, violations: u32) {
	let identifier = mask_identifier(identifier);
	if violations >= SEVERE_VIOLATIONS {
		error!(
			identifier = %identifier,
			endpoint = %endpoint,
			violations,
			requests = record.count,
			window_start = %record.window_start,
			community = record.context.is_community_member,
			trust = ?record.context.trust,
			location = ?record.context.location,
			"severe rate limit violations, protective measures active"
		);
	} else {
		warn!(
			identifier = %identifier,
			endpoint = %endpoint,
			violations,
			requests = record.count,
			window_start = %record.window_start,
			community = record.context.is_community_member,
			trust = ?record.context.trust,
			location = ?record.context.location,
			"rate limit exceeded"
		);
	}
}

/// Partially mask an identifier for logging. Dotted identifiers (IPv4 and
/// hostname shaped) lose their last segment, colon-separated ones (IPv6)
/// their last group; anything else keeps a short prefix.
pub(crate) fn mask_identifier(identifier: &str) -> String {
	if let Some(pos) = identifier.rfind('.') {
		format!("{}.xxx", &identifier[..pos])
	} else if let Some(pos) = identifier.rfind(':') {
		format!("{}:xxxx", &identifier[..pos])
	} else {
		let prefix: String = identifier.chars().take(4).collect();
		format!("{}***", prefix)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_config(max_requests: u32, window: Duration, block: Duration) -> RateLimitConfig {
		RateLimitConfig {
			window,
			max_requests,
			block_duration: block,
			endpoints: HashMap::new(),
			..RateLimitConfig::default()
		}
	}

	fn ctx() -> UserContext {
		UserContext::default()
	}

	const EP: &str = "/api/events";
	const IP: &str = "203.0.113.9";

	#[test]
	fn consumes_quota_monotonically() {
		let limiter = RateLimiter::new(test_config(3, Duration::from_secs(60), Duration::from_secs(300)));

		for expected in [2, 1, 0] {
			let decision = limiter.check_at(Timestamp(1000), IP, EP, ctx());
			assert!(decision.allowed);
			assert_eq!(decision.remaining, expected);
			assert_eq!(decision.limit, 3);
		}
	}

	#[test]
	fn window_reset_carries_violations() {
		let limiter = RateLimiter::new(test_config(3, Duration::from_secs(60), Duration::from_secs(300)));

		for t in [0, 1000, 2000] {
			assert!(limiter.check_at(Timestamp(t), IP, EP, ctx()).allowed);
		}
		let denied = limiter.check_at(Timestamp(3000), IP, EP, ctx());
		assert!(!denied.allowed);
		assert_eq!(limiter.violations_of(IP, EP), Some(1));

		// 70s later the window has expired: fresh count, violations intact
		let decision = limiter.check_at(Timestamp(70_000), IP, EP, ctx());
		assert!(decision.allowed);
		assert_eq!(decision.remaining, 2);
		assert_eq!(decision.reset_at, Timestamp(130_000));
		assert_eq!(limiter.violations_of(IP, EP), Some(1));
	}

	#[test]
	fn scenario_four_rapid_requests() {
		let limiter = RateLimiter::new(test_config(3, Duration::from_secs(60), Duration::from_secs(300)));

		let mut remaining = Vec::new();
		for t in [0, 1000, 2000] {
			let decision = limiter.check_at(Timestamp(t), IP, EP, ctx());
			assert!(decision.allowed);
			remaining.push(decision.remaining);
		}
		assert_eq!(remaining, vec![2, 1, 0]);

		let denied = limiter.check_at(Timestamp(3000), IP, EP, ctx());
		assert!(!denied.allowed);
		assert_eq!(denied.retry_after, Some(60));
		assert_eq!(denied.severity, Some(ViolationSeverity::Mild));
		assert_eq!(limiter.violations_of(IP, EP), Some(1));
	}

	#[test]
	fn scenario_verified_community_member() {
		let mut config = test_config(3, Duration::from_secs(60), Duration::from_secs(300));
		config.community_bonus = 10;
		config.trusted_multiplier = 2.0;
		let limiter = RateLimiter::new(config);
		let member = UserContext {
			is_community_member: true,
			trust: TrustLevel::Verified,
			location: Location::Portugal,
		};

		// effective limit = max(3, (3 + 10) * 2) = 26
		for i in 0..26 {
			let decision = limiter.check_at(Timestamp(i * 100), IP, EP, member);
			assert!(decision.allowed, "request {} should be allowed", i + 1);
			assert_eq!(decision.limit, 26);
		}
		let denied = limiter.check_at(Timestamp(2600), IP, EP, member);
		assert!(!denied.allowed);
	}

	#[test]
	fn allow_list_bypasses_and_creates_no_records() {
		let mut config = test_config(3, Duration::from_secs(60), Duration::from_secs(300));
		config.allow_list.insert("127.0.0.1".into());
		let limiter = RateLimiter::new(config);

		for i in 0..10_000 {
			let decision = limiter.check_at(Timestamp(i), "127.0.0.1", EP, ctx());
			assert!(decision.allowed);
			assert!(decision.remaining >= ALLOW_LIST_REMAINING);
		}
		assert_eq!(limiter.statistics_at(Timestamp(10_000)).total_records, 0);
	}

	#[test]
	fn effective_limit_never_drops_below_base() {
		let config = RateLimitConfig::default();

		// `New` tier would compute 80, the floor restores the base
		let new_user = UserContext { trust: TrustLevel::New, ..UserContext::default() };
		assert_eq!(effective_limit(&config, 100, new_user), 100);

		let trusted = UserContext { trust: TrustLevel::Trusted, ..UserContext::default() };
		assert_eq!(effective_limit(&config, 100, trusted), 150);

		let verified_member_uk = UserContext {
			is_community_member: true,
			trust: TrustLevel::Verified,
			location: Location::Uk,
		};
		// (100 + 10) * 2 + 5
		assert_eq!(effective_limit(&config, 100, verified_member_uk), 225);
	}

	#[test]
	fn uk_bonus_is_flat_and_post_multiplier() {
		let config = RateLimitConfig::default();
		let uk = UserContext { location: Location::Uk, ..UserContext::default() };
		// 100 * 0.8 + 5 = 85, floored to base
		assert_eq!(effective_limit(&config, 100, uk), 100);
		let uk_trusted = UserContext { trust: TrustLevel::Trusted, location: Location::Uk, ..UserContext::default() };
		assert_eq!(effective_limit(&config, 100, uk_trusted), 155);
	}

	#[test]
	fn block_durations_double_and_cap() {
		let config = test_config(3, Duration::from_secs(60), Duration::from_secs(300));

		let minutes: Vec<u64> =
			(1..=6).map(|v| block_duration_for(&config, v).as_secs() / 60).collect();
		assert_eq!(minutes, vec![5, 10, 20, 40, 60, 60]);
	}

	#[test]
	fn blocked_denial_does_not_increment_violations() {
		let limiter = RateLimiter::new(test_config(3, Duration::from_secs(600), Duration::from_secs(300)));

		for t in [0, 1000, 2000] {
			assert!(limiter.check_at(Timestamp(t), IP, EP, ctx()).allowed);
		}
		assert!(!limiter.check_at(Timestamp(3000), IP, EP, ctx()).allowed);
		assert_eq!(limiter.violations_of(IP, EP), Some(1));

		// Retry while the 5 minute block is running: denied, count unchanged
		let blocked = limiter.check_at(Timestamp(10_000), IP, EP, ctx());
		assert!(!blocked.allowed);
		// block expires at 303s, so 293s remain
		assert_eq!(blocked.retry_after, Some(293));
		assert_eq!(limiter.violations_of(IP, EP), Some(1));
	}

	#[test]
	fn violations_accumulate_across_served_blocks() {
		let limiter = RateLimiter::new(test_config(3, Duration::from_secs(600), Duration::from_secs(300)));

		for t in [0, 1000, 2000] {
			assert!(limiter.check_at(Timestamp(t), IP, EP, ctx()).allowed);
		}
		let first = limiter.check_at(Timestamp(3000), IP, EP, ctx());
		assert_eq!(first.retry_after, Some(60));

		// Silent through the block, still over quota in the same window
		let second = limiter.check_at(Timestamp(310_000), IP, EP, ctx());
		assert!(!second.allowed);
		assert_eq!(second.retry_after, Some(120));
		assert_eq!(limiter.violations_of(IP, EP), Some(2));

		// The next block is doubled: 600s from the last request
		let blocked = limiter.check_at(Timestamp(315_000), IP, EP, ctx());
		assert!(!blocked.allowed);
		assert_eq!(blocked.retry_after, Some(595));
	}

	#[test]
	fn violations_decay_one_step_after_served_block() {
		let limiter = RateLimiter::new(test_config(3, Duration::from_secs(600), Duration::from_secs(60)));

		for t in [0, 1000, 2000] {
			assert!(limiter.check_at(Timestamp(t), IP, EP, ctx()).allowed);
		}
		assert!(!limiter.check_at(Timestamp(3000), IP, EP, ctx()).allowed);
		assert_eq!(limiter.violations_of(IP, EP), Some(1));

		// Window rolls over; the fresh window carries the violation
		let fresh = limiter.check_at(Timestamp(700_000), IP, EP, ctx());
		assert!(fresh.allowed);
		assert_eq!(limiter.violations_of(IP, EP), Some(1));

		// 61s of silence serve out the block; the next allowed request decays
		let decayed = limiter.check_at(Timestamp(761_000), IP, EP, ctx());
		assert!(decayed.allowed);
		assert_eq!(limiter.violations_of(IP, EP), Some(0));
	}

	#[test]
	fn severity_tiers_follow_violation_count() {
		assert_eq!(ViolationSeverity::from_violations(1), ViolationSeverity::Mild);
		assert_eq!(ViolationSeverity::from_violations(2), ViolationSeverity::Repeated);
		assert_eq!(ViolationSeverity::from_violations(3), ViolationSeverity::Repeated);
		assert_eq!(ViolationSeverity::from_violations(4), ViolationSeverity::Severe);
		assert_eq!(ViolationSeverity::from_violations(9), ViolationSeverity::Severe);
	}

	#[test]
	fn retry_hint_caps_at_ten_violations() {
		let limiter = RateLimiter::new(test_config(1, Duration::from_secs(3600), Duration::from_secs(1)));
		assert!(limiter.check_at(Timestamp(0), IP, EP, ctx()).allowed);

		// Violate twelve times, waiting out each block in between
		let mut t = 1_000;
		let mut last_retry = 0;
		for _ in 0..12 {
			let decision = limiter.check_at(Timestamp(t), IP, EP, ctx());
			assert!(!decision.allowed);
			last_retry = decision.retry_after.unwrap_or(0);
			let violations = limiter.violations_of(IP, EP).unwrap_or(0);
			t += duration_millis(block_duration_for(limiter.config(), violations)) + 1_000;
		}

		assert_eq!(limiter.violations_of(IP, EP), Some(12));
		// 60s * min(12, 10)
		assert_eq!(last_retry, 600);
	}

	#[test]
	fn cleanup_evicts_only_stale_records() {
		// max_window falls back to the global 600s window; retention 600 + 300
		let limiter = RateLimiter::new(test_config(3, Duration::from_secs(600), Duration::from_secs(300)));

		limiter.check_at(Timestamp(0), "198.51.100.1", EP, ctx());
		limiter.check_at(Timestamp(500_000), "198.51.100.2", EP, ctx());

		let evicted = limiter.cleanup_expired_records_at(Timestamp(1_000_000));
		assert_eq!(evicted, 1);

		let stats = limiter.statistics_at(Timestamp(1_000_000));
		assert_eq!(stats.total_records, 1);
	}

	#[test]
	fn statistics_classify_records() {
		let limiter = RateLimiter::new(test_config(3, Duration::from_secs(3600), Duration::from_secs(60)));
		let member = UserContext { is_community_member: true, ..UserContext::default() };

		// stale record, last touched 10 minutes before the stats snapshot
		limiter.check_at(Timestamp(0), "198.51.100.1", EP, ctx());
		// active community member
		limiter.check_at(Timestamp(590_000), "198.51.100.2", EP, member);
		// active violator
		for t in [580_000, 581_000, 582_000, 583_000] {
			limiter.check_at(Timestamp(t), "198.51.100.3", EP, ctx());
		}

		let stats = limiter.statistics_at(Timestamp(600_000));
		assert_eq!(stats.total_records, 3);
		assert_eq!(stats.active_records, 2);
		assert_eq!(stats.violating_records, 1);
		assert_eq!(stats.community_records, 1);
	}

	#[test]
	fn context_updates_take_effect_immediately() {
		let limiter = RateLimiter::new(test_config(3, Duration::from_secs(60), Duration::from_secs(300)));

		for t in [0, 1000, 2000] {
			assert!(limiter.check_at(Timestamp(t), IP, EP, ctx()).allowed);
		}
		// The 4th request would violate at the baseline, but the requester
		// upgraded to a verified community member in the meantime.
		let member = UserContext {
			is_community_member: true,
			trust: TrustLevel::Verified,
			location: Location::Other,
		};
		let decision = limiter.check_at(Timestamp(3000), IP, EP, member);
		assert!(decision.allowed);
		assert_eq!(decision.limit, 26);
	}

	#[test]
	fn violation_logging_does_not_affect_decision() {
		let _ = tracing_subscriber::fmt().with_test_writer().try_init();
		let limiter = RateLimiter::new(test_config(1, Duration::from_secs(60), Duration::from_secs(300)));

		assert!(limiter.check_at(Timestamp(0), IP, EP, ctx()).allowed);
		let denied = limiter.check_at(Timestamp(100), IP, EP, ctx());
		assert!(!denied.allowed);
		assert_eq!(denied.retry_after, Some(60));
		assert_eq!(denied.reason(), Some(ViolationSeverity::Mild.message()));
	}

	#[test]
	fn masks_identifiers_for_logging() {
		assert_eq!(mask_identifier("203.0.113.9"), "203.0.113.xxx");
		assert_eq!(mask_identifier("2001:db8::1"), "2001:db8::xxxx");
		assert_eq!(mask_identifier("session-4f2a91"), "sess***");
		assert_eq!(mask_identifier("unknown"), "unkn***");
	}
}

// vim: ts=4
