//! Shared primitive types

use std::ops::Add;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Timestamp //
///////////////

/// Milliseconds since the Unix epoch.
///
/// All window and block arithmetic in the rate limiter is done on this type,
/// which keeps the decision logic drivable from tests with explicit clocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
	/// Current wall-clock time.
	pub fn now() -> Self {
		Timestamp(chrono::Utc::now().timestamp_millis())
	}

	pub const fn millis(self) -> i64 {
		self.0
	}

	/// Whole seconds since the Unix epoch (used in response headers).
	pub const fn epoch_secs(self) -> i64 {
		self.0 / 1000
	}

	/// Milliseconds elapsed since `earlier`. Negative if `earlier` is in the future.
	pub const fn since(self, earlier: Timestamp) -> i64 {
		self.0 - earlier.0
	}
}

impl Add<Duration> for Timestamp {
	type Output = Timestamp;

	fn add(self, rhs: Duration) -> Timestamp {
		Timestamp(self.0.saturating_add(duration_millis(rhs)))
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A `Duration` as milliseconds, saturating at `i64::MAX`.
pub const fn duration_millis(d: Duration) -> i64 {
	let ms = d.as_millis();
	if ms > i64::MAX as u128 { i64::MAX } else { ms as i64 }
}


// vim: ts=4
