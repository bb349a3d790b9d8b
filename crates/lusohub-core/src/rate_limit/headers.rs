//! Rate Limit Response Headers
//!
//! Maps a [`Decision`] to the conventional quota headers. Pure formatting,
//! no limiter state involved.

use axum::http::HeaderMap;

use super::limiter::Decision;

/// Build the standard rate limit headers for a decision: limit, remaining,
/// reset (epoch seconds) and, on blocked denials, `Retry-After`.
pub fn create_headers(decision: &Decision) -> HeaderMap {
	let mut headers = HeaderMap::new();

	if let Ok(val) = decision.limit.to_string().parse() {
		headers.insert("X-RateLimit-Limit", val);
	}
	if let Ok(val) = decision.remaining.to_string().parse() {
		headers.insert("X-RateLimit-Remaining", val);
	}
	if let Ok(val) = decision.reset_at.epoch_secs().to_string().parse() {
		headers.insert("X-RateLimit-Reset", val);
	}
	if let Some(retry_after) = decision.retry_after {
		if let Ok(val) = retry_after.to_string().parse() {
			headers.insert("Retry-After", val);
		}
	}

	headers
}


// vim: ts=4
