//! Rate Limit Rejection Response
//!
//! HTTP shape of a denied decision: 429 with a severity-tiered message,
//! machine-readable details and the standard quota headers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::headers::create_headers;
use super::limiter::Decision;

/// A denied rate limit decision, convertible into an HTTP response.
#[derive(Debug)]
pub struct RateLimitRejection {
	decision: Decision,
}

impl RateLimitRejection {
	pub fn new(decision: Decision) -> Self {
		Self { decision }
	}
}

impl IntoResponse for RateLimitRejection {
	fn into_response(self) -> Response {
		let body = serde_json::json!({
			"error": {
				"code": "E-RATE-LIMITED",
				"message": self.decision.reason().unwrap_or("Too many requests."),
				"details": {
					"retryAfter": self.decision.retry_after,
					"reset": self.decision.reset_at.epoch_secs()
				}
			}
		});

		let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
		response.headers_mut().extend(create_headers(&self.decision));
		response
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rate_limit::{RateLimitConfig, RateLimiter, UserContext};
	use crate::types::Timestamp;

	#[test]
	fn rejection_carries_status_and_headers() {
		let limiter = RateLimiter::new(RateLimitConfig::default());
		for t in 0..5 {
			limiter.check_at(Timestamp(t * 100), "203.0.113.9", "/api/auth/login", UserContext::default());
		}
		let denied =
			limiter.check_at(Timestamp(500), "203.0.113.9", "/api/auth/login", UserContext::default());
		assert!(!denied.allowed);

		let response = RateLimitRejection::new(denied).into_response();
		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(
			response.headers().get("Retry-After").and_then(|v| v.to_str().ok()),
			Some("60")
		);
		assert!(response.headers().contains_key("X-RateLimit-Limit"));
	}
}

// vim: ts=4
