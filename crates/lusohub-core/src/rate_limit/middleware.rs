//! Rate Limiting Middleware
//!
//! Tower middleware layer applying the limiter to axum routes. Denials are
//! short-circuited into a 429 response; allowed responses are stamped with
//! the quota headers.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::IntoResponse;
use futures::future::BoxFuture;
use hyper::Request;
use tower::{Layer, Service};

use super::error::RateLimitRejection;
use super::extract::{client_identifier, user_context};
use super::headers::create_headers;
use super::limiter::RateLimiter;

/// Rate limit middleware layer
#[derive(Clone)]
pub struct RateLimitLayer {
	limiter: Arc<RateLimiter>,
}

impl RateLimitLayer {
	pub fn new(limiter: Arc<RateLimiter>) -> Self {
		Self { limiter }
	}
}

impl<S> Layer<S> for RateLimitLayer {
	type Service = RateLimitService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		RateLimitService { inner, limiter: self.limiter.clone() }
	}
}

/// Rate limit middleware service
#[derive(Clone)]
pub struct RateLimitService<S> {
	inner: S,
	limiter: Arc<RateLimiter>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
	S: Service<Request<Body>, Response = axum::response::Response> + Clone + Send + 'static,
	S::Future: Send + 'static,
{
	type Response = S::Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		let limiter = self.limiter.clone();
		let mut inner = self.inner.clone();

		Box::pin(async move {
			let identifier = client_identifier(&req);
			let context = user_context(&req);
			let endpoint = req.uri().path().to_string();

			let decision = limiter.check(&identifier, &endpoint, context);
			if !decision.allowed {
				return Ok(RateLimitRejection::new(decision).into_response());
			}

			let mut response = inner.call(req).await?;
			response.headers_mut().extend(create_headers(&decision));
			Ok(response)
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::convert::Infallible;
	use std::time::Duration;

	use axum::http::StatusCode;
	use axum::response::Response;
	use tower::ServiceExt;

	use crate::rate_limit::RateLimitConfig;

	fn limiter(max_requests: u32) -> Arc<RateLimiter> {
		let config = RateLimitConfig {
			max_requests,
			window: Duration::from_secs(60),
			endpoints: std::collections::HashMap::new(),
			..RateLimitConfig::default()
		};
		Arc::new(RateLimiter::new(config))
	}

	async fn ok_handler(_req: Request<Body>) -> Result<Response, Infallible> {
		Ok(StatusCode::OK.into_response())
	}

	fn request(ip: &str) -> Request<Body> {
		Request::builder()
			.uri("/api/events")
			.header("x-forwarded-for", ip)
			.body(Body::empty())
			.unwrap()
	}

	#[tokio::test]
	async fn allowed_responses_carry_quota_headers() {
		let layer = RateLimitLayer::new(limiter(5));

		let response = layer.layer(tower::service_fn(ok_handler)).oneshot(request("203.0.113.9")).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(
			response.headers().get("X-RateLimit-Remaining").and_then(|v| v.to_str().ok()),
			Some("4")
		);
	}

	#[tokio::test]
	async fn over_quota_requests_get_429() {
		let layer = RateLimitLayer::new(limiter(2));

		for _ in 0..2 {
			let response = layer.layer(tower::service_fn(ok_handler)).oneshot(request("203.0.113.9")).await.unwrap();
			assert_eq!(response.status(), StatusCode::OK);
		}

		let response = layer.layer(tower::service_fn(ok_handler)).oneshot(request("203.0.113.9")).await.unwrap();
		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(
			response.headers().get("Retry-After").and_then(|v| v.to_str().ok()),
			Some("60")
		);
	}

	#[tokio::test]
	async fn identifiers_are_limited_independently() {
		let layer = RateLimitLayer::new(limiter(1));

		let first = layer.layer(tower::service_fn(ok_handler)).oneshot(request("203.0.113.9")).await.unwrap();
		assert_eq!(first.status(), StatusCode::OK);

		let other = layer.layer(tower::service_fn(ok_handler)).oneshot(request("198.51.100.7")).await.unwrap();
		assert_eq!(other.status(), StatusCode::OK);
	}
}

// vim: ts=4
