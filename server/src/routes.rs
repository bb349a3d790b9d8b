//! Route table
//!
//! Public API surface of the host: a health probe and the rate limiter's
//! operational statistics. Feature routers (events, directory, matching)
//! mount next to these and share the same rate limit layer.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use lusohub_core::rate_limit::{RateLimitLayer, RateLimiterStats};

use crate::app::VERSION;
use crate::prelude::*;

pub fn router(app: App) -> Router {
	Router::new()
		.route("/api/health", get(health))
		.route("/api/rate-limit/stats", get(rate_limit_stats))
		.layer(RateLimitLayer::new(app.rate_limiter.clone()))
		.layer(TraceLayer::new_for_http())
		.with_state(app)
}

async fn health() -> impl IntoResponse {
	Json(serde_json::json!({ "status": "ok", "version": VERSION }))
}

async fn rate_limit_stats(State(app): State<App>) -> Json<RateLimiterStats> {
	Json(app.rate_limiter.statistics())
}

// vim: ts=4
