//! Identifier and Context Extraction
//!
//! Adapter between the HTTP layer and the limiter: derives the client
//! identifier from forwarding headers and the user context from
//! classification headers, applying explicit defaults so the limiter always
//! receives fully-populated values.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use hyper::Request;

use super::context::{Location, TrustLevel, UserContext};

/// Sentinel identifier shared by all requests whose origin could not be
/// determined. They are rate limited as a single bucket rather than
/// bypassing limiting.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// Derive the client identifier: first entry of `X-Forwarded-For`, then
/// `X-Real-Ip`, then the peer address, then the `"unknown"` sentinel.
pub fn client_identifier<B>(req: &Request<B>) -> String {
	forwarded_for(req)
		.or_else(|| real_ip(req))
		.or_else(|| peer_addr(req))
		.unwrap_or_else(|| UNKNOWN_IDENTIFIER.to_string())
}

/// First (leftmost) entry of X-Forwarded-For: "client, proxy1, proxy2"
fn forwarded_for<B>(req: &Request<B>) -> Option<String> {
	req.headers()
		.get("x-forwarded-for")
		.and_then(|h| h.to_str().ok())
		.and_then(|s| s.split(',').next())
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(str::to_string)
}

fn real_ip<B>(req: &Request<B>) -> Option<String> {
	req.headers()
		.get("x-real-ip")
		.and_then(|h| h.to_str().ok())
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(str::to_string)
}

fn peer_addr<B>(req: &Request<B>) -> Option<String> {
	req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0.ip().to_string())
}

/// Derive the user context from classification headers, with explicit
/// defaults for everything absent. When no membership flag is present, a
/// Portuguese `Accept-Language` counts as a weak community signal.
pub fn user_context<B>(req: &Request<B>) -> UserContext {
	let member_flag = req
		.headers()
		.get("x-community-member")
		.and_then(|h| h.to_str().ok())
		.map(|s| matches!(s.trim(), "1" | "true" | "yes"));

	let trust = req
		.headers()
		.get("x-trust-level")
		.and_then(|h| h.to_str().ok())
		.and_then(TrustLevel::parse)
		.unwrap_or_default();

	let location = req
		.headers()
		.get("x-user-location")
		.and_then(|h| h.to_str().ok())
		.and_then(Location::parse)
		.unwrap_or_default();

	let is_community_member = member_flag.unwrap_or_else(|| accepts_portuguese(req));

	UserContext { is_community_member, trust, location }
}

/// True when Accept-Language carries a Portuguese tag (pt, pt-PT, pt-BR).
fn accepts_portuguese<B>(req: &Request<B>) -> bool {
	req.headers()
		.get("accept-language")
		.and_then(|h| h.to_str().ok())
		.is_some_and(|value| {
			value.split(',').any(|entry| {
				let tag = entry.split(';').next().unwrap_or("").trim();
				tag.eq_ignore_ascii_case("pt")
					|| tag.to_ascii_lowercase().starts_with("pt-")
			})
		})
}


// vim: ts=4
