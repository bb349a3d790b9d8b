//! Rate Limiting System
//!
//! Per-endpoint sliding-window rate limiting with progressive blocking for
//! the community platform's public API. Requests are counted per
//! (identifier, endpoint) pair within a configurable window; community
//! membership, trust level and location adjust the effective quota, and
//! repeat offenders are blocked with exponentially growing cool-downs.
//!
//! The limiter is process-local, in-memory state owned by a single
//! [`RateLimiter`] instance. Deployments with multiple application instances
//! would need to move the record table into a shared store; that is a
//! deployment concern layered on top of this module, not part of it.

mod config;
mod context;
mod error;
mod extract;
mod headers;
mod limiter;
mod middleware;

pub use config::{EndpointLimit, RateLimitConfig, RateLimitOverrides};
pub use context::{Location, TrustLevel, UserContext};
pub use error::RateLimitRejection;
pub use extract::{client_identifier, user_context, UNKNOWN_IDENTIFIER};
pub use headers::create_headers;
pub use limiter::{Decision, RateLimiter, RateLimiterStats, ViolationSeverity};
pub use middleware::RateLimitLayer;

// vim: ts=4
