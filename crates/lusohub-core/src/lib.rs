//! Core infrastructure for the LusoHub community platform.
//!
//! This crate contains the shared infrastructure used by the server crate,
//! most importantly the per-endpoint rate limiting subsystem. Keeping it in a
//! separate crate gives the server and future feature crates a clear module
//! boundary and better build parallelism.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod error;
pub mod prelude;
pub mod rate_limit;
pub mod types;

// Re-export commonly used types
pub use rate_limit::{
	Decision, RateLimitConfig, RateLimitLayer, RateLimiter, RateLimiterStats, UserContext,
};
pub use types::Timestamp;

// vim: ts=4
