//! Requester Classification
//!
//! Fully-populated user context attached to every rate limit check. The
//! extraction adapter applies the defaults, so the limiter itself never has
//! to branch on missing fields.

/// Trust tier of the requester, affecting the quota multiplier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrustLevel {
	/// Recently registered or anonymous requester (penalized multiplier)
	#[default]
	New,
	/// Established account in good standing
	Trusted,
	/// Identity-verified account
	Verified,
}

impl TrustLevel {
	/// Parse a header value. Unknown values map to `None`.
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"new" => Some(TrustLevel::New),
			"trusted" => Some(TrustLevel::Trusted),
			"verified" => Some(TrustLevel::Verified),
			_ => None,
		}
	}
}

/// Coarse location category of the requester.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Location {
	Uk,
	Portugal,
	Brazil,
	#[default]
	Other,
}

impl Location {
	/// Parse a header value. Unknown values map to `None`.
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"uk" => Some(Location::Uk),
			"portugal" => Some(Location::Portugal),
			"brazil" => Some(Location::Brazil),
			"other" => Some(Location::Other),
			_ => None,
		}
	}
}

/// Classification of a requester used to compute the effective quota.
///
/// Defaults to the unauthenticated baseline: not a community member, `New`
/// trust, `Other` location. Because the effective limit is floored at the
/// configured base, the default context never performs worse than an
/// entirely unclassified requester.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserContext {
	pub is_community_member: bool,
	pub trust: TrustLevel,
	pub location: Location,
}


// vim: ts=4
