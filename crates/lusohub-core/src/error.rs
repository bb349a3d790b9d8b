//! Crate error type

pub type LhResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// Invalid configuration detected at load time
	Config(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::Config(msg) => write!(f, "configuration error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Config(_) => None,
			Error::Io(err) => Some(err),
		}
	}
}

// vim: ts=4
