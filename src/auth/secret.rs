//! Bearer token material that never prints itself.

// self
use crate::_prelude::*;

/// One access or refresh token.
///
/// `Debug` and `Display` only reveal the length; use [`TokenSecret::preview`] for log fields and
/// [`TokenSecret::expose`] when the raw value has to go on the wire.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	const PREVIEW_LEN: usize = 10;

	/// Wraps a token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Raw token value.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Leading characters of the token followed by `...`.
	pub fn preview(&self) -> String {
		let head: String = self.0.chars().take(Self::PREVIEW_LEN).collect();

		format!("{head}...")
	}

	/// `Authorization` header value for this token.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret(<{} chars>)", self.0.chars().count())
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "<token: {} chars>", self.0.chars().count())
	}
}
