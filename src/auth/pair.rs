//! Access/refresh token pair as issued by the sign-in and reissue endpoints.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Token pair returned by the authentication endpoints.
///
/// The reissue endpoint may omit `refreshToken`; in that case the previously stored refresh
/// token stays valid and [`TokenPair::or_refresh`] carries it over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
	/// Short-lived bearer credential for ordinary API calls.
	pub access_token: TokenSecret,
	/// Longer-lived credential accepted only by the reissue endpoint.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
}
impl TokenPair {
	/// Creates a pair carrying both tokens.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: Some(TokenSecret::new(refresh_token)),
		}
	}

	/// Creates a pair that only carries an access token.
	pub fn access_only(access_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access_token), refresh_token: None }
	}

	/// Fills a missing refresh token with `previous`.
	pub fn or_refresh(mut self, previous: Option<TokenSecret>) -> Self {
		if self.refresh_token.is_none() {
			self.refresh_token = previous;
		}

		self
	}
}
