//! Persistent credential storage: the two-slot access/refresh record and its backends.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
};

/// Slot names under which credentials are persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CredentialKey {
	/// Short-lived access token slot.
	#[serde(rename = "accessToken")]
	AccessToken,
	/// Refresh token slot.
	#[serde(rename = "refreshToken")]
	RefreshToken,
}
impl CredentialKey {
	/// Both slots, in the order `clear` removes them.
	pub const ALL: [CredentialKey; 2] = [CredentialKey::AccessToken, CredentialKey::RefreshToken];

	/// Returns the persisted key name.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKey::AccessToken => "accessToken",
			CredentialKey::RefreshToken => "refreshToken",
		}
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Synchronous key-value contract for the persistent credential record.
///
/// Reads are side-effect free and writes overwrite unconditionally. Implementations never
/// fail once constructed: a backend that cannot persist a write logs the failure and keeps
/// serving the in-process view, so the session degrades instead of crashing the client.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the token stored under `key`, if any.
	fn get(&self, key: CredentialKey) -> Option<TokenSecret>;

	/// Stores `token` under `key`, replacing any previous value.
	fn set(&self, key: CredentialKey, token: TokenSecret);

	/// Removes the token stored under `key`.
	fn remove(&self, key: CredentialKey);

	/// Removes both slots as one operation. Calling it on an empty store is a no-op.
	fn clear(&self);

	/// Current access token.
	fn access(&self) -> Option<TokenSecret> {
		self.get(CredentialKey::AccessToken)
	}

	/// Current refresh token.
	fn refresh(&self) -> Option<TokenSecret> {
		self.get(CredentialKey::RefreshToken)
	}

	/// Overwrites the access token.
	fn set_access(&self, token: TokenSecret) {
		self.set(CredentialKey::AccessToken, token);
	}

	/// Overwrites the refresh token.
	fn set_refresh(&self, token: TokenSecret) {
		self.set(CredentialKey::RefreshToken, token);
	}

	/// Writes the access token and, when supplied, the refresh token.
	fn save_pair(&self, pair: &TokenPair) {
		self.set_access(pair.access_token.clone());

		if let Some(refresh) = &pair.refresh_token {
			self.set_refresh(refresh.clone());
		}
	}

	/// Returns `true` when neither slot holds a token.
	fn is_empty(&self) -> bool {
		CredentialKey::ALL.iter().all(|key| self.get(*key).is_none())
	}
}

/// Error type produced while opening a [`CredentialStore`] backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
