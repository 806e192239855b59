//! Thread-safe in-memory [`CredentialStore`] for tests and short-lived processes.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	store::{CredentialKey, CredentialStore},
};

/// Storage backend that keeps both credential slots in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<HashMap<CredentialKey, TokenSecret>>>);
impl CredentialStore for MemoryStore {
	fn get(&self, key: CredentialKey) -> Option<TokenSecret> {
		self.0.read().get(&key).cloned()
	}

	fn set(&self, key: CredentialKey, token: TokenSecret) {
		self.0.write().insert(key, token);
	}

	fn remove(&self, key: CredentialKey) {
		self.0.write().remove(&key);
	}

	fn clear(&self) {
		let mut guard = self.0.write();

		for key in CredentialKey::ALL {
			guard.remove(&key);
		}
	}
}
