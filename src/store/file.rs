//! File-backed [`CredentialStore`] that survives process restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	store::{CredentialKey, CredentialStore, StoreError},
};

type Snapshot = BTreeMap<CredentialKey, TokenSecret>;

/// Persists both credential slots to a JSON file after each mutation.
///
/// Opening the store is the only fallible step. Later write failures (full disk, revoked
/// permissions) are logged and swallowed; the in-memory view keeps serving reads.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(Snapshot::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &Snapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credential snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn mutate(&self, op: impl FnOnce(&mut Snapshot) -> bool) {
		let mut guard = self.inner.write();

		if !op(&mut *guard) {
			return;
		}
		if let Err(_e) = self.persist_locked(&guard) {
			trace_event!(
				warn,
				error = %_e,
				path = %self.path.display(),
				"Credential write kept in memory only."
			);
		}
	}
}
impl CredentialStore for FileStore {
	fn get(&self, key: CredentialKey) -> Option<TokenSecret> {
		self.inner.read().get(&key).cloned()
	}

	fn set(&self, key: CredentialKey, token: TokenSecret) {
		self.mutate(|snapshot| {
			snapshot.insert(key, token);

			true
		});
	}

	fn remove(&self, key: CredentialKey) {
		self.mutate(|snapshot| snapshot.remove(&key).is_some());
	}

	fn clear(&self) {
		self.mutate(|snapshot| {
			let had_any = !snapshot.is_empty();

			snapshot.clear();

			had_any
		});
	}
}
