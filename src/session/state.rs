//! Observable session state for UI layers.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	session::{LogoutReason, SessionObserver},
};

/// Point-in-time view of the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
	/// Whether a session is established.
	pub authenticated: bool,
	/// Access token of the established session.
	#[serde(skip_serializing)]
	pub access_token: Option<TokenSecret>,
	/// `true` until the stored session has been inspected.
	pub loading: bool,
	/// Reason of the most recent logout.
	pub last_logout: Option<LogoutReason>,
	/// When the snapshot last changed.
	#[serde(with = "time::serde::timestamp")]
	pub changed_at: OffsetDateTime,
}
impl Default for SessionSnapshot {
	fn default() -> Self {
		Self {
			authenticated: false,
			access_token: None,
			loading: true,
			last_logout: None,
			changed_at: OffsetDateTime::now_utc(),
		}
	}
}

/// [`SessionObserver`] that keeps the latest [`SessionSnapshot`].
#[derive(Debug, Default)]
pub struct SessionState(RwLock<SessionSnapshot>);
impl SessionState {
	/// Returns a copy of the current snapshot.
	pub fn snapshot(&self) -> SessionSnapshot {
		self.0.read().clone()
	}

	/// Whether a session is established.
	pub fn is_authenticated(&self) -> bool {
		self.0.read().authenticated
	}

	/// Whether the stored session has not been inspected yet.
	pub fn is_loading(&self) -> bool {
		self.0.read().loading
	}
}
impl SessionObserver for SessionState {
	fn notify_logged_in(&self, access: &TokenSecret) {
		let mut snapshot = self.0.write();

		snapshot.authenticated = true;
		snapshot.access_token = Some(access.clone());
		snapshot.loading = false;
		snapshot.changed_at = OffsetDateTime::now_utc();
	}

	fn notify_logged_out(&self, reason: &LogoutReason) {
		let mut snapshot = self.0.write();

		snapshot.authenticated = false;
		snapshot.access_token = None;
		snapshot.loading = false;
		snapshot.last_logout = Some(*reason);
		snapshot.changed_at = OffsetDateTime::now_utc();
	}
}
