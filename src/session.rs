//! Session observers, login navigation, and the forced-logout handler.

pub mod state;

pub use state::{SessionSnapshot, SessionState};

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	obs::{self, FlowKind, FlowOutcome},
	store::CredentialStore,
};

/// Receives session transitions (UI state stores, audit hooks).
pub trait SessionObserver
where
	Self: Send + Sync,
{
	/// A session was established or restored with `access`.
	fn notify_logged_in(&self, access: &TokenSecret);

	/// The session ended for `reason`.
	fn notify_logged_out(&self, reason: &LogoutReason);
}

/// Sends the user back to the login entry point.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Navigates to the login screen.
	fn go_to_login(&self);
}
impl<F> Navigator for F
where
	F: Fn() + Send + Sync,
{
	fn go_to_login(&self) {
		self()
	}
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogoutReason {
	/// The reissue endpoint rejected the refresh token.
	SessionExpired,
	/// A reissue was needed but no refresh token was stored.
	MissingRefreshToken,
	/// The user logged out explicitly.
	UserRequested,
	/// No stored session was found at startup.
	Initialization,
}
impl LogoutReason {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LogoutReason::SessionExpired => "session_expired",
			LogoutReason::MissingRefreshToken => "missing_refresh_token",
			LogoutReason::UserRequested => "user_requested",
			LogoutReason::Initialization => "initialization",
		}
	}

	/// User-facing notice for logouts the user did not ask for.
	pub const fn notice(self) -> Option<&'static str> {
		match self {
			LogoutReason::SessionExpired | LogoutReason::MissingRefreshToken =>
				Some("Your session has expired. Please sign in again."),
			LogoutReason::UserRequested | LogoutReason::Initialization => None,
		}
	}

	/// Returns `true` when the logout was not initiated by the user.
	pub const fn is_forced(self) -> bool {
		matches!(self, LogoutReason::SessionExpired | LogoutReason::MissingRefreshToken)
	}
}
impl Display for LogoutReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Clears the credential store and announces the logout exactly once per session.
pub struct LogoutHandler {
	store: Arc<dyn CredentialStore>,
	observer: Option<Arc<dyn SessionObserver>>,
	navigator: Arc<dyn Navigator>,
	gate: Mutex<()>,
}
impl LogoutHandler {
	/// Creates a handler that clears `store` and navigates through `navigator`.
	pub fn new(store: Arc<dyn CredentialStore>, navigator: Arc<dyn Navigator>) -> Self {
		Self { store, observer: None, navigator, gate: Mutex::new(()) }
	}

	/// Registers the observer notified on every session transition.
	pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
		self.observer = Some(observer);

		self
	}

	/// Store cleared by this handler.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Ends the session if it still holds credentials.
	///
	/// Returns `false` when the store was already empty, in which case neither the observer
	/// nor the navigator is invoked. Concurrent callers clear the store once.
	pub fn force_logout(&self, reason: LogoutReason) -> bool {
		{
			let _gate = self.gate.lock();

			if self.store.is_empty() {
				trace_event!(debug, reason = reason.as_str(), "Session already cleared.");

				return false;
			}

			self.store.clear();
		}

		obs::record_flow_outcome(FlowKind::Logout, FlowOutcome::Success);
		self.announce(reason);

		true
	}

	/// Ends the session unconditionally, announcing it even when the store was empty.
	pub fn logout(&self, reason: LogoutReason) {
		{
			let _gate = self.gate.lock();

			self.store.clear();
		}

		self.announce(reason);
	}

	/// Tells the observer a session was established with `access`.
	pub fn notify_logged_in(&self, access: &TokenSecret) {
		trace_event!(info, token = %access.preview(), "Session established.");

		if let Some(observer) = &self.observer {
			observer.notify_logged_in(access);
		}
	}

	/// Tells the observer no session exists, without navigating.
	pub fn notify_logged_out(&self, reason: LogoutReason) {
		if let Some(observer) = &self.observer {
			observer.notify_logged_out(&reason);
		}
	}

	fn announce(&self, reason: LogoutReason) {
		match reason.notice() {
			Some(_notice) => trace_event!(warn, reason = reason.as_str(), "{_notice}"),
			None => trace_event!(info, reason = reason.as_str(), "Session ended."),
		}

		self.notify_logged_out(reason);
		self.navigator.go_to_login();
	}
}
impl Debug for LogoutHandler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LogoutHandler")
			.field("observed", &self.observer.is_some())
			.field("empty", &self.store.is_empty())
			.finish()
	}
}
