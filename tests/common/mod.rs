//! Shared fixtures for integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use parking_lot::Mutex;
use tokio::sync::Semaphore;
// self
use bearer_session::{
	auth::{TokenPair, TokenSecret},
	client::SessionClient,
	config::ClientConfig,
	error::TransportError,
	http::{ApiResponse, HttpTransport, OutboundRequest, TransportFuture},
	session::{LogoutReason, Navigator, SessionObserver},
	store::{CredentialStore, MemoryStore},
	url::Url,
};

/// Session transition captured by [`RecordingObserver`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
	LoggedIn(String),
	LoggedOut(LogoutReason),
}

/// Observer that records every transition in order.
#[derive(Debug, Default)]
pub struct RecordingObserver(Mutex<Vec<SessionEvent>>);
impl RecordingObserver {
	pub fn events(&self) -> Vec<SessionEvent> {
		self.0.lock().clone()
	}

	pub fn logouts(&self) -> usize {
		self.0.lock().iter().filter(|event| matches!(event, SessionEvent::LoggedOut(_))).count()
	}
}
impl SessionObserver for RecordingObserver {
	fn notify_logged_in(&self, access: &TokenSecret) {
		self.0.lock().push(SessionEvent::LoggedIn(access.expose().to_owned()));
	}

	fn notify_logged_out(&self, reason: &LogoutReason) {
		self.0.lock().push(SessionEvent::LoggedOut(*reason));
	}
}

/// Navigator that counts login redirects.
#[derive(Debug, Default)]
pub struct RecordingNavigator(AtomicUsize);
impl RecordingNavigator {
	pub fn count(&self) -> usize {
		self.0.load(Ordering::SeqCst)
	}
}
impl Navigator for RecordingNavigator {
	fn go_to_login(&self) {
		self.0.fetch_add(1, Ordering::SeqCst);
	}
}

/// A client plus handles to everything it reports to.
pub struct Harness<C>
where
	C: ?Sized + HttpTransport,
{
	pub client: SessionClient<C>,
	pub store: Arc<MemoryStore>,
	pub observer: Arc<RecordingObserver>,
	pub navigator: Arc<RecordingNavigator>,
}
impl<C> Harness<C>
where
	C: ?Sized + HttpTransport,
{
	pub fn new(config: ClientConfig, transport: Arc<C>) -> Self {
		let store = Arc::new(MemoryStore::default());
		let observer = Arc::new(RecordingObserver::default());
		let navigator = Arc::new(RecordingNavigator::default());
		let client = SessionClient::with_transport(
			config,
			transport,
			store.clone(),
			observer.clone(),
			navigator.clone(),
		)
		.expect("Test configuration should build a client.");

		Self { client, store, observer, navigator }
	}

	pub fn seed(self, access: &str, refresh: Option<&str>) -> Self {
		match refresh {
			Some(refresh) => self.store.save_pair(&TokenPair::new(access, refresh)),
			None => self.store.set_access(TokenSecret::new(access)),
		}

		self
	}

	pub fn access(&self) -> Option<String> {
		self.store.access().map(|token| token.expose().to_owned())
	}

	pub fn refresh(&self) -> Option<String> {
		self.store.refresh().map(|token| token.expose().to_owned())
	}
}

/// Configuration whose base URL points at `base`.
pub fn config_for(base: &str) -> ClientConfig {
	ClientConfig::new(Url::parse(base).expect("Mock server URL should parse."))
}

/// Reqwest-backed harness talking to an `httpmock` server.
#[cfg(feature = "reqwest")]
pub fn reqwest_harness(
	server: &httpmock::MockServer,
) -> Harness<bearer_session::http::ReqwestTransport> {
	reqwest_harness_with(server, |config| config)
}

/// Reqwest-backed harness with a customized configuration.
#[cfg(feature = "reqwest")]
pub fn reqwest_harness_with(
	server: &httpmock::MockServer,
	customize: impl FnOnce(ClientConfig) -> ClientConfig,
) -> Harness<bearer_session::http::ReqwestTransport> {
	let config = customize(config_for(&server.base_url()));
	let transport = bearer_session::http::ReqwestTransport::from_config(&config)
		.expect("Reqwest transport should build.");

	Harness::new(config, Arc::new(transport))
}

/// In-process API whose reissue endpoint blocks until the test opens the gate.
///
/// Access-scoped paths answer `200` for `Bearer <current>` and `403` otherwise; the reissue
/// endpoint issues `next` and makes it current.
#[derive(Debug)]
pub struct GatedTransport {
	reissue_path: String,
	current: Mutex<String>,
	next: String,
	gate: Semaphore,
	reissues: AtomicUsize,
	seen: Mutex<Vec<(String, Option<String>)>>,
}
impl GatedTransport {
	pub fn new(current: &str, next: &str) -> Self {
		Self {
			reissue_path: ClientConfig::DEFAULT_REISSUE_PATH.into(),
			current: Mutex::new(current.into()),
			next: next.into(),
			gate: Semaphore::new(0),
			reissues: AtomicUsize::new(0),
			seen: Mutex::new(Vec::new()),
		}
	}

	pub fn open(&self) {
		self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
	}

	pub fn reissues(&self) -> usize {
		self.reissues.load(Ordering::SeqCst)
	}

	/// Authorization headers seen per path.
	pub fn seen(&self) -> HashMap<String, Vec<Option<String>>> {
		let mut by_path: HashMap<String, Vec<Option<String>>> = HashMap::new();

		for (path, auth) in self.seen.lock().iter() {
			by_path.entry(path.clone()).or_default().push(auth.clone());
		}

		by_path
	}
}
impl HttpTransport for GatedTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let path = request.url.path().to_owned();
			let auth = request.authorization().map(str::to_owned);

			self.seen.lock().push((path.clone(), auth.clone()));

			if path == self.reissue_path {
				self.reissues.fetch_add(1, Ordering::SeqCst);

				let _permit = self.gate.acquire().await.map_err(|e| {
					TransportError::network(&request.url, std::io::Error::other(e.to_string()))
				})?;

				*self.current.lock() = self.next.clone();

				return Ok(ApiResponse::new(
					200,
					format!("{{\"accessToken\":\"{}\"}}", self.next),
				));
			}

			let expected = format!("Bearer {}", self.current.lock());

			if auth.as_deref() == Some(expected.as_str()) {
				Ok(ApiResponse::new(200, "{\"ok\":true}"))
			} else {
				Ok(ApiResponse::new(403, "{\"message\":\"expired\"}"))
			}
		})
	}
}
