//! Reissue orchestration with a single-flight slot, one-shot replay, and forced logout.
//!
//! Every access-role dispatcher of a session shares one [`ReissueCoordinator`]. When a call
//! comes back with the expiry status, the coordinator marks the call as retried, joins (or
//! starts) the one in-flight refresh-token exchange, and replays the call once with the
//! reissued access token. Concurrent expiries coalesce into a single `POST` against the
//! reissue endpoint; a rejected refresh token clears the session exactly once through the
//! [`LogoutHandler`].

mod metrics;

pub use metrics::ReissueMetrics;

// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
	config::{ClientConfig, MissingRefreshPolicy},
	dispatch::{ApiRequest, CallState, Dispatcher, LogicalCall},
	http::{ApiResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::{LogoutHandler, LogoutReason},
	store::CredentialStore,
};

type ExchangeCell = Arc<AsyncOnceCell<ReissueOutcome>>;

/// Result of one refresh-token exchange, shared by every call that waited on it.
#[derive(Clone, Debug)]
pub enum ReissueOutcome {
	/// The server issued a new pair; the refresh token is carried over when omitted.
	Reissued(TokenPair),
	/// No refresh token was stored, so the server was not contacted.
	NoRefreshToken,
	/// The reissue endpoint rejected the refresh token.
	RefreshRejected {
		/// Status returned by the reissue endpoint.
		status: u16,
	},
	/// The exchange failed for any other reason.
	TransportError(Arc<Error>),
}
impl ReissueOutcome {
	/// Returns `true` for [`ReissueOutcome::Reissued`].
	pub fn is_reissued(&self) -> bool {
		matches!(self, Self::Reissued(_))
	}

	/// Converts the outcome into the pair it carries or the matching client error.
	pub fn into_result(self) -> Result<TokenPair> {
		match self {
			Self::Reissued(pair) => Ok(pair),
			Self::NoRefreshToken => Err(Error::NoRefreshToken),
			Self::RefreshRejected { status } => Err(Error::RefreshRejected { status }),
			Self::TransportError(source) => Err(Error::Reissue { source }),
		}
	}
}

/// Shared protocol engine that turns expiry responses into reissue + replay.
pub struct ReissueCoordinator<C>
where
	C: ?Sized + HttpTransport,
{
	refresh: Dispatcher<C>,
	logout: Arc<LogoutHandler>,
	inflight: Mutex<Option<ExchangeCell>>,
	metrics: Arc<ReissueMetrics>,
}
impl<C> ReissueCoordinator<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a coordinator that exchanges refresh tokens through `refresh`.
	///
	/// `refresh` must use [`CredentialRole::Refresh`](crate::dispatch::CredentialRole::Refresh);
	/// its store and configuration are the ones the coordinator reads and writes.
	pub fn new(refresh: Dispatcher<C>, logout: Arc<LogoutHandler>) -> Self {
		Self {
			refresh,
			logout,
			inflight: Mutex::new(None),
			metrics: Arc::new(ReissueMetrics::default()),
		}
	}

	/// Counters describing reissue activity.
	pub fn metrics(&self) -> &Arc<ReissueMetrics> {
		&self.metrics
	}

	/// Dispatcher used for the refresh-token exchange.
	pub fn refresh_dispatcher(&self) -> &Dispatcher<C> {
		&self.refresh
	}

	/// Forced-logout handler invoked on refresh-token rejection.
	pub fn logout_handler(&self) -> &Arc<LogoutHandler> {
		&self.logout
	}

	/// Returns `true` when `status` is the configured expiry signal.
	pub fn is_expiry(&self, status: u16) -> bool {
		self.config().is_expiry(status)
	}

	/// Returns `true` while a reissue exchange is pending.
	pub fn is_reissuing(&self) -> bool {
		self.inflight.lock().as_ref().is_some_and(|cell| !cell.is_initialized())
	}

	/// Handles `response` for `call`, which `dispatcher` just transmitted.
	///
	/// Non-expiry responses pass through untouched. The first expiry of a call triggers (or
	/// joins) a reissue and one replay through `dispatcher`; a second expiry fails with
	/// [`Error::SessionExpired`].
	pub async fn handle_expired(
		&self,
		dispatcher: &Dispatcher<C>,
		call: &mut LogicalCall,
		response: ApiResponse,
	) -> Result<ApiResponse> {
		if !self.is_expiry(response.status) {
			return Ok(response);
		}

		self.metrics.record_expiration();

		if !call.mark_retried() {
			return Err(self.expired_again(dispatcher, call, response.status));
		}

		call.transition(CallState::ExpiredRetrying);

		let token = match self.acquire_token(call.sent_with().cloned()).await {
			Ok(token) => token,
			Err(e) => {
				call.transition(CallState::Failed);
				self.metrics.record_failure();

				return Err(e);
			},
		};

		self.replay(dispatcher, call, token).await
	}

	/// Runs (or joins) a reissue exchange regardless of the stored access token.
	pub async fn reissue(&self) -> Result<TokenPair> {
		let cell = {
			let mut slot = self.inflight.lock();

			self.join_or_install(&mut slot)
		};

		self.settle(cell).await.into_result()
	}

	/// Produces the access token a call that expired with `sent_with` should be replayed with.
	///
	/// A pending exchange is always joined. Without one, a call whose token is no longer the
	/// stored one replays with the stored token directly.
	async fn acquire_token(&self, sent_with: Option<TokenSecret>) -> Result<TokenSecret> {
		let cell = {
			let mut slot = self.inflight.lock();
			let pending = slot.as_ref().filter(|cell| !cell.is_initialized()).cloned();

			match pending {
				Some(cell) => {
					self.metrics.record_coalesced();

					cell
				},
				None => {
					if let Some(current) = self.store().access() {
						if sent_with.as_ref() != Some(&current) {
							trace_event!(
								debug,
								token = %current.preview(),
								"Access token already reissued; replaying without an exchange."
							);
							self.metrics.record_shortcut();

							return Ok(current);
						}
					}

					self.join_or_install(&mut slot)
				},
			}
		};

		self.settle(cell).await.into_result().map(|pair| pair.access_token)
	}

	fn join_or_install(&self, slot: &mut Option<ExchangeCell>) -> ExchangeCell {
		if let Some(cell) = slot.as_ref() {
			// A settled cell is stale once its token expired too.
			if !cell.is_initialized() {
				self.metrics.record_coalesced();

				return cell.clone();
			}
		}

		let cell = Arc::new(AsyncOnceCell::new());

		*slot = Some(cell.clone());

		cell
	}

	async fn settle(&self, cell: ExchangeCell) -> ReissueOutcome {
		let outcome = cell.get_or_init(|| self.exchange()).await.clone();
		let mut slot = self.inflight.lock();

		if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &cell)) {
			*slot = None;
		}

		outcome
	}

	async fn exchange(&self) -> ReissueOutcome {
		const KIND: FlowKind = FlowKind::Reissue;

		let span = FlowSpan::new(KIND, "exchange");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_exchange();

		let outcome = span.instrument(self.run_exchange()).await;
		let flow_outcome =
			if outcome.is_reissued() { FlowOutcome::Success } else { FlowOutcome::Failure };

		span.record_outcome(flow_outcome);
		obs::record_flow_outcome(KIND, flow_outcome);

		outcome
	}

	async fn run_exchange(&self) -> ReissueOutcome {
		let config = self.config();
		let Some(refresh) = self.store().refresh() else {
			trace_event!(warn, "Reissue needed but no refresh token is stored.");

			if config.missing_refresh_policy == MissingRefreshPolicy::ForceLogout {
				self.force_logout(LogoutReason::MissingRefreshToken);
			}

			return ReissueOutcome::NoRefreshToken;
		};

		trace_event!(debug, token = %refresh.preview(), "Exchanging refresh token.");

		let mut call = match self.refresh.prepare(ApiRequest::post(config.reissue_path.as_str())) {
			Ok(request) => LogicalCall::new(request),
			Err(e) => return ReissueOutcome::TransportError(Arc::new(e)),
		};
		let response = match self.refresh.transmit_with(&mut call, Some(refresh.clone())).await {
			Ok(response) => response,
			Err(e) => return ReissueOutcome::TransportError(Arc::new(e)),
		};

		match response.status {
			200 | 201 => match response.json::<TokenPair>() {
				Ok(issued) => {
					self.store().save_pair(&issued);

					trace_event!(
						debug,
						token = %issued.access_token.preview(),
						rotated = issued.refresh_token.is_some(),
						"Access token reissued."
					);

					ReissueOutcome::Reissued(issued.or_refresh(Some(refresh)))
				},
				Err(e) => ReissueOutcome::TransportError(Arc::new(e)),
			},
			status if config.is_rejection(status) => {
				trace_event!(warn, status, "Refresh token rejected; forcing logout.");
				self.force_logout(LogoutReason::SessionExpired);

				ReissueOutcome::RefreshRejected { status }
			},
			status => {
				trace_event!(warn, status, "Reissue endpoint failed.");

				ReissueOutcome::TransportError(Arc::new(Error::UnexpectedStatus {
					status,
					body: response.body_preview(),
				}))
			},
		}
	}

	async fn replay(
		&self,
		dispatcher: &Dispatcher<C>,
		call: &mut LogicalCall,
		token: TokenSecret,
	) -> Result<ApiResponse> {
		self.metrics.record_replay();

		obs::observe(FlowKind::Replay, dispatcher.name(), async move {
			let response = match dispatcher.transmit_with(call, Some(token)).await {
				Ok(response) => response,
				Err(e) => {
					self.metrics.record_failure();

					return Err(e);
				},
			};

			if self.is_expiry(response.status) {
				return Err(self.expired_again(dispatcher, call, response.status));
			}

			Ok(response)
		})
		.await
	}

	/// Terminal handling for a call that already spent its one retry.
	fn expired_again(
		&self,
		dispatcher: &Dispatcher<C>,
		call: &mut LogicalCall,
		status: u16,
	) -> Error {
		trace_event!(
			warn,
			dispatcher = dispatcher.name(),
			status,
			"Replayed call expired again; giving up."
		);
		call.transition(CallState::Failed);
		self.metrics.record_failure();

		Error::SessionExpired { status }
	}

	fn force_logout(&self, reason: LogoutReason) {
		if self.logout.force_logout(reason) {
			self.metrics.record_forced_logout();
		}
	}

	fn config(&self) -> &ClientConfig {
		self.refresh.config()
	}

	fn store(&self) -> &Arc<dyn CredentialStore> {
		self.refresh.store()
	}
}
impl<C> Debug for ReissueCoordinator<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ReissueCoordinator")
			.field("refresh", &self.refresh)
			.field("reissuing", &self.is_reissuing())
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{collections::VecDeque, sync::atomic::AtomicUsize};
	// self
	use super::*;
	use crate::{
		dispatch::{CredentialRole, PayloadProfile},
		error::TransportError,
		http::{OutboundRequest, TransportFuture},
		session::Navigator,
		store::MemoryStore,
	};

	/// Answers each request from a per-path script and records what it saw.
	#[derive(Default)]
	struct ScriptedTransport {
		scripts: Mutex<HashMap<String, VecDeque<u16>>>,
		bodies: Mutex<HashMap<String, String>>,
		seen: Mutex<Vec<(String, Option<String>)>>,
	}
	impl ScriptedTransport {
		fn script(self, path: &str, statuses: &[u16]) -> Self {
			self.scripts.lock().insert(path.into(), statuses.iter().copied().collect());

			self
		}

		fn body(self, path: &str, body: &str) -> Self {
			self.bodies.lock().insert(path.into(), body.into());

			self
		}

		fn seen(&self, path: &str) -> Vec<Option<String>> {
			self.seen
				.lock()
				.iter()
				.filter(|(seen, _)| seen == path)
				.map(|(_, auth)| auth.clone())
				.collect()
		}
	}
	impl HttpTransport for ScriptedTransport {
		fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
			let path = request.url.path().to_owned();

			self.seen.lock().push((path.clone(), request.authorization().map(str::to_owned)));

			let status = self.scripts.lock().get_mut(&path).and_then(VecDeque::pop_front);
			let body = self.bodies.lock().get(&path).cloned().unwrap_or_default();

			Box::pin(async move {
				match status {
					Some(status) => Ok(ApiResponse::new(status, body)),
					None => Err(TransportError::Io(std::io::Error::other("unscripted"))),
				}
			})
		}
	}

	struct Harness {
		api: Dispatcher<ScriptedTransport>,
		coordinator: Arc<ReissueCoordinator<ScriptedTransport>>,
		transport: Arc<ScriptedTransport>,
		store: Arc<MemoryStore>,
		navigations: Arc<AtomicUsize>,
	}

	fn harness(transport: ScriptedTransport, config: ClientConfig) -> Harness {
		let transport = Arc::new(transport);
		let store = Arc::new(MemoryStore::default());
		let navigations = Arc::new(AtomicUsize::new(0));
		let counter = navigations.clone();
		let navigator: Arc<dyn Navigator> = Arc::new(move || {
			counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
		});
		let logout = Arc::new(LogoutHandler::new(store.clone(), navigator));
		let config = Arc::new(config);
		let refresh = Dispatcher::new(
			"refresh_api",
			CredentialRole::Refresh,
			PayloadProfile::Json,
			config.clone(),
			transport.clone(),
			store.clone(),
		);
		let coordinator = Arc::new(ReissueCoordinator::new(refresh.clone(), logout));
		let api = refresh
			.sibling("api", CredentialRole::Access, PayloadProfile::Json)
			.with_coordinator(coordinator.clone());

		store.save_pair(&TokenPair::new("A1", "R1"));

		Harness { api, coordinator, transport, store, navigations }
	}

	fn navigations(harness: &Harness) -> usize {
		harness.navigations.load(std::sync::atomic::Ordering::SeqCst)
	}

	#[tokio::test]
	async fn expiry_reissues_and_replays_once() {
		let transport = ScriptedTransport::default()
			.script("/groups", &[403, 200])
			.script("/token/re-issue", &[200])
			.body("/token/re-issue", "{\"accessToken\":\"A2\"}");
		let harness = harness(transport, ClientConfig::default());
		let response = harness.api.get("/groups").await.expect("Replay should succeed.");

		assert_eq!(response.status, 200);
		assert_eq!(
			harness.transport.seen("/groups"),
			vec![Some("Bearer A1".into()), Some("Bearer A2".into())],
		);
		assert_eq!(harness.transport.seen("/token/re-issue"), vec![Some("Bearer R1".into())]);
		assert_eq!(harness.store.access().as_ref().map(TokenSecret::expose), Some("A2"));
		assert_eq!(harness.store.refresh().as_ref().map(TokenSecret::expose), Some("R1"));
		assert_eq!(harness.coordinator.metrics().exchanges(), 1);
		assert_eq!(harness.coordinator.metrics().replays(), 1);
		assert!(!harness.coordinator.is_reissuing());
	}

	#[tokio::test]
	async fn second_expiry_is_terminal() {
		let transport = ScriptedTransport::default()
			.script("/groups", &[403, 403])
			.script("/token/re-issue", &[200])
			.body("/token/re-issue", "{\"accessToken\":\"A2\",\"refreshToken\":\"R2\"}");
		let harness = harness(transport, ClientConfig::default());
		let err = harness.api.get("/groups").await.expect_err("Second expiry should fail.");

		assert!(matches!(err, Error::SessionExpired { status: 403 }));
		assert_eq!(harness.transport.seen("/token/re-issue").len(), 1);
		assert_eq!(harness.store.refresh().as_ref().map(TokenSecret::expose), Some("R2"));
		assert_eq!(harness.coordinator.metrics().failures(), 1);
		assert_eq!(navigations(&harness), 0);
	}

	#[tokio::test]
	async fn retried_calls_fail_through_the_same_path() {
		let transport = ScriptedTransport::default().script("/groups", &[403]);
		let harness = harness(transport, ClientConfig::default());
		let mut call = LogicalCall::new(
			harness.api.prepare(ApiRequest::get("/groups")).expect("Request should prepare."),
		);
		let expired = harness.api.transmit(&mut call).await.expect("Transmit should succeed.");

		assert!(call.mark_retried());

		let err = harness
			.coordinator
			.handle_expired(&harness.api, &mut call, expired)
			.await
			.expect_err("A retried call cannot be replayed again.");

		assert!(matches!(err, Error::SessionExpired { status: 403 }));
		assert_eq!(call.state(), CallState::Failed);
		assert_eq!(harness.coordinator.metrics().failures(), 1);
		assert_eq!(harness.coordinator.metrics().exchanges(), 0);
		assert_eq!(harness.coordinator.metrics().replays(), 0);
	}

	#[tokio::test]
	async fn rejection_forces_logout() {
		let transport = ScriptedTransport::default()
			.script("/groups", &[403])
			.script("/token/re-issue", &[401]);
		let harness = harness(transport, ClientConfig::default());
		let err = harness.api.get("/groups").await.expect_err("Rejected refresh should fail.");

		assert!(matches!(err, Error::RefreshRejected { status: 401 }));
		assert!(harness.store.is_empty());
		assert_eq!(navigations(&harness), 1);
		assert_eq!(harness.coordinator.metrics().forced_logouts(), 1);
		assert_eq!(harness.transport.seen("/groups").len(), 1);
	}

	#[tokio::test]
	async fn server_errors_keep_the_session() {
		let transport = ScriptedTransport::default()
			.script("/groups", &[403])
			.script("/token/re-issue", &[500]);
		let harness = harness(transport, ClientConfig::default());
		let err = harness.api.get("/groups").await.expect_err("Failed reissue should fail.");

		assert!(matches!(err, Error::Reissue { .. }));
		assert_eq!(err.status(), Some(500));
		assert_eq!(harness.store.access().as_ref().map(TokenSecret::expose), Some("A1"));
		assert_eq!(navigations(&harness), 0);
	}

	#[tokio::test]
	async fn missing_refresh_token_follows_policy() {
		for (policy, logged_out) in
			[(MissingRefreshPolicy::Propagate, false), (MissingRefreshPolicy::ForceLogout, true)]
		{
			let transport = ScriptedTransport::default().script("/groups", &[403]);
			let harness =
				harness(transport, ClientConfig::default().with_missing_refresh_policy(policy));

			harness.store.remove(crate::store::CredentialKey::RefreshToken);

			let err = harness.api.get("/groups").await.expect_err("Reissue should be impossible.");

			assert!(matches!(err, Error::NoRefreshToken));
			assert!(harness.transport.seen("/token/re-issue").is_empty());
			assert_eq!(harness.store.is_empty(), logged_out);
			assert_eq!(navigations(&harness) == 1, logged_out);
		}
	}

	#[tokio::test]
	async fn stale_token_replays_without_exchange() {
		let transport = ScriptedTransport::default().script("/groups", &[403, 200]);
		let harness = harness(transport, ClientConfig::default());
		let mut call = LogicalCall::new(
			harness.api.prepare(ApiRequest::get("/groups")).expect("Request should prepare."),
		);
		let expired = harness.api.transmit(&mut call).await.expect("Transmit should succeed.");

		harness.store.set_access(TokenSecret::new("A2"));

		let response = harness
			.coordinator
			.handle_expired(&harness.api, &mut call, expired)
			.await
			.expect("Replay should succeed.");

		assert_eq!(response.status, 200);
		assert!(call.retried());
		assert_eq!(harness.coordinator.metrics().exchanges(), 0);
		assert_eq!(harness.coordinator.metrics().shortcuts(), 1);
		assert_eq!(harness.transport.seen("/groups")[1].as_deref(), Some("Bearer A2"));
	}

	#[tokio::test]
	async fn non_expiry_statuses_pass_through() {
		let transport = ScriptedTransport::default().script("/groups", &[500]);
		let harness = harness(transport, ClientConfig::default());
		let err = harness.api.get("/groups").await.expect_err("Server error should surface.");

		assert!(matches!(err, Error::UnexpectedStatus { status: 500, .. }));
		assert_eq!(harness.coordinator.metrics().expirations(), 0);
	}

	#[test]
	fn outcomes_map_onto_client_errors() {
		assert!(matches!(
			ReissueOutcome::NoRefreshToken.into_result(),
			Err(Error::NoRefreshToken)
		));
		assert!(matches!(
			ReissueOutcome::RefreshRejected { status: 401 }.into_result(),
			Err(Error::RefreshRejected { status: 401 })
		));

		let shared = Arc::new(Error::NoRefreshToken);

		match ReissueOutcome::TransportError(shared.clone()).into_result() {
			Err(Error::Reissue { source }) => assert!(Arc::ptr_eq(&source, &shared)),
			other => panic!("Unexpected result: {other:?}"),
		}
	}
}
