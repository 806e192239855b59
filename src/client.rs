//! Session client facade that wires dispatchers, the reissue coordinator, and logout.

// self
use crate::{
	_prelude::*,
	auth::TokenPair,
	config::ClientConfig,
	dispatch::{ApiRequest, CredentialRole, Dispatcher, PayloadProfile},
	http::{ApiResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	reissue::{ReissueCoordinator, ReissueMetrics},
	session::{LogoutHandler, LogoutReason, Navigator, SessionObserver},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Session client specialized for the crate's default reqwest transport.
pub type ReqwestSessionClient = SessionClient<ReqwestTransport>;

/// One authenticated session against a single API server.
///
/// The client owns four dispatchers that share one transport and one credential store:
///
/// - [`SessionClient::api`]: no credential, JSON bodies, no expiry handling;
/// - [`SessionClient::refresh_api`]: refresh token, JSON bodies, no expiry handling;
/// - [`SessionClient::auth_api`]: access token, JSON bodies, expiry handled by the coordinator;
/// - [`SessionClient::form_api`]: access token, multipart bodies, same coordinator.
pub struct SessionClient<C>
where
	C: ?Sized + HttpTransport,
{
	config: Arc<ClientConfig>,
	store: Arc<dyn CredentialStore>,
	logout: Arc<LogoutHandler>,
	coordinator: Arc<ReissueCoordinator<C>>,
	api: Dispatcher<C>,
	refresh_api: Dispatcher<C>,
	auth_api: Dispatcher<C>,
	form_api: Dispatcher<C>,
}
impl<C> SessionClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Builds a client on top of a caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		transport: Arc<C>,
		store: Arc<dyn CredentialStore>,
		observer: Arc<dyn SessionObserver>,
		navigator: Arc<dyn Navigator>,
	) -> Result<Self> {
		config.validate()?;

		let config = Arc::new(config);
		let logout = Arc::new(LogoutHandler::new(store.clone(), navigator).with_observer(observer));
		let refresh_api = Dispatcher::new(
			"refresh_api",
			CredentialRole::Refresh,
			PayloadProfile::Json,
			config.clone(),
			transport,
			store.clone(),
		);
		let coordinator = Arc::new(ReissueCoordinator::new(refresh_api.clone(), logout.clone()));
		let api = refresh_api.sibling("api", CredentialRole::None, PayloadProfile::Json);
		let auth_api = refresh_api
			.sibling("auth_api", CredentialRole::Access, PayloadProfile::Json)
			.with_coordinator(coordinator.clone());
		let form_api = refresh_api
			.sibling("form_api", CredentialRole::Access, PayloadProfile::BinaryForm)
			.with_coordinator(coordinator.clone());

		trace_event!(debug, base_url = %config.base_url, "Session client configured.");

		Ok(Self { config, store, logout, coordinator, api, refresh_api, auth_api, form_api })
	}

	/// Unauthenticated dispatcher, used for sign-in and sign-up.
	pub fn api(&self) -> &Dispatcher<C> {
		&self.api
	}

	/// Refresh-token dispatcher.
	pub fn refresh_api(&self) -> &Dispatcher<C> {
		&self.refresh_api
	}

	/// Access-token dispatcher for JSON APIs.
	pub fn auth_api(&self) -> &Dispatcher<C> {
		&self.auth_api
	}

	/// Access-token dispatcher for multipart uploads.
	pub fn form_api(&self) -> &Dispatcher<C> {
		&self.form_api
	}

	/// Shared configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Shared credential store.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Shared reissue coordinator.
	pub fn coordinator(&self) -> &Arc<ReissueCoordinator<C>> {
		&self.coordinator
	}

	/// Logout handler shared with the coordinator.
	pub fn logout_handler(&self) -> &Arc<LogoutHandler> {
		&self.logout
	}

	/// Counters describing reissue activity.
	pub fn reissue_metrics(&self) -> &Arc<ReissueMetrics> {
		self.coordinator.metrics()
	}

	/// Reports the stored session to the observer. Returns `true` when one exists.
	pub fn initialize(&self) -> bool {
		match self.store.access() {
			Some(access) => {
				self.logout.notify_logged_in(&access);

				true
			},
			None => {
				trace_event!(debug, "No stored session found.");
				self.logout.notify_logged_out(LogoutReason::Initialization);

				false
			},
		}
	}

	/// Signs in with `credentials` and stores the issued pair.
	///
	/// Any previous session is replaced, including a refresh token the new pair omits.
	pub async fn sign_in<B>(&self, credentials: &B) -> Result<TokenPair>
	where
		B: ?Sized + Serialize,
	{
		obs::observe(FlowKind::SignIn, "sign_in", async move {
			let response = self.api.post_json(&self.config.sign_in_path, credentials).await?;
			let pair = response.json::<TokenPair>()?;

			self.store.clear();
			self.store.save_pair(&pair);
			self.logout.notify_logged_in(&pair.access_token);

			Ok(pair)
		})
		.await
	}

	/// Registers a new account. The response is returned as-is on success.
	pub async fn sign_up<B>(&self, payload: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.api.post_json(&self.config.sign_up_path, payload).await
	}

	/// Forces a reissue (or joins the one in flight) and returns the resulting pair.
	pub async fn reissue(&self) -> Result<TokenPair> {
		self.coordinator.reissue().await
	}

	/// Ends the session.
	///
	/// The server is told through the logout endpoint when a refresh token is stored; that
	/// request is best-effort and its failure is only logged. Local credentials are always
	/// cleared, the observer is notified, and the navigator is invoked.
	pub async fn logout(&self) {
		const KIND: FlowKind = FlowKind::Logout;

		let span = FlowSpan::new(KIND, "logout");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		span.instrument(async {
			if self.store.refresh().is_none() {
				return;
			}

			match self.refresh_api.send(ApiRequest::post(self.config.logout_path.as_str())).await {
				Ok(_) => trace_event!(debug, "Server acknowledged logout."),
				Err(_e) => trace_event!(warn, error = %_e, "Server logout failed; clearing locally."),
			}
		})
		.await;

		self.logout.logout(LogoutReason::UserRequested);
		span.record_outcome(FlowOutcome::Success);
		obs::record_flow_outcome(KIND, FlowOutcome::Success);
	}
}
#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestTransport> {
	/// Builds a client with a reqwest transport honoring the configured timeout.
	pub fn new(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		observer: Arc<dyn SessionObserver>,
		navigator: Arc<dyn Navigator>,
	) -> Result<Self> {
		let transport = ReqwestTransport::from_config(&config)?;

		Self::with_transport(config, Arc::new(transport), store, observer, navigator)
	}
}
impl<C> Debug for SessionClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		error::{ConfigError, TransportError},
		http::{OutboundRequest, TransportFuture},
		session::SessionState,
		store::MemoryStore,
	};

	struct Offline;
	impl HttpTransport for Offline {
		fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				Err(TransportError::network(
					&request.url,
					std::io::Error::other("connection refused"),
				))
			})
		}
	}

	fn client(state: Arc<SessionState>) -> SessionClient<Offline> {
		SessionClient::with_transport(
			ClientConfig::default(),
			Arc::new(Offline),
			Arc::new(MemoryStore::default()),
			state,
			Arc::new(|| {}),
		)
		.expect("Default configuration should build a client.")
	}

	#[test]
	fn invalid_configuration_is_rejected() {
		let err = SessionClient::with_transport(
			ClientConfig::default().with_expiry_status(204),
			Arc::new(Offline),
			Arc::new(MemoryStore::default()),
			Arc::new(SessionState::default()),
			Arc::new(|| {}),
		)
		.expect_err("Invalid expiry status should be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidExpiryStatus { status: 204 })));
	}

	#[test]
	fn dispatchers_carry_their_roles() {
		let client = client(Arc::new(SessionState::default()));

		assert_eq!(client.api().role(), CredentialRole::None);
		assert_eq!(client.refresh_api().role(), CredentialRole::Refresh);
		assert_eq!(client.auth_api().role(), CredentialRole::Access);
		assert_eq!(client.form_api().role(), CredentialRole::Access);
		assert_eq!(client.form_api().profile(), PayloadProfile::BinaryForm);
		assert!(client.api().coordinator().is_none());
		assert!(client.refresh_api().coordinator().is_none());
		assert!(client.auth_api().coordinator().is_some());
		assert!(client.form_api().coordinator().is_some());
	}

	#[test]
	fn initialize_reports_the_stored_session() {
		let state = Arc::new(SessionState::default());
		let client = client(state.clone());

		assert!(!client.initialize());
		assert!(!state.is_loading());
		assert_eq!(state.snapshot().last_logout, Some(LogoutReason::Initialization));

		client.store().save_pair(&TokenPair::new("A1", "R1"));

		assert!(client.initialize());
		assert!(state.is_authenticated());
	}

	#[tokio::test]
	async fn logout_clears_locally_when_the_server_is_unreachable() {
		let state = Arc::new(SessionState::default());
		let client = client(state.clone());

		client.store().save_pair(&TokenPair::new("A1", "R1"));
		client.logout().await;

		assert!(client.store().is_empty());
		assert_eq!(state.snapshot().last_logout, Some(LogoutReason::UserRequested));
	}
}
