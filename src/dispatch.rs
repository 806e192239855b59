//! Parameterized request dispatchers.
//!
//! A [`Dispatcher`] pairs a [`CredentialRole`] (which token, if any, to attach) with a
//! [`PayloadProfile`] (how bodies are encoded). Every dispatcher of a session shares one
//! transport, one configuration, and one credential store; credentials are read from the
//! store at send time, never cached on the dispatcher. Access-role dispatchers additionally
//! share a [`ReissueCoordinator`] that handles the session-expiry signal.

pub mod call;

pub use call::*;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::ClientConfig,
	http::{ApiResponse, CONTENT_TYPE, FormPart, HttpTransport, Method, OutboundRequest, Payload},
	obs::{self, FlowKind},
	reissue::ReissueCoordinator,
	store::CredentialStore,
};

/// Which credential a dispatcher attaches to outgoing requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialRole {
	/// Attach nothing (sign-in, sign-up).
	None,
	/// Attach the refresh token (reissue, logout).
	Refresh,
	/// Attach the access token (every authenticated API call).
	Access,
}
impl CredentialRole {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialRole::None => "none",
			CredentialRole::Refresh => "refresh",
			CredentialRole::Access => "access",
		}
	}
}

/// Body encoding profile of a dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadProfile {
	/// `application/json;charset=UTF-8` bodies.
	Json,
	/// `multipart/form-data` bodies; the transport supplies the boundary.
	BinaryForm,
}
impl PayloadProfile {
	/// Content type announced for bodies sent under this profile.
	pub const fn content_type(self) -> &'static str {
		match self {
			PayloadProfile::Json => "application/json;charset=UTF-8",
			PayloadProfile::BinaryForm => "multipart/form-data",
		}
	}

	/// Returns a stable label suitable for log fields and errors.
	pub const fn as_str(self) -> &'static str {
		match self {
			PayloadProfile::Json => "json",
			PayloadProfile::BinaryForm => "binary_form",
		}
	}
}

/// Caller-facing request description, relative to the configured base URL.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the base URL; may carry a query string.
	pub path: String,
	/// Request body.
	pub body: RequestBody,
	/// Extra headers, keyed by lowercase name.
	pub headers: BTreeMap<String, String>,
}
impl ApiRequest {
	/// Creates a body-less request.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), body: RequestBody::Empty, headers: BTreeMap::new() }
	}

	/// `GET path`
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// `POST path`
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// `PUT path`
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// `PATCH path`
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// `DELETE path`
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Attaches a JSON body.
	pub fn json<T>(mut self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let value =
			serde_json::to_value(body).map_err(|source| Error::RequestEncode { source })?;

		self.body = RequestBody::Json(value);

		Ok(self)
	}

	/// Attaches a multipart form body.
	pub fn form(mut self, parts: impl IntoIterator<Item = FormPart>) -> Self {
		self.body = RequestBody::Form(parts.into_iter().collect());

		self
	}

	/// Adds an extra header.
	pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());

		self
	}
}

/// Body of an [`ApiRequest`].
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
	/// No body.
	#[default]
	Empty,
	/// JSON document.
	Json(serde_json::Value),
	/// Multipart form fields.
	Form(Vec<FormPart>),
}
impl RequestBody {
	fn as_str(&self) -> &'static str {
		match self {
			RequestBody::Empty => "empty",
			RequestBody::Json(_) => "json",
			RequestBody::Form(_) => "form",
		}
	}
}

/// HTTP client bound to one credential role and payload profile.
pub struct Dispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	name: &'static str,
	role: CredentialRole,
	profile: PayloadProfile,
	config: Arc<ClientConfig>,
	transport: Arc<C>,
	store: Arc<dyn CredentialStore>,
	coordinator: Option<Arc<ReissueCoordinator<C>>>,
}
impl<C> Dispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a dispatcher without a reissue coordinator.
	pub fn new(
		name: &'static str,
		role: CredentialRole,
		profile: PayloadProfile,
		config: Arc<ClientConfig>,
		transport: Arc<C>,
		store: Arc<dyn CredentialStore>,
	) -> Self {
		Self { name, role, profile, config, transport, store, coordinator: None }
	}

	/// Attaches the coordinator that handles expiry responses for this dispatcher.
	pub fn with_coordinator(mut self, coordinator: Arc<ReissueCoordinator<C>>) -> Self {
		self.coordinator = Some(coordinator);

		self
	}

	/// Creates a sibling dispatcher sharing transport, store, and configuration.
	pub fn sibling(
		&self,
		name: &'static str,
		role: CredentialRole,
		profile: PayloadProfile,
	) -> Self {
		Self::new(
			name,
			role,
			profile,
			self.config.clone(),
			self.transport.clone(),
			self.store.clone(),
		)
	}

	/// Label used in spans and logs.
	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Credential role.
	pub fn role(&self) -> CredentialRole {
		self.role
	}

	/// Payload profile.
	pub fn profile(&self) -> PayloadProfile {
		self.profile
	}

	/// Shared configuration.
	pub fn config(&self) -> &Arc<ClientConfig> {
		&self.config
	}

	/// Shared credential store.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Coordinator attached to this dispatcher, if any.
	pub fn coordinator(&self) -> Option<&Arc<ReissueCoordinator<C>>> {
		self.coordinator.as_ref()
	}

	/// Sends `request`, reissuing and replaying once on session expiry, and converts
	/// non-2xx outcomes into [`Error::UnexpectedStatus`].
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		obs::observe(FlowKind::Dispatch, self.name, async move {
			let mut call = LogicalCall::new(self.prepare(request)?);

			self.dispatch(&mut call).await?.error_for_status()
		})
		.await
	}

	/// Sends `request` once and returns the raw response for every status.
	pub async fn send_raw(&self, request: ApiRequest) -> Result<ApiResponse> {
		let mut call = LogicalCall::new(self.prepare(request)?);

		self.transmit(&mut call).await
	}

	/// Runs one logical call: transmit, then hand expiry responses to the coordinator.
	///
	/// The returned response may carry any status; only expiry handling is applied.
	pub async fn dispatch(&self, call: &mut LogicalCall) -> Result<ApiResponse> {
		let response = self.transmit(call).await?;

		if !self.config.is_expiry(response.status) {
			call.transition(CallState::Success);

			return Ok(response);
		}

		match &self.coordinator {
			Some(coordinator) => {
				let result = coordinator.handle_expired(self, call, response).await;

				if result.is_ok() {
					call.transition(CallState::Success);
				}

				result
			},
			None => {
				call.transition(CallState::ExpiredUnhandled);

				Ok(response)
			},
		}
	}

	/// Transmits `call` once with the role's credential read fresh from the store.
	pub async fn transmit(&self, call: &mut LogicalCall) -> Result<ApiResponse> {
		let credential = self.credential();

		self.transmit_with(call, credential).await
	}

	/// Transmits `call` once with an explicit credential.
	pub(crate) async fn transmit_with(
		&self,
		call: &mut LogicalCall,
		credential: Option<TokenSecret>,
	) -> Result<ApiResponse> {
		match &credential {
			Some(_token) => trace_event!(
				debug,
				dispatcher = self.name,
				role = self.role.as_str(),
				token = %_token.preview(),
				"Attaching bearer credential."
			),
			None if self.role != CredentialRole::None => trace_event!(
				debug,
				dispatcher = self.name,
				role = self.role.as_str(),
				"No stored credential; sending unauthenticated."
			),
			None => {},
		}

		let request = call.outbound(credential);

		call.transition(CallState::InFlight);

		match self.transport.execute(request).await {
			Ok(response) => {
				trace_event!(
					debug,
					dispatcher = self.name,
					status = response.status,
					"Response received."
				);

				Ok(response)
			},
			Err(e) => {
				trace_event!(warn, dispatcher = self.name, error = %e, "Transport failure.");
				call.transition(CallState::Failed);

				Err(e.into())
			},
		}
	}

	/// GET `path`.
	pub async fn get(&self, path: &str) -> Result<ApiResponse> {
		self.send(ApiRequest::get(path)).await
	}

	/// DELETE `path`.
	pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
		self.send(ApiRequest::delete(path)).await
	}

	/// POST a JSON body to `path`.
	pub async fn post_json<T>(&self, path: &str, body: &T) -> Result<ApiResponse>
	where
		T: ?Sized + Serialize,
	{
		self.send(ApiRequest::post(path).json(body)?).await
	}

	/// PUT a JSON body to `path`.
	pub async fn put_json<T>(&self, path: &str, body: &T) -> Result<ApiResponse>
	where
		T: ?Sized + Serialize,
	{
		self.send(ApiRequest::put(path).json(body)?).await
	}

	/// PATCH a JSON body to `path`.
	pub async fn patch_json<T>(&self, path: &str, body: &T) -> Result<ApiResponse>
	where
		T: ?Sized + Serialize,
	{
		self.send(ApiRequest::patch(path).json(body)?).await
	}

	/// POST a multipart form to `path`.
	pub async fn post_form(
		&self,
		path: &str,
		parts: impl IntoIterator<Item = FormPart>,
	) -> Result<ApiResponse> {
		self.send(ApiRequest::post(path).form(parts)).await
	}

	/// Resolves and encodes `request` for this dispatcher's profile.
	pub fn prepare(&self, request: ApiRequest) -> Result<OutboundRequest> {
		let ApiRequest { method, path, body, mut headers } = request;
		let url = self.config.resolve(&path)?;
		let payload = match (self.profile, body) {
			(_, RequestBody::Empty) => Payload::Empty,
			(PayloadProfile::Json, RequestBody::Json(value)) => Payload::Json(
				serde_json::to_vec(&value).map_err(|source| Error::RequestEncode { source })?,
			),
			(PayloadProfile::BinaryForm, RequestBody::Form(parts)) => Payload::Multipart(parts),
			(profile, body) =>
				return Err(Error::UnsupportedPayload {
					profile: profile.as_str(),
					body: body.as_str(),
				}),
		};

		if !matches!(payload, Payload::Empty) {
			headers.insert(CONTENT_TYPE.to_owned(), self.profile.content_type().to_owned());
		}

		Ok(OutboundRequest { method, url, headers, payload })
	}

	fn credential(&self) -> Option<TokenSecret> {
		match self.role {
			CredentialRole::None => None,
			CredentialRole::Refresh => self.store.refresh(),
			CredentialRole::Access => self.store.access(),
		}
	}
}
impl<C> Clone for Dispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			name: self.name,
			role: self.role,
			profile: self.profile,
			config: self.config.clone(),
			transport: self.transport.clone(),
			store: self.store.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<C> Debug for Dispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("name", &self.name)
			.field("role", &self.role)
			.field("profile", &self.profile)
			.field("base_url", &self.config.base_url.as_str())
			.field("coordinated", &self.coordinator.is_some())
			.finish()
	}
}
