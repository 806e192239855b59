//! Per-call state carried through transmission, reissue, and replay.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::{AUTHORIZATION, OutboundRequest},
};

/// Lifecycle of one logical call.
///
/// `Initial → InFlight → (Success | ExpiredUnhandled | ExpiredRetrying → Success | Failed)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallState {
	/// Prepared, not yet sent.
	Initial,
	/// Waiting on the transport.
	InFlight,
	/// Completed with a response the caller receives (2xx or an ordinary failure status).
	Success,
	/// Expired on a dispatcher without a reissue coordinator.
	ExpiredUnhandled,
	/// Expired; waiting on a reissue exchange or its replay.
	ExpiredRetrying,
	/// Terminal failure.
	Failed,
}
impl CallState {
	/// Returns a stable label suitable for log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallState::Initial => "initial",
			CallState::InFlight => "in_flight",
			CallState::Success => "success",
			CallState::ExpiredUnhandled => "expired_unhandled",
			CallState::ExpiredRetrying => "expired_retrying",
			CallState::Failed => "failed",
		}
	}
}
impl Display for CallState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One caller-initiated request together with at most one coordinator-driven replay.
///
/// The stored request never carries an `Authorization` header; the credential is attached
/// per transmission so a replay picks up the reissued token.
#[derive(Clone, Debug)]
pub struct LogicalCall {
	request: OutboundRequest,
	sent_with: Option<TokenSecret>,
	retried: bool,
	state: CallState,
}
impl LogicalCall {
	/// Wraps a prepared request.
	pub fn new(mut request: OutboundRequest) -> Self {
		request.headers.remove(AUTHORIZATION);

		Self { request, sent_with: None, retried: false, state: CallState::Initial }
	}

	/// Request as forwarded to the transport, minus credentials.
	pub fn request(&self) -> &OutboundRequest {
		&self.request
	}

	/// Credential attached to the most recent transmission.
	pub fn sent_with(&self) -> Option<&TokenSecret> {
		self.sent_with.as_ref()
	}

	/// Whether the call already used its one reissue-driven replay.
	pub fn retried(&self) -> bool {
		self.retried
	}

	/// Current lifecycle state.
	pub fn state(&self) -> CallState {
		self.state
	}

	/// Flips `retried` to `true`. Returns `false` when it was already set.
	pub fn mark_retried(&mut self) -> bool {
		!std::mem::replace(&mut self.retried, true)
	}

	pub(crate) fn transition(&mut self, next: CallState) {
		trace_event!(
			trace,
			method = %self.request.method,
			url = %self.request.url,
			from = self.state.as_str(),
			to = next.as_str(),
			"Logical call transitioned."
		);

		self.state = next;
	}

	/// Produces the request for one transmission with `credential` attached.
	pub(crate) fn outbound(&mut self, credential: Option<TokenSecret>) -> OutboundRequest {
		let mut request = self.request.clone();

		if let Some(token) = &credential {
			request.headers.insert(AUTHORIZATION.to_owned(), token.bearer());
		}

		self.sent_with = credential;

		request
	}
}
