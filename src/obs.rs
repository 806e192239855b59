//! Observability helpers for session flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (default) to emit structured spans named `bearer_session.flow` with the
//!   `flow`, `stage`, and `outcome` fields, plus debug/warn events along the reissue path.
//! - Enable `metrics` to increment the `bearer_session_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

/// Emits a `tracing` event when the `tracing` feature is enabled; expands to nothing otherwise.
macro_rules! trace_event {
	($level:ident, $($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		{
			tracing::$level!($($arg)+);
		}
	}};
}

mod tracing;

pub use tracing::*;

// self
use crate::_prelude::*;

/// Session flows observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// A caller-initiated request through a dispatcher.
	Dispatch,
	/// The refresh-token exchange against the reissue endpoint.
	Reissue,
	/// The one-shot replay of an expired request.
	Replay,
	/// Sign-in against the authentication endpoint.
	SignIn,
	/// Explicit or forced logout.
	Logout,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Dispatch => "dispatch",
			FlowKind::Reissue => "reissue",
			FlowKind::Replay => "replay",
			FlowKind::SignIn => "sign_in",
			FlowKind::Logout => "logout",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Increments `bearer_session_flow_total` when the `metrics` feature is enabled.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bearer_session_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Runs `fut` inside a [`FlowSpan`], recording the attempt and its terminal outcome.
pub(crate) async fn observe<Fut, T, E>(
	kind: FlowKind,
	stage: &'static str,
	fut: Fut,
) -> Result<T, E>
where
	Fut: Future<Output = Result<T, E>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;
	let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

	span.record_outcome(outcome);
	record_flow_outcome(kind, outcome);

	result
}
