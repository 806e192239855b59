//! Client-level error types shared across dispatchers, the reissue coordinator, and stores.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) on the original request or its replay.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Reissue was needed but the store holds no refresh token.
	#[error("No refresh token is available for reissue.")]
	NoRefreshToken,
	/// The reissue endpoint rejected the refresh token; the session was force-logged-out.
	#[error("Refresh token was rejected with status {status}.")]
	RefreshRejected {
		/// HTTP status returned by the reissue endpoint.
		status: u16,
	},
	/// The reissue exchange failed for a reason other than rejection (network, server error).
	///
	/// Every call that waited on the same exchange receives the same shared source.
	#[error("Token reissue failed.")]
	Reissue {
		/// Failure raised by the shared reissue exchange.
		#[source]
		source: Arc<Error>,
	},
	/// The replayed request signalled expiry again; no second reissue is attempted.
	#[error("Session expired again after reissue (status {status}).")]
	SessionExpired {
		/// Expiry status observed on the replay.
		status: u16,
	},
	/// Any other non-2xx response, passed through untouched.
	#[error("Server responded with status {status}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Response body preview.
		body: String,
	},
	/// Response body did not match the expected JSON shape.
	#[error("Response body with status {status} did not match the expected shape.")]
	ResponseParse {
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// The request body does not fit the dispatcher's payload profile.
	#[error("A {body} body cannot be sent through a {profile} dispatcher.")]
	UnsupportedPayload {
		/// Payload profile of the dispatcher.
		profile: &'static str,
		/// Kind of body supplied by the caller.
		body: &'static str,
	},
	/// Request payload could not be encoded as JSON.
	#[error("Request body could not be encoded as JSON.")]
	RequestEncode {
		/// Underlying serializer failure.
		#[source]
		source: serde_json::Error,
	},
}
impl Error {
	/// Returns `true` when the failure originated at the network layer, including failures
	/// of a shared reissue exchange.
	pub fn is_transport(&self) -> bool {
		match self {
			Self::Transport(_) => true,
			Self::Reissue { source } => source.is_transport(),
			_ => false,
		}
	}

	/// HTTP status associated with the failure, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::RefreshRejected { status }
			| Self::SessionExpired { status }
			| Self::UnexpectedStatus { status, .. }
			| Self::ResponseParse { status, .. } => Some(*status),
			Self::Reissue { source } => source.status(),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised while building a client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL cannot carry relative paths (e.g., `mailto:`).
	#[error("Base URL `{url}` cannot be used as a base for request paths.")]
	CannotBeABase {
		/// Offending URL.
		url: String,
	},
	/// Request path cannot be joined onto the base URL.
	#[error("Path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured endpoint path is empty.
	#[error("The {field} path must not be empty.")]
	EmptyPath {
		/// Configuration field name.
		field: &'static str,
	},
	/// The expiry status is not an HTTP client or server error code.
	#[error("Expiry status {status} must be within 400..=599.")]
	InvalidExpiryStatus {
		/// Offending status code.
		status: u16,
	},
	/// Configuration document could not be parsed.
	#[error("Client configuration is malformed.")]
	Parse {
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Target URL of the failed request.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: impl Display, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}
