//! Transport primitives for dispatcher requests.
//!
//! The module exposes [`HttpTransport`] alongside the crate-owned request and response
//! types so downstream crates can plug in custom HTTP stacks without the session layer
//! depending on their types. Request bodies stay as owned data ([`Payload`]) until the
//! transport encodes them, which lets the reissue coordinator replay a call verbatim.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::{config::ClientConfig, error::ConfigError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing dispatcher requests.
///
/// Implementations return the raw response for every status code and only fail on
/// network-level problems. They must not retry; retries belong to the reissue coordinator.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with the raw response.
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

/// HTTP methods used by dispatchers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One field of a `multipart/form-data` body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormPart {
	/// Form field name.
	pub name: String,
	/// Field content.
	pub value: FormValue,
}
impl FormPart {
	/// Creates a text field.
	pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self { name: name.into(), value: FormValue::Text(value.into()) }
	}

	/// Creates a file field.
	pub fn file(
		name: impl Into<String>,
		file_name: impl Into<String>,
		content_type: Option<&str>,
		bytes: impl Into<Vec<u8>>,
	) -> Self {
		Self {
			name: name.into(),
			value: FormValue::File {
				file_name: file_name.into(),
				content_type: content_type.map(str::to_owned),
				bytes: bytes.into(),
			},
		}
	}
}

/// Content of a [`FormPart`].
#[derive(Clone, PartialEq, Eq)]
pub enum FormValue {
	/// Plain text value.
	Text(String),
	/// Binary file upload.
	File {
		/// File name reported to the server.
		file_name: String,
		/// MIME type of the file, when known.
		content_type: Option<String>,
		/// File contents.
		bytes: Vec<u8>,
	},
}
impl Debug for FormValue {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Text(value) => f.debug_tuple("Text").field(value).finish(),
			Self::File { file_name, content_type, bytes } => f
				.debug_struct("File")
				.field("file_name", file_name)
				.field("content_type", content_type)
				.field("len", &bytes.len())
				.finish(),
		}
	}
}

/// Encoded request body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Payload {
	/// No body.
	#[default]
	Empty,
	/// Serialized JSON document.
	Json(Vec<u8>),
	/// Multipart form, encoded by the transport.
	Multipart(Vec<FormPart>),
}

/// Fully resolved request handed to an [`HttpTransport`].
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Header map keyed by lowercase header name.
	pub headers: BTreeMap<String, String>,
	/// Request body.
	pub payload: Payload,
}
impl OutboundRequest {
	/// Returns the header value stored under `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Returns the `Authorization` header value, if one is attached.
	pub fn authorization(&self) -> Option<&str> {
		self.header(AUTHORIZATION)
	}
}

/// Header name used for bearer credentials.
pub const AUTHORIZATION: &str = "authorization";
/// Header name used for the payload profile.
pub const CONTENT_TYPE: &str = "content-type";

/// Raw response returned by a transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Header map keyed by lowercase header name.
	pub headers: BTreeMap<String, String>,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	const BODY_PREVIEW_LIMIT: usize = 512;

	/// Creates a response with an empty header map.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: BTreeMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| Error::ResponseParse { source, status: self.status })
	}

	/// Returns the body as text, replacing invalid UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Returns a bounded prefix of the body for error reporting.
	pub fn body_preview(&self) -> String {
		let text = self.text();

		if text.chars().count() <= Self::BODY_PREVIEW_LIMIT {
			return text;
		}

		let mut preview: String = text.chars().take(Self::BODY_PREVIEW_LIMIT).collect();

		preview.push_str("...");

		preview
	}

	/// Converts a non-2xx response into [`Error::UnexpectedStatus`].
	pub fn error_for_status(self) -> Result<Self> {
		if self.is_success() {
			Ok(self)
		} else {
			Err(Error::UnexpectedStatus { status: self.status, body: self.body_preview() })
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client honoring the configured request timeout.
	pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder();

		if let Some(secs) = config.request_timeout_secs {
			builder = builder.timeout(std::time::Duration::from_secs(secs));
		}

		Ok(Self(builder.build()?))
	}

	fn build_multipart(parts: Vec<FormPart>) -> Result<reqwest::multipart::Form, ReqwestError> {
		use reqwest::multipart::{Form, Part};

		let mut form = Form::new();

		for FormPart { name, value } in parts {
			form = match value {
				FormValue::Text(text) => form.text(name, text),
				FormValue::File { file_name, content_type, bytes } => {
					let mut part = Part::bytes(bytes).file_name(file_name);

					if let Some(mime) = content_type {
						part = part.mime_str(&mime)?;
					}

					form.part(name, part)
				},
			};
		}

		Ok(form)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let OutboundRequest { method, url, headers, payload } = request;
			let network = |e: ReqwestError| TransportError::network(&url, e);
			let method = match method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Patch => reqwest::Method::PATCH,
				Method::Delete => reqwest::Method::DELETE,
			};
			let mut builder = self.0.request(method, url.clone());

			for (name, value) in &headers {
				if matches!(payload, Payload::Multipart(_)) && name == CONTENT_TYPE {
					continue;
				}

				builder = builder.header(name.as_str(), value.as_str());
			}

			builder = match payload {
				Payload::Empty => builder,
				Payload::Json(bytes) => builder.body(bytes),
				Payload::Multipart(parts) =>
					builder.multipart(Self::build_multipart(parts).map_err(network)?),
			};

			let response = builder.send().await.map_err(network)?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
				})
				.collect();
			let body = response.bytes().await.map_err(network)?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, Deserialize)]
	#[allow(dead_code)]
	struct Group {
		id: u64,
		name: String,
	}

	#[test]
	fn json_reports_failing_path() {
		let response = ApiResponse::new(200, "{\"id\":\"seven\",\"name\":\"hikers\"}");
		let err = response.json::<Group>().expect_err("String id should fail to decode.");

		match err {
			Error::ResponseParse { source, status } => {
				assert_eq!(status, 200);
				assert_eq!(source.path().to_string(), "id");
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn error_for_status_truncates_long_bodies() {
		let body = "x".repeat(2_000);
		let err = ApiResponse::new(500, body)
			.error_for_status()
			.expect_err("Server errors should convert into client errors.");

		match err {
			Error::UnexpectedStatus { status, body } => {
				assert_eq!(status, 500);
				assert_eq!(body.len(), 515);
				assert!(body.ends_with("..."));
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn request_headers_are_case_insensitive() {
		let mut headers = BTreeMap::new();

		headers.insert(AUTHORIZATION.to_owned(), "Bearer A1".to_owned());

		let request = OutboundRequest {
			method: Method::Get,
			url: Url::parse("http://localhost:8080/groups").expect("Fixture URL should parse."),
			headers,
			payload: Payload::Empty,
		};

		assert_eq!(request.header("Authorization"), Some("Bearer A1"));
		assert_eq!(request.authorization(), Some("Bearer A1"));
		assert_eq!(request.header(CONTENT_TYPE), None);
	}

	#[test]
	fn file_parts_redact_bytes_in_debug() {
		let part = FormPart::file("images", "trail.png", Some("image/png"), vec![0_u8; 4096]);
		let rendered = format!("{part:?}");

		assert!(rendered.contains("len: 4096"));
		assert!(!rendered.contains("0, 0, 0"));
	}
}
