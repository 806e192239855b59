//! Client configuration: base URL, endpoint paths, and the session-expiry policy knobs.

// std
use std::env;
// self
use crate::{_prelude::*, error::ConfigError};

/// What the coordinator does when a reissue is needed but no refresh token is stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingRefreshPolicy {
	/// Fail the call with [`Error::NoRefreshToken`] and leave the session untouched.
	#[default]
	Propagate,
	/// Fail the call and run the forced-logout path, like a rejected refresh token.
	ForceLogout,
}

/// Configuration shared by every dispatcher of a session client.
///
/// Values deserialize from camelCase JSON; missing fields fall back to the defaults of the
/// deployed API (`403` as the expiry signal, `/token/re-issue` as the reissue endpoint).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
	/// Base URL every request path is resolved against, as a directory.
	pub base_url: Url,
	/// Status that access-scoped endpoints return when the access token expired.
	pub expiry_status: u16,
	/// Statuses from the reissue endpoint that mean the refresh token was rejected.
	pub rejection_statuses: Vec<u16>,
	/// Reissue endpoint path.
	pub reissue_path: String,
	/// Sign-in endpoint path.
	pub sign_in_path: String,
	/// Sign-up endpoint path.
	pub sign_up_path: String,
	/// Logout endpoint path.
	pub logout_path: String,
	/// Behavior when a reissue is needed without a stored refresh token.
	pub missing_refresh_policy: MissingRefreshPolicy,
	/// Per-request timeout applied by the bundled reqwest transport.
	pub request_timeout_secs: Option<u64>,
}
impl ClientConfig {
	/// Environment variable consulted by [`ClientConfig::from_env`].
	pub const BASE_URL_ENV: &'static str = "SERVER_URL";
	/// Base URL used when nothing else is configured.
	pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8080/";
	/// Default expiry signal of the deployed server.
	pub const DEFAULT_EXPIRY_STATUS: u16 = 403;
	/// Default reissue endpoint path.
	pub const DEFAULT_REISSUE_PATH: &'static str = "/token/re-issue";

	/// Creates a configuration with default paths and policies for `base_url`.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url: normalize_base(base_url),
			expiry_status: Self::DEFAULT_EXPIRY_STATUS,
			rejection_statuses: vec![401],
			reissue_path: Self::DEFAULT_REISSUE_PATH.into(),
			sign_in_path: "/auth/signin".into(),
			sign_up_path: "/auth/signup".into(),
			logout_path: "/auth/logout".into(),
			missing_refresh_policy: MissingRefreshPolicy::default(),
			request_timeout_secs: None,
		}
	}

	/// Builds a configuration whose base URL comes from `SERVER_URL`, falling back to
	/// [`ClientConfig::DEFAULT_BASE_URL`].
	pub fn from_env() -> Result<Self, ConfigError> {
		let raw = env::var(Self::BASE_URL_ENV)
			.ok()
			.filter(|value| !value.trim().is_empty())
			.unwrap_or_else(|| Self::DEFAULT_BASE_URL.into());

		Self::parse_base(raw.trim()).map(Self::new)
	}

	/// Parses a camelCase JSON document and validates the result.
	pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::Parse { source })?;
		let config = Self { base_url: normalize_base(config.base_url), ..config };

		config.validate()?;

		Ok(config)
	}

	/// Overrides the expiry status.
	pub fn with_expiry_status(mut self, status: u16) -> Self {
		self.expiry_status = status;

		self
	}

	/// Replaces the statuses treated as refresh-token rejection.
	pub fn with_rejection_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
		self.rejection_statuses = statuses.into_iter().collect();

		self
	}

	/// Overrides the reissue endpoint path.
	pub fn with_reissue_path(mut self, path: impl Into<String>) -> Self {
		self.reissue_path = path.into();

		self
	}

	/// Overrides the sign-in endpoint path.
	pub fn with_sign_in_path(mut self, path: impl Into<String>) -> Self {
		self.sign_in_path = path.into();

		self
	}

	/// Overrides the sign-up endpoint path.
	pub fn with_sign_up_path(mut self, path: impl Into<String>) -> Self {
		self.sign_up_path = path.into();

		self
	}

	/// Overrides the logout endpoint path.
	pub fn with_logout_path(mut self, path: impl Into<String>) -> Self {
		self.logout_path = path.into();

		self
	}

	/// Overrides the missing-refresh-token policy.
	pub fn with_missing_refresh_policy(mut self, policy: MissingRefreshPolicy) -> Self {
		self.missing_refresh_policy = policy;

		self
	}

	/// Sets a per-request timeout for the bundled transport.
	pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
		self.request_timeout_secs = Some(secs);

		self
	}

	/// Returns `true` when `status` is the configured expiry signal.
	pub fn is_expiry(&self, status: u16) -> bool {
		status == self.expiry_status
	}

	/// Returns `true` when `status` from the reissue endpoint means rejection.
	pub fn is_rejection(&self, status: u16) -> bool {
		self.rejection_statuses.contains(&status)
	}

	/// Checks invariants that serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !(400..=599).contains(&self.expiry_status) {
			return Err(ConfigError::InvalidExpiryStatus { status: self.expiry_status });
		}
		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeABase { url: self.base_url.to_string() });
		}

		for (field, path) in [
			("reissue", &self.reissue_path),
			("sign-in", &self.sign_in_path),
			("sign-up", &self.sign_up_path),
			("logout", &self.logout_path),
		] {
			if path.trim().is_empty() {
				return Err(ConfigError::EmptyPath { field });
			}
		}

		Ok(())
	}

	/// Resolves `path` against the base URL.
	///
	/// A leading `/` is treated as relative to the base path rather than the host root, so
	/// `http://host/api` + `/groups` yields `http://host/api/groups` whether or not the base
	/// carries a trailing `/`.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		normalize_base(self.base_url.clone())
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })
	}

	fn parse_base(raw: &str) -> Result<Url, ConfigError> {
		Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl { source })
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		let base = Url::parse(Self::DEFAULT_BASE_URL).expect("Default base URL should parse.");

		Self::new(base)
	}
}

fn normalize_base(mut url: Url) -> Url {
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	url
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config(base: &str) -> ClientConfig {
		ClientConfig::new(Url::parse(base).expect("Fixture base URL should parse."))
	}

	#[test]
	fn defaults_match_deployed_server() {
		let config = ClientConfig::default();

		assert_eq!(config.base_url.as_str(), "http://localhost:8080/");
		assert!(config.is_expiry(403));
		assert!(!config.is_expiry(401));
		assert!(config.is_rejection(401));
		assert_eq!(config.reissue_path, "/token/re-issue");
		assert_eq!(config.missing_refresh_policy, MissingRefreshPolicy::Propagate);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn resolve_keeps_base_path() {
		let config = config("https://api.example.com/v1");

		assert_eq!(config.base_url.as_str(), "https://api.example.com/v1/");
		assert_eq!(
			config.resolve("/token/re-issue").expect("Path should resolve.").as_str(),
			"https://api.example.com/v1/token/re-issue",
		);
		assert_eq!(
			config.resolve("groups/7?page=2").expect("Path should resolve.").as_str(),
			"https://api.example.com/v1/groups/7?page=2",
		);
	}

	#[test]
	fn resolve_treats_a_bare_base_path_as_a_directory() {
		let config = ClientConfig {
			base_url: Url::parse("http://h/api").expect("Fixture base URL should parse."),
			..ClientConfig::default()
		};

		assert!(config.validate().is_ok());
		assert_eq!(
			config.resolve("/groups").expect("Path should resolve.").as_str(),
			"http://h/api/groups",
		);
	}

	#[test]
	fn json_overrides_and_defaults_combine() {
		let config = ClientConfig::from_json_str(
			"{\"baseUrl\":\"http://127.0.0.1:9000\",\"expiryStatus\":401,\"missingRefreshPolicy\":\"forceLogout\"}",
		)
		.expect("Configuration document should parse.");

		assert_eq!(config.base_url.as_str(), "http://127.0.0.1:9000/");
		assert_eq!(config.expiry_status, 401);
		assert_eq!(config.missing_refresh_policy, MissingRefreshPolicy::ForceLogout);
		assert_eq!(config.sign_in_path, "/auth/signin");
	}

	#[test]
	fn json_errors_report_the_field_path() {
		let err = ClientConfig::from_json_str("{\"expiryStatus\":\"soon\"}")
			.expect_err("Non-numeric status should fail to parse.");

		match err {
			ConfigError::Parse { source } => assert_eq!(source.path().to_string(), "expiryStatus"),
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	#[test]
	fn validate_rejects_bad_values() {
		let err = ClientConfig::default()
			.with_expiry_status(200)
			.validate()
			.expect_err("Success statuses cannot signal expiry.");

		assert!(matches!(err, ConfigError::InvalidExpiryStatus { status: 200 }));

		let err = ClientConfig::default()
			.with_reissue_path("  ")
			.validate()
			.expect_err("Blank reissue path should be rejected.");

		assert!(matches!(err, ConfigError::EmptyPath { field: "reissue" }));
	}
}
