//! Client configuration: API base URL, auth endpoint paths, the exempt endpoint set, and the
//! refresh timeout + replay queue bounds.
//!
//! Values are assembled through [`ClientConfigBuilder`], which validates every invariant before
//! handing out a [`ClientConfig`]. Configurations deserialized from external sources should be
//! checked with [`ClientConfig::validate`] before use.

/// Builder API for assembling client configurations.
pub mod builder;

pub use builder::*;

// std
use std::collections::BTreeSet;
// self
use crate::{_prelude::*, error::ConfigError};

/// Base URL used by the original deployment when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Auth endpoint paths, relative to the API base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
	/// Account creation endpoint.
	pub signup: String,
	/// Credential login endpoint.
	pub login: String,
	/// Session termination endpoint.
	pub logout: String,
	/// Access-token refresh endpoint (refresh credential travels in a cookie).
	pub refresh: String,
}
impl Default for Endpoints {
	fn default() -> Self {
		Self {
			signup: "/auth/signup".into(),
			login: "/auth/login".into(),
			logout: "/auth/logout".into(),
			refresh: "/auth/refresh".into(),
		}
	}
}

/// Endpoints whose own 401 responses must never start a refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptEndpoints(BTreeSet<String>);
impl ExemptEndpoints {
	/// Builds the fixed `{login, signup, refresh}` set for `endpoints`.
	pub fn for_endpoints(endpoints: &Endpoints) -> Self {
		Self::default()
			.with(&endpoints.login)
			.with(&endpoints.signup)
			.with(&endpoints.refresh)
	}

	/// Adds another exempt path.
	pub fn with(mut self, path: impl AsRef<str>) -> Self {
		self.insert(path);

		self
	}

	/// Adds another exempt path in place.
	pub fn insert(&mut self, path: impl AsRef<str>) {
		self.0.insert(normalize_path(path.as_ref()));
	}

	/// Returns `true` when `path` targets an exempt endpoint.
	///
	/// Query strings, fragments, and trailing slashes are ignored.
	pub fn contains(&self, path: &str) -> bool {
		self.0.contains(&normalize_path(path))
	}

	/// Iterates over the normalized exempt paths.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(String::as_str)
	}
}

/// Validated client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// API base URL every request path is appended to.
	pub base_url: Url,
	/// Auth endpoint paths.
	pub endpoints: Endpoints,
	/// Paths whose 401 responses are surfaced without a refresh.
	pub exempt: ExemptEndpoints,
	/// Upper bound on a single refresh call; expiry fails the whole episode.
	pub refresh_timeout: Duration,
	/// Maximum number of requests that may wait on one refresh episode.
	pub max_pending_replays: usize,
}
impl ClientConfig {
	/// Default refresh timeout.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::seconds(30);
	/// Default replay queue capacity.
	pub const DEFAULT_MAX_PENDING_REPLAYS: usize = 1024;

	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Creates a builder for [`DEFAULT_BASE_URL`].
	pub fn default_builder() -> Result<ClientConfigBuilder, ClientConfigError> {
		ClientConfigBuilder::parse(DEFAULT_BASE_URL)
	}

	/// Resolves a request path (and optional extra query pairs) against the base URL.
	///
	/// The path is appended to the base path rather than replacing it, so `/auth/login` under
	/// `https://api.example.com/api/v1` becomes `https://api.example.com/api/v1/auth/login`.
	pub fn resolve(&self, path: &str, query: &[(String, String)]) -> Result<Url, ConfigError> {
		let base = self.base_url.as_str().trim_end_matches('/');
		let joined = if path.starts_with('/') {
			format!("{base}{path}")
		} else {
			format!("{base}/{path}")
		};
		let mut url =
			Url::parse(&joined).map_err(|source| ConfigError::InvalidRequestUrl { source })?;

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query.iter());
		}

		Ok(url)
	}

}

/// Normalizes a request path for exempt matching.
pub(crate) fn normalize_path(path: &str) -> String {
	let end = path.find(['?', '#']).unwrap_or(path.len());
	let trimmed = path[..end].trim_end_matches('/');

	if trimmed.starts_with('/') {
		trimmed.to_owned()
	} else {
		format!("/{trimmed}")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config() -> ClientConfig {
		ClientConfig::builder(
			Url::parse("https://api.example.com/api/v1/").expect("Fixture URL should parse."),
		)
		.build()
		.expect("Default configuration should validate.")
	}

	#[test]
	fn exempt_set_covers_login_signup_refresh_only() {
		let config = config();

		assert!(config.exempt.contains("/auth/login"));
		assert!(config.exempt.contains("/auth/signup/"));
		assert!(config.exempt.contains("/auth/refresh?reason=boot"));
		assert!(config.exempt.contains("auth/refresh"));
		assert!(!config.exempt.contains("/auth/logout"));
		assert!(!config.exempt.contains("/sessions"));
		assert!(!config.exempt.contains("/auth/login/extra"));
	}

	#[test]
	fn resolve_appends_to_base_path() {
		let config = config();
		let url = config
			.resolve("/sessions", &[("page".into(), "2".into())])
			.expect("Path should resolve.");

		assert_eq!(url.as_str(), "https://api.example.com/api/v1/sessions?page=2");

		let url = config.resolve("documents/42", &[]).expect("Relative path should resolve.");

		assert_eq!(url.as_str(), "https://api.example.com/api/v1/documents/42");
	}

	#[test]
	fn default_builder_targets_local_deployment() {
		let config = ClientConfig::default_builder()
			.expect("Default base URL should parse.")
			.build()
			.expect("Default configuration should validate.");
		let url = config.resolve(&config.endpoints.refresh, &[]).expect("Refresh should resolve.");

		assert_eq!(url.as_str(), "http://localhost:8000/api/v1/auth/refresh");
		assert_eq!(config.max_pending_replays, ClientConfig::DEFAULT_MAX_PENDING_REPLAYS);
	}
}
