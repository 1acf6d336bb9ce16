// self
use crate::{
	_prelude::*,
	config::{ClientConfig, Endpoints, ExemptEndpoints},
};

/// Errors raised while constructing or validating client configurations.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ClientConfigError {
	/// Base URL string could not be parsed.
	#[error("Base URL is invalid: {source}.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL must be an absolute `http` or `https` URL.
	#[error("Base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// URL that failed validation.
		url: String,
	},
	/// Endpoint paths must be non-empty and absolute.
	#[error("The {endpoint} endpoint path must start with `/`: {path:?}.")]
	InvalidEndpointPath {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Offending path.
		path: String,
	},
	/// Refresh timeout must be positive.
	#[error("Refresh timeout must be positive.")]
	NonPositiveRefreshTimeout,
	/// Replay queue must accept at least one waiter.
	#[error("Replay queue capacity must be at least 1.")]
	ZeroReplayCapacity,
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// API base URL.
	pub base_url: Url,
	/// Auth endpoint paths.
	pub endpoints: Endpoints,
	/// Paths added to the exempt set on top of login, signup, and refresh.
	pub extra_exempt: Vec<String>,
	/// Refresh timeout.
	pub refresh_timeout: Duration,
	/// Replay queue capacity.
	pub max_pending_replays: usize,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with the provided base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			endpoints: Endpoints::default(),
			extra_exempt: Vec::new(),
			refresh_timeout: ClientConfig::DEFAULT_REFRESH_TIMEOUT,
			max_pending_replays: ClientConfig::DEFAULT_MAX_PENDING_REPLAYS,
		}
	}

	/// Parses `base_url` and creates a builder for it.
	pub fn parse(base_url: &str) -> Result<Self, ClientConfigError> {
		Url::parse(base_url)
			.map(Self::new)
			.map_err(|source| ClientConfigError::InvalidBaseUrl { source })
	}

	/// Overrides the auth endpoint paths.
	pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Adds a path to the exempt endpoint set.
	pub fn exempt_endpoint(mut self, path: impl Into<String>) -> Self {
		self.extra_exempt.push(path.into());

		self
	}

	/// Overrides the refresh timeout (defaults to 30 seconds).
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Overrides the replay queue capacity (defaults to 1024).
	pub fn max_pending_replays(mut self, limit: usize) -> Self {
		self.max_pending_replays = limit;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ClientConfigError> {
		let mut exempt = ExemptEndpoints::for_endpoints(&self.endpoints);

		for path in &self.extra_exempt {
			validate_path("exempt", path)?;

			exempt.insert(path);
		}

		let config = ClientConfig {
			base_url: self.base_url,
			endpoints: self.endpoints,
			exempt,
			refresh_timeout: self.refresh_timeout,
			max_pending_replays: self.max_pending_replays,
		};

		config.validate()?;

		Ok(config)
	}
}

impl ClientConfig {
	/// Validates invariants for the configuration.
	pub fn validate(&self) -> Result<(), ClientConfigError> {
		if !matches!(self.base_url.scheme(), "http" | "https") || self.base_url.cannot_be_a_base()
		{
			return Err(ClientConfigError::UnsupportedScheme { url: self.base_url.to_string() });
		}

		validate_path("signup", &self.endpoints.signup)?;
		validate_path("login", &self.endpoints.login)?;
		validate_path("logout", &self.endpoints.logout)?;
		validate_path("refresh", &self.endpoints.refresh)?;

		if !self.refresh_timeout.is_positive() {
			return Err(ClientConfigError::NonPositiveRefreshTimeout);
		}
		if self.max_pending_replays == 0 {
			return Err(ClientConfigError::ZeroReplayCapacity);
		}

		Ok(())
	}
}

fn validate_path(endpoint: &'static str, path: &str) -> Result<(), ClientConfigError> {
	if path.len() > 1 && path.starts_with('/') {
		Ok(())
	} else {
		Err(ClientConfigError::InvalidEndpointPath { endpoint, path: path.to_owned() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn builder_rejects_invalid_values() {
		let err = ClientConfigBuilder::parse("not a url")
			.expect_err("Unparseable base URLs should be rejected.");

		assert!(matches!(err, ClientConfigError::InvalidBaseUrl { .. }));

		let err = ClientConfigBuilder::parse("ftp://files.example.com")
			.expect("FTP URL should parse.")
			.build()
			.expect_err("Non-HTTP schemes should be rejected.");

		assert!(matches!(err, ClientConfigError::UnsupportedScheme { .. }));

		let err = ClientConfigBuilder::parse("https://api.example.com")
			.expect("Base URL should parse.")
			.endpoints(Endpoints { refresh: "auth/refresh".into(), ..Endpoints::default() })
			.build()
			.expect_err("Relative endpoint paths should be rejected.");

		assert_eq!(
			err,
			ClientConfigError::InvalidEndpointPath {
				endpoint: "refresh",
				path: "auth/refresh".into()
			}
		);

		let err = ClientConfigBuilder::parse("https://api.example.com")
			.expect("Base URL should parse.")
			.refresh_timeout(Duration::ZERO)
			.build()
			.expect_err("Zero timeouts should be rejected.");

		assert_eq!(err, ClientConfigError::NonPositiveRefreshTimeout);

		let err = ClientConfigBuilder::parse("https://api.example.com")
			.expect("Base URL should parse.")
			.max_pending_replays(0)
			.build()
			.expect_err("Zero capacity should be rejected.");

		assert_eq!(err, ClientConfigError::ZeroReplayCapacity);
	}

	#[test]
	fn builder_extends_exempt_set() {
		let config = ClientConfigBuilder::parse("https://api.example.com")
			.expect("Base URL should parse.")
			.exempt_endpoint("/auth/verify-email")
			.build()
			.expect("Configuration should validate.");

		assert!(config.exempt.contains("/auth/verify-email"));
		assert!(config.exempt.contains("/auth/login"));
		assert_eq!(config.exempt.iter().count(), 4);
		assert_eq!(config.refresh_timeout, ClientConfig::DEFAULT_REFRESH_TIMEOUT);
	}
}
