//! Client-level error types shared across interceptors, the refresh coordinator, and transports.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) while dispatching an application request.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The refresh episode this request waited on failed.
	#[error(transparent)]
	Refresh(#[from] RefreshError),

	/// A 401 that the client will not recover from.
	#[error("Request to `{path}` was rejected as unauthenticated ({kind}).")]
	Unauthenticated {
		/// Why no refresh was attempted.
		kind: AuthFailureKind,
		/// Request path that failed.
		path: String,
		/// HTTP status code (the designated unauthenticated code).
		status: u16,
	},
	/// Non-success status surfaced through [`crate::http::ApiResponse::error_for_status`].
	#[error("Request failed with HTTP status {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Leading part of the response body, for diagnostics.
		body_preview: String,
	},
	/// Response payload could not be decoded.
	#[error("Response payload is malformed.")]
	Decode {
		/// Structured parsing failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
}

/// Why a 401 response was surfaced without a refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthFailureKind {
	/// The endpoint is exempt from refresh (login, signup, refresh itself).
	Exempt,
	/// The request was already replayed once after a refresh.
	Terminal,
}
impl AuthFailureKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Exempt => "exempt",
			Self::Terminal => "terminal",
		}
	}
}
impl Display for AuthFailureKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and request construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Client configuration failed validation.
	#[error(transparent)]
	InvalidClientConfig(#[from] crate::config::ClientConfigError),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Request path could not be resolved into a URL.
	#[error("Request URL is invalid.")]
	InvalidRequestUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A header value contains bytes that are not allowed in HTTP headers.
	#[error("Header value is invalid.")]
	InvalidHeader(#[from] http::header::InvalidHeaderValue),
	/// Request body could not be encoded as JSON.
	#[error("Request body could not be encoded as JSON.")]
	BodyEncode(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
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
	#[error("Network error occurred while calling `{url}`.")]
	Network {
		/// Target URL.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: &Url, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}

/// Failure of a refresh episode, fanned out to every waiting request.
#[derive(Clone, Debug, ThisError)]
pub enum RefreshError {
	/// The refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the request with HTTP status {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
	},
	/// The refresh endpoint answered 2xx with a payload that could not be used.
	#[error("Refresh endpoint returned a malformed payload: {message}.")]
	Malformed {
		/// Parser message, including the failing JSON path.
		message: String,
	},
	/// The refresh call failed in transport.
	#[error("Refresh call failed in transport.")]
	Transport {
		/// Shared transport failure.
		#[source]
		source: Arc<TransportError>,
	},
	/// The refresh call did not settle within the configured timeout.
	#[error("Refresh call did not settle within {after}.")]
	TimedOut {
		/// Configured timeout.
		after: Duration,
	},
	/// The refresh episode was abandoned before it settled.
	#[error("Refresh episode was cancelled before it settled.")]
	Cancelled,
	/// Too many requests were already waiting on the episode.
	#[error("Refresh replay queue is full ({limit} waiting).")]
	QueueFull {
		/// Configured capacity.
		limit: usize,
	},
}
impl RefreshError {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Rejected { .. } => "rejected",
			Self::Malformed { .. } => "malformed",
			Self::Transport { .. } => "transport",
			Self::TimedOut { .. } => "timed_out",
			Self::Cancelled => "cancelled",
			Self::QueueFull { .. } => "queue_full",
		}
	}
}
impl From<crate::config::ClientConfigError> for Error {
	fn from(e: crate::config::ClientConfigError) -> Self {
		Self::Config(e.into())
	}
}

impl From<TransportError> for RefreshError {
	fn from(e: TransportError) -> Self {
		Self::Transport { source: Arc::new(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn refresh_errors_clone_and_keep_sources() {
		let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
		let original = RefreshError::from(TransportError::Io(io));
		let copy = original.clone();
		let err: Error = copy.into();

		assert!(matches!(err, Error::Refresh(RefreshError::Transport { .. })));

		let source = StdError::source(&err).expect("Transport refresh errors expose a source.");

		assert!(source.to_string().contains("I/O error"));
		assert_eq!(original.as_str(), "transport");
	}

	#[test]
	fn config_validation_errors_lift_into_client_errors() {
		fn build() -> Result<crate::config::ClientConfig> {
			Ok(crate::config::ClientConfig::builder(
				Url::parse("https://api.example.com").expect("Fixture URL should parse."),
			)
			.max_pending_replays(0)
			.build()?)
		}

		let err = build().expect_err("Zero capacity should be rejected.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::InvalidClientConfig(
				crate::config::ClientConfigError::ZeroReplayCapacity
			))
		));
	}

	#[test]
	fn unauthenticated_message_names_kind() {
		let err = Error::Unauthenticated {
			kind: AuthFailureKind::Terminal,
			path: "/sessions".into(),
			status: 401,
		};

		assert_eq!(
			err.to_string(),
			"Request to `/sessions` was rejected as unauthenticated (terminal)."
		);
	}
}
