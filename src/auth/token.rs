//! Bearer token values and the access-token record kept by the credential holder.

// self
use crate::_prelude::*;

/// Redacted bearer token wrapper keeping credential material out of logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);
impl BearerToken {
	/// Wraps a new token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Renders the `Authorization` header value (`Bearer <token>`).
	pub fn header_value(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl AsRef<str> for BearerToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl From<&str> for BearerToken {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl From<String> for BearerToken {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
impl Debug for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("BearerToken").field(&"<redacted>").finish()
	}
}
impl Display for BearerToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Access token issued by the login, signup, or refresh endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
	/// Bearer value attached to outgoing requests.
	pub token: BearerToken,
	/// Token type reported by the server (usually `bearer`).
	pub token_type: String,
	/// Instant the token was stored.
	pub issued_at: OffsetDateTime,
	/// Expiry derived from `expires_in`, when the server supplied one.
	pub expires_at: Option<OffsetDateTime>,
}
impl AccessToken {
	/// Creates a record with no known expiry.
	pub fn new(token: impl Into<BearerToken>) -> Self {
		Self {
			token: token.into(),
			token_type: "bearer".into(),
			issued_at: OffsetDateTime::now_utc(),
			expires_at: None,
		}
	}

	/// Sets the reported token type.
	pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = token_type.into();

		self
	}

	/// Derives the expiry from a relative lifetime in seconds.
	///
	/// Non-positive lifetimes leave the expiry unknown.
	pub fn with_expires_in(mut self, seconds: i64) -> Self {
		self.expires_at = (seconds > 0)
			.then(|| self.issued_at.checked_add(Duration::seconds(seconds)))
			.flatten();

		self
	}

	/// Returns `true` once the expiry instant has been reached.
	///
	/// Tokens without a known expiry are never considered expired locally; the server's 401
	/// remains the source of truth.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| now >= expires_at)
	}
}
