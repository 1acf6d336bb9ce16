//! Wire payloads exchanged with the auth endpoints.
//!
//! Login, signup, and refresh all answer with the same envelope:
//!
//! ```json
//! {"success":true,"message":"ok","token":{"access_token":"…","token_type":"bearer","expires_in":900},"user_id":"u-1"}
//! ```

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, BearerToken},
};

/// Login / signup request body.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Account email.
	pub email: String,
	/// Account password.
	pub password: String,
}
impl Credentials {
	/// Creates a credential pair.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Token section of an [`AuthPayload`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
	/// New bearer value.
	pub access_token: BearerToken,
	/// Reported token type.
	#[serde(default = "default_token_type")]
	pub token_type: String,
	/// Lifetime in seconds, when reported.
	#[serde(default)]
	pub expires_in: Option<i64>,
}

/// Response envelope returned by login, signup, and refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
	/// Server-side success flag.
	#[serde(default)]
	pub success: bool,
	/// Human-readable status message.
	#[serde(default)]
	pub message: String,
	/// Issued access token.
	pub token: TokenPayload,
	/// Identifier of the authenticated user, when reported.
	#[serde(default)]
	pub user_id: Option<String>,
}
impl AuthPayload {
	/// Converts the token section into the record kept by the credential holder.
	pub fn access_token(&self) -> AccessToken {
		let record = AccessToken::new(self.token.access_token.clone())
			.with_token_type(self.token.token_type.clone());

		match self.token.expires_in {
			Some(seconds) => record.with_expires_in(seconds),
			None => record,
		}
	}
}

/// Response body returned by logout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutPayload {
	/// Server-side success flag.
	#[serde(default)]
	pub success: bool,
	/// Human-readable status message.
	#[serde(default)]
	pub message: String,
}

fn default_token_type() -> String {
	"bearer".into()
}

/// Parses a JSON body, keeping the failing path for diagnostics.
pub(crate) fn parse<T>(body: &[u8]) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
where
	T: serde::de::DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn auth_payload_reads_original_envelope() {
		let payload: AuthPayload = parse(
			br#"{"success":true,"message":"Token refreshed","token":{"access_token":"T2","token_type":"bearer","expires_in":900},"refresh_token":null,"user_id":"u-1"}"#,
		)
		.expect("Envelope should parse.");
		let record = payload.access_token();

		assert_eq!(record.token.expose(), "T2");
		assert_eq!(record.token_type, "bearer");
		assert!(record.expires_at.is_some());
		assert_eq!(payload.user_id.as_deref(), Some("u-1"));
	}

	#[test]
	fn missing_token_reports_path() {
		let err = parse::<AuthPayload>(br#"{"success":true,"token":{}}"#)
			.expect_err("Envelopes without an access token are malformed.");

		assert_eq!(err.path().to_string(), "token");
		assert!(err.to_string().contains("access_token"));
	}

	#[test]
	fn credentials_redact_password() {
		let credentials = Credentials::new("a@example.com", "hunter2");

		assert!(!format!("{credentials:?}").contains("hunter2"));
	}
}
