//! Request/response models and the transport seam the client dispatches through.
//!
//! [`HttpTransport`] is the client's only dependency on an HTTP stack. The default `reqwest`
//! feature ships [`ReqwestTransport`], which keeps a cookie store so the HTTP-only refresh
//! cookie set by login travels with every refresh call. Tests and embedders can inject their
//! own implementation through [`crate::client::AuthClient::with_transport`].

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use http::{
	HeaderMap, HeaderValue, Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderName},
};
// self
use crate::{
	_prelude::*,
	auth::BearerToken,
	error::{ConfigError, TransportError},
	payload,
};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports that execute fully prepared requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared between the
/// client and its refresh coordinator, and the futures they return must be `Send` so requests
/// can hop executors. A transport reports every HTTP status as `Ok`; only failures to obtain a
/// response at all map to [`TransportError`].
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` against the resolved `url`.
	fn execute(&self, url: Url, request: ApiRequest) -> TransportFuture<'_>;
}

/// Outgoing request description submitted by application code.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base URL.
	pub path: String,
	/// Extra query pairs appended to the resolved URL.
	pub query: Vec<(String, String)>,
	/// Request headers; `Authorization` is managed by the client.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a request with no headers or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			headers: HeaderMap::new(),
			body: None,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Appends a query pair.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets a header, replacing any previous value.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Encodes `payload` as the JSON body and sets the content type.
	pub fn with_json<T>(mut self, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(payload)?);
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Rewrites the `Authorization` header to carry `token`.
	///
	/// The header is marked sensitive so it stays out of `Debug` output.
	pub fn set_bearer(&mut self, token: &BearerToken) -> Result<(), ConfigError> {
		let mut value = HeaderValue::from_str(&token.header_value())?;

		value.set_sensitive(true);
		self.headers.insert(AUTHORIZATION, value);

		Ok(())
	}

	/// Returns the raw `Authorization` header, if any.
	pub fn authorization(&self) -> Option<&HeaderValue> {
		self.headers.get(AUTHORIZATION)
	}
}

/// Completed response returned by a transport.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	const BODY_PREVIEW_LEN: usize = 256;

	/// Creates a response with no headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Creates a JSON response from a serializable payload.
	pub fn json<T>(status: StatusCode, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let mut response = Self::new(status, serde_json::to_vec(payload)?);

		response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(response)
	}

	/// Returns `true` for the designated "unauthenticated" status (401).
	pub fn is_unauthenticated(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Decodes the body as JSON, reporting the failing path on error.
	pub fn decode<T>(&self) -> Result<T>
	where
		T: serde::de::DeserializeOwned,
	{
		payload::parse(&self.body)
			.map_err(|source| Error::Decode { source, status: self.status.as_u16() })
	}

	/// Returns the body as (lossy) UTF-8 text.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Converts non-2xx responses into [`Error::Status`].
	pub fn error_for_status(self) -> Result<Self> {
		if self.status.is_success() {
			return Ok(self);
		}

		let mut body_preview = self.text();

		if body_preview.len() > Self::BODY_PREVIEW_LEN {
			let mut cut = Self::BODY_PREVIEW_LEN;

			while !body_preview.is_char_boundary(cut) {
				cut -= 1;
			}

			body_preview.truncate(cut);
		}

		Err(Error::Status { status: self.status.as_u16(), body_preview })
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Build it with [`ReqwestTransport::new`] to get a cookie-enabled client; a custom client
/// passed to [`ReqwestTransport::with_client`] must enable its own cookie store or the refresh
/// endpoint will never see the refresh cookie.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a reqwest client with a cookie store.
	pub fn new() -> Result<Self, ConfigError> {
		Ok(Self(ReqwestClient::builder().cookie_store(true).build()?))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, url: Url, request: ApiRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut builder = client.request(request.method, url.clone()).headers(request.headers);

			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response =
				builder.send().await.map_err(|err| TransportError::network(&url, err))?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body =
				response.bytes().await.map_err(|err| TransportError::network(&url, err))?.to_vec();

			Ok(ApiResponse { status, headers, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn bearer_header_is_sensitive_and_replaced() {
		let mut request = ApiRequest::get("/sessions");

		request.set_bearer(&BearerToken::new("t1")).expect("Token should be a valid header.");
		request.set_bearer(&BearerToken::new("t2")).expect("Token should be a valid header.");

		let value = request.authorization().expect("Authorization header should be set.");

		assert_eq!(value.to_str().ok(), Some("Bearer t2"));
		assert!(value.is_sensitive());
		assert!(!format!("{request:?}").contains("t2"));
		assert!(request.set_bearer(&BearerToken::new("bad\ntoken")).is_err());
	}

	#[test]
	fn decode_reports_json_path() {
		#[derive(Debug, Deserialize)]
		struct Payload {
			#[allow(dead_code)]
			token: Inner,
		}
		#[derive(Debug, Deserialize)]
		struct Inner {
			#[allow(dead_code)]
			access_token: String,
		}

		let response = ApiResponse::new(StatusCode::OK, r#"{"token":{"access_token":7}}"#);
		let err = response.decode::<Payload>().expect_err("Numbers are not token strings.");

		match err {
			Error::Decode { source, status } => {
				assert_eq!(status, 200);
				assert_eq!(source.path().to_string(), "token.access_token");
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn error_for_status_truncates_preview() {
		let body = "é".repeat(300);
		let err = ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR, body)
			.error_for_status()
			.expect_err("500 responses should become errors.");

		match err {
			Error::Status { status, body_preview } => {
				assert_eq!(status, 500);
				assert!(body_preview.len() <= 256);
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}

		assert!(ApiResponse::new(StatusCode::NO_CONTENT, "").error_for_status().is_ok());
	}
}
