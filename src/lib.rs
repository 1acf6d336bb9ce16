//! Bearer-token HTTP client that keeps concurrent requests authenticated: one single-flight
//! refresh per expiry, FIFO replay of every request that hit the 401, and typed credential
//! broadcasts so the rest of the application hears about new tokens and lost sessions.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod payload;
pub mod refresh;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::{HashSet, VecDeque},
		sync::atomic::{AtomicUsize, Ordering},
	};
	// crates.io
	use ::http::{StatusCode, header::AUTHORIZATION};
	// self
	use crate::{
		client::AuthClient,
		config::{ClientConfig, ClientConfigBuilder, Endpoints, normalize_path},
		error::TransportError,
		http::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
		payload::Credentials,
	};

	/// Base URL used by in-process test clients.
	pub const TEST_BASE_URL: &str = "https://api.example.test/api/v1";

	/// Scripted answer for one call to the refresh endpoint.
	#[derive(Clone, Debug)]
	pub enum RefreshReply {
		/// Issue the token and accept it on protected endpoints.
		Issue(String),
		/// Issue the token but keep rejecting it.
		IssueUnaccepted(String),
		/// Answer with the given status.
		Reject(u16),
		/// Answer 200 with an envelope lacking the token.
		Malformed,
		/// Fail in transport.
		Fail,
		/// Never answer.
		Hang,
	}

	/// One call observed by [`MockApi`].
	#[derive(Clone, Debug, PartialEq, Eq)]
	pub struct RecordedCall {
		/// Request path as submitted.
		pub path: String,
		/// Raw `Authorization` header, if present.
		pub authorization: Option<String>,
	}

	/// In-process API double implementing [`HttpTransport`].
	///
	/// Protected paths answer 200 only for accepted bearer tokens and 401 otherwise. Login and
	/// signup accept [`MockApi::PASSWORD`] and issue [`MockApi::SESSION_TOKEN`]. Refresh replies
	/// are consumed in order from the plan; an empty plan answers 401.
	#[derive(Debug, Default)]
	pub struct MockApi {
		accepted: Mutex<HashSet<String>>,
		refresh_plan: Mutex<VecDeque<RefreshReply>>,
		refresh_delay: Option<Duration>,
		refresh_calls: AtomicUsize,
		calls: Mutex<Vec<RecordedCall>>,
	}
	impl MockApi {
		/// Token issued by login and signup.
		pub const SESSION_TOKEN: &'static str = "S1";
		/// The only password login and signup accept.
		pub const PASSWORD: &'static str = "correct";

		/// Creates an API double that answers refresh calls immediately.
		pub fn new() -> Arc<Self> {
			Arc::new(Self::default())
		}

		/// Creates an API double that holds every refresh call for `delay`.
		pub fn with_refresh_delay(delay: Duration) -> Arc<Self> {
			Arc::new(Self { refresh_delay: Some(delay), ..Default::default() })
		}

		/// Accepts `token` on protected paths.
		pub fn accept(&self, token: impl Into<String>) {
			self.accepted.lock().insert(token.into());
		}

		/// Queues the answer for the next refresh call.
		pub fn plan_refresh(&self, reply: RefreshReply) {
			self.refresh_plan.lock().push_back(reply);
		}

		/// Number of calls that reached the refresh endpoint.
		pub fn refresh_calls(&self) -> usize {
			self.refresh_calls.load(Ordering::SeqCst)
		}

		/// Calls observed for `path`, in arrival order.
		pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
			self.calls.lock().iter().filter(|call| call.path == path).cloned().collect()
		}

		async fn answer(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
			let authorization =
				request.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_owned);

			self.calls.lock().push(RecordedCall {
				path: request.path.clone(),
				authorization: authorization.clone(),
			});

			let endpoints = Endpoints::default();
			let path = normalize_path(&request.path);

			if path == endpoints.refresh {
				return self.answer_refresh().await;
			}
			if path == endpoints.login || path == endpoints.signup {
				return Ok(self.answer_login(&request));
			}
			if path == endpoints.logout {
				return Ok(json(
					StatusCode::OK,
					serde_json::json!({ "success": true, "message": "Logged out" }),
				));
			}

			let accepted = authorization
				.as_deref()
				.and_then(|value| value.strip_prefix("Bearer "))
				.is_some_and(|token| self.accepted.lock().contains(token));

			if accepted {
				Ok(json(StatusCode::OK, serde_json::json!({ "path": request.path })))
			} else {
				Ok(unauthorized())
			}
		}

		async fn answer_refresh(&self) -> Result<ApiResponse, TransportError> {
			self.refresh_calls.fetch_add(1, Ordering::SeqCst);

			let reply = self.refresh_plan.lock().pop_front().unwrap_or(RefreshReply::Reject(401));

			if let Some(delay) = self.refresh_delay {
				tokio::time::sleep(delay.unsigned_abs()).await;
			}

			match reply {
				RefreshReply::Issue(token) => {
					self.accept(token.clone());

					Ok(issued(&token))
				},
				RefreshReply::IssueUnaccepted(token) => Ok(issued(&token)),
				RefreshReply::Reject(status) => Ok(ApiResponse::new(
					StatusCode::from_u16(status).unwrap_or(StatusCode::UNAUTHORIZED),
					r#"{"detail":"Invalid refresh token"}"#,
				)),
				RefreshReply::Malformed =>
					Ok(json(StatusCode::OK, serde_json::json!({ "success": true }))),
				RefreshReply::Fail => Err(TransportError::Io(std::io::Error::new(
					std::io::ErrorKind::ConnectionReset,
					"connection reset",
				))),
				RefreshReply::Hang => std::future::pending().await,
			}
		}

		fn answer_login(&self, request: &ApiRequest) -> ApiResponse {
			let credentials = request
				.body
				.as_deref()
				.and_then(|body| serde_json::from_slice::<Credentials>(body).ok());

			match credentials {
				Some(credentials) if credentials.password == Self::PASSWORD => {
					self.accept(Self::SESSION_TOKEN);

					issued(Self::SESSION_TOKEN)
				},
				_ => unauthorized(),
			}
		}
	}
	impl HttpTransport for MockApi {
		fn execute(&self, _url: Url, request: ApiRequest) -> TransportFuture<'_> {
			Box::pin(self.answer(request))
		}
	}

	/// Builder preloaded with [`TEST_BASE_URL`].
	pub fn test_config_builder() -> ClientConfigBuilder {
		ClientConfigBuilder::parse(TEST_BASE_URL).expect("Test base URL should parse.")
	}

	/// Default configuration pointing at [`TEST_BASE_URL`].
	pub fn test_config() -> ClientConfig {
		test_config_builder().build().expect("Test configuration should validate.")
	}

	/// Builds a client over a fresh [`MockApi`].
	pub fn build_mock_client() -> (AuthClient<MockApi>, Arc<MockApi>) {
		client_over(MockApi::new())
	}

	/// Builds a client over a [`MockApi`] whose refresh calls take `delay`.
	pub fn build_mock_client_with_delay(delay: Duration) -> (AuthClient<MockApi>, Arc<MockApi>) {
		client_over(MockApi::with_refresh_delay(delay))
	}

	fn client_over(api: Arc<MockApi>) -> (AuthClient<MockApi>, Arc<MockApi>) {
		let client = AuthClient::with_transport(test_config(), Arc::clone(&api))
			.expect("Mock client should build.");

		(client, api)
	}

	fn issued(token: &str) -> ApiResponse {
		json(
			StatusCode::OK,
			serde_json::json!({
				"success": true,
				"message": "Token issued",
				"token": { "access_token": token, "token_type": "bearer", "expires_in": 900 },
				"refresh_token": null,
				"user_id": "u-1",
			}),
		)
	}

	fn unauthorized() -> ApiResponse {
		ApiResponse::new(StatusCode::UNAUTHORIZED, r#"{"detail":"Not authenticated"}"#)
	}

	fn json(status: StatusCode, value: serde_json::Value) -> ApiResponse {
		ApiResponse::json(status, &value).expect("JSON values always serialize.")
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
