//! The authenticated HTTP client: interceptor chain, refresh recovery, and session calls.

pub mod interceptor;

mod session;

pub use interceptor::{RequestContext, Verdict};

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, BearerToken, CredentialBroadcast, CredentialEvent, CredentialHolder},
	config::ClientConfig,
	http::{ApiRequest, ApiResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	refresh::{RefreshCoordinator, RefreshMetrics},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestAuthClient = AuthClient<ReqwestTransport>;

/// HTTP client that keeps every request armed with the current bearer token.
///
/// Each request passes the request interceptor (token attached), the transport, and the
/// response interceptor. A 401 on a non-exempt endpoint suspends the request on the shared
/// [`RefreshCoordinator`]; once the single refresh call settles the request is replayed through
/// the same chain with the new token, or rejected with the refresh failure. Clones share the
/// transport, credential holder, broadcast, and coordinator.
pub struct AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	config: Arc<ClientConfig>,
	holder: CredentialHolder,
	broadcast: CredentialBroadcast,
	coordinator: Arc<RefreshCoordinator<T>>,
}
impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client that dispatches through the caller-provided transport.
	pub fn with_transport(config: ClientConfig, transport: impl Into<Arc<T>>) -> Result<Self> {
		let config = Arc::new(config);
		let transport = transport.into();
		let holder = CredentialHolder::default();
		let broadcast = CredentialBroadcast::default();
		let coordinator = Arc::new(RefreshCoordinator::new(
			Arc::clone(&config),
			Arc::clone(&transport),
			holder.clone(),
			broadcast.clone(),
		)?);

		Ok(Self { transport, config, holder, broadcast, coordinator })
	}

	/// Validated configuration in use.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Credential holder shared with the coordinator.
	pub fn holder(&self) -> &CredentialHolder {
		&self.holder
	}

	/// Broadcast that announces token updates and authentication failures.
	pub fn broadcast(&self) -> &CredentialBroadcast {
		&self.broadcast
	}

	/// Refresh coordinator shared by all clones.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator<T>> {
		&self.coordinator
	}

	/// Refresh counters.
	pub fn refresh_metrics(&self) -> &Arc<RefreshMetrics> {
		self.coordinator.metrics()
	}

	/// Sends `request` through the interceptor chain.
	///
	/// Non-401 responses are returned as-is, whatever their status; use
	/// [`ApiResponse::error_for_status`] to treat them as errors.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "send").with_path(&request.path);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.dispatch(RequestContext::new(request))).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Sends a `GET` request for `path`.
	pub async fn get(&self, path: impl Into<String>) -> Result<ApiResponse> {
		self.send(ApiRequest::get(path)).await
	}

	/// Sends a `POST` request for `path` with a JSON body.
	pub async fn post_json<B>(&self, path: impl Into<String>, body: &B) -> Result<ApiResponse>
	where
		B: ?Sized + Serialize,
	{
		self.send(ApiRequest::post(path).with_json(body)?).await
	}

	/// Sends a `DELETE` request for `path`.
	pub async fn delete(&self, path: impl Into<String>) -> Result<ApiResponse> {
		self.send(ApiRequest::delete(path)).await
	}

	/// Requests a token from the refresh endpoint, joining any episode already in flight.
	///
	/// Application bootstrap calls this once to turn the refresh cookie into an access token.
	pub async fn restore_session(&self) -> Result<BearerToken> {
		let span = FlowSpan::new(FlowKind::Refresh, "restore_session");

		Ok(span.instrument(self.coordinator.refresh()).await?)
	}

	/// Stores `token` and announces it, as login and signup do.
	pub fn install_token(&self, token: AccessToken) {
		let bearer = token.token.clone();

		self.holder.store(token);
		self.broadcast.publish(CredentialEvent::TokenUpdated(bearer));
	}

	async fn dispatch(&self, mut ctx: RequestContext) -> Result<ApiResponse> {
		loop {
			interceptor::authorize(&self.holder, &mut ctx);

			let url = self.config.resolve(&ctx.request.path, &ctx.request.query)?;
			let response = self.transport.execute(url, ctx.request.clone()).await?;

			match interceptor::inspect(&self.config.exempt, &ctx, &response) {
				Verdict::Deliver => return Ok(response),
				Verdict::Reject(kind) => {
					obs::record_auth_failure(kind);

					return Err(Error::Unauthenticated {
						kind,
						path: ctx.request.path,
						status: response.status.as_u16(),
					});
				},
				Verdict::Refresh => {
					ctx.mark_retried();

					let token = self.coordinator.recover(ctx.sent_token()).await?;

					ctx.rewrite_bearer(&token)?;

					#[cfg(feature = "tracing")]
					tracing::debug!(path = %ctx.request.path, "Replaying request after refresh.");
				},
			}
		}
	}
}
#[cfg(feature = "reqwest")]
impl AuthClient<ReqwestTransport> {
	/// Creates a client backed by a cookie-enabled reqwest transport.
	pub fn new(config: ClientConfig) -> Result<Self> {
		Self::with_transport(config, ReqwestTransport::new()?)
	}
}
impl<T> Clone for AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: Arc::clone(&self.transport),
			config: Arc::clone(&self.config),
			holder: self.holder.clone(),
			broadcast: self.broadcast.clone(),
			coordinator: Arc::clone(&self.coordinator),
		}
	}
}
impl<T> Debug for AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("authenticated", &self.holder.is_authenticated())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}
