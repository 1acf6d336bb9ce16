//! Session endpoints: login, signup, and logout.

// self
use crate::{
	_prelude::*,
	client::AuthClient,
	http::{ApiRequest, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	payload::{AuthPayload, Credentials, LogoutPayload},
};

impl<T> AuthClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Logs in with `credentials` and installs the issued token.
	///
	/// The login endpoint is exempt from refresh, so bad credentials surface as
	/// [`Error::Unauthenticated`] without touching the coordinator. The server's refresh cookie
	/// is kept by the transport.
	pub async fn login(&self, credentials: &Credentials) -> Result<AuthPayload> {
		let path = self.config().endpoints.login.clone();

		self.open_session(FlowKind::Login, path, credentials).await
	}

	/// Creates an account and installs the issued token.
	pub async fn signup(&self, credentials: &Credentials) -> Result<AuthPayload> {
		let path = self.config().endpoints.signup.clone();

		self.open_session(FlowKind::Signup, path, credentials).await
	}

	/// Ends the session on the server and drops the held token.
	///
	/// The token is cleared even when the server call fails; no broadcast event is published.
	pub async fn logout(&self) -> Result<LogoutPayload> {
		const KIND: FlowKind = FlowKind::Logout;

		let path = self.config().endpoints.logout.clone();
		let span = FlowSpan::new(KIND, "logout").with_path(&path);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let response = self.send(ApiRequest::post(path)).await;

				self.holder().clear();

				let response = response?.error_for_status()?;

				if response.body.is_empty() {
					Ok(LogoutPayload::default())
				} else {
					response.decode::<LogoutPayload>()
				}
			})
			.await;

		record(KIND, &result);

		result
	}

	async fn open_session(
		&self,
		kind: FlowKind,
		path: String,
		credentials: &Credentials,
	) -> Result<AuthPayload> {
		let span = FlowSpan::new(kind, "open_session").with_path(&path);

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let response = self.post_json(path, credentials).await?.error_for_status()?;
				let payload = response.decode::<AuthPayload>()?;

				self.install_token(payload.access_token());

				#[cfg(feature = "tracing")]
				tracing::info!(user_id = ?payload.user_id, "Session opened.");

				Ok(payload)
			})
			.await;

		record(kind, &result);

		result
	}
}

fn record<V>(kind: FlowKind, result: &Result<V>) {
	obs::record_flow_outcome(
		kind,
		if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
	);
}
