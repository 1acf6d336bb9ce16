//! Single-flight access-token refresh with a FIFO replay queue.
//!
//! Every request that earns a 401 on a non-exempt endpoint ends up in
//! [`RefreshCoordinator::recover`]. The first one flips the coordinator into `Refreshing`,
//! enqueues itself, and spawns the episode: exactly one `POST` to the refresh endpoint, bounded
//! by the configured timeout. Later failures only enqueue and wait. When the call settles, the
//! credential holder is updated (or cleared), the outcome is broadcast, and every waiter is
//! resolved in arrival order under the same lock that returns the coordinator to `Idle`.
//!
//! The episode runs on its own task so a caller dropping its request future cannot abort the
//! refresh for everyone else. The `Idle` transition lives in [`Episode`]'s drop guard, so a
//! panicking listener or a runtime shutdown releases the waiters with
//! [`RefreshError::Cancelled`] instead of leaving them suspended.

mod metrics;
mod state;

pub use metrics::RefreshMetrics;
pub use state::*;

// std
use std::collections::VecDeque;
// crates.io
use http::{HeaderValue, header::CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, BearerToken, CredentialBroadcast, CredentialEvent, CredentialHolder},
	config::ClientConfig,
	error::{ConfigError, RefreshError},
	http::{ApiRequest, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	payload::{self, AuthPayload},
};

/// Owns the refresh state machine for one client.
pub struct RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	config: Arc<ClientConfig>,
	refresh_url: Url,
	holder: CredentialHolder,
	broadcast: CredentialBroadcast,
	state: Mutex<RefreshState>,
	metrics: Arc<RefreshMetrics>,
}
impl<T> RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a coordinator that refreshes through `transport` and writes into `holder`.
	pub fn new(
		config: Arc<ClientConfig>,
		transport: Arc<T>,
		holder: CredentialHolder,
		broadcast: CredentialBroadcast,
	) -> Result<Self, ConfigError> {
		let refresh_url = config.resolve(&config.endpoints.refresh, &[])?;

		Ok(Self {
			transport,
			config,
			refresh_url,
			holder,
			broadcast,
			state: Mutex::new(RefreshState::default()),
			metrics: Default::default(),
		})
	}

	/// Counters for episodes and waiters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Returns `true` while a refresh call is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().is_refreshing()
	}

	/// Number of requests waiting on the current episode.
	pub fn pending(&self) -> usize {
		self.state.lock().pending()
	}

	/// Joins the in-flight episode or starts a new one, and waits for its outcome.
	///
	/// Must be called from within a tokio runtime; the episode runs on a spawned task.
	pub async fn refresh(self: &Arc<Self>) -> Result<BearerToken, RefreshError> {
		self.await_admission(self.admit(None)).await
	}

	/// Entry point for a request that just received a qualifying 401.
	///
	/// `sent` is the bearer the failed dispatch carried. When no episode is running and the
	/// holder already carries a different token, an episode finished while the request was on
	/// the wire: the current token is returned without a new refresh call.
	pub async fn recover(
		self: &Arc<Self>,
		sent: Option<&BearerToken>,
	) -> Result<BearerToken, RefreshError> {
		self.await_admission(self.admit(Some(sent))).await
	}

	fn admit(&self, stale_check: Option<Option<&BearerToken>>) -> Result<Admission, BearerToken> {
		let mut state = self.state.lock();

		let stale = stale_check
			.filter(|_| !state.is_refreshing())
			.and_then(|sent| self.holder.bearer().filter(|current| sent != Some(current)));

		if let Some(current) = stale {
			return Err(current);
		}

		Ok(state.admit(self.config.max_pending_replays))
	}

	async fn await_admission(
		self: &Arc<Self>,
		admission: Result<Admission, BearerToken>,
	) -> Result<BearerToken, RefreshError> {
		let rx = match admission {
			Ok(Admission::Leader(rx)) => {
				self.start_episode();

				rx
			},
			Ok(Admission::Follower(rx)) => {
				self.metrics.record_join();

				#[cfg(feature = "tracing")]
				tracing::debug!("Joined in-flight refresh episode.");

				rx
			},
			Ok(Admission::Rejected(err)) => {
				self.metrics.record_rejected_waiters(1);

				#[cfg(feature = "tracing")]
				tracing::warn!(error = %err, "Replay queue is full.");

				return Err(err);
			},
			Err(current) => {
				self.metrics.record_shortcut();

				#[cfg(feature = "tracing")]
				tracing::debug!("Replaying stale-token failure with the current token.");

				return Ok(current);
			},
		};

		rx.await.unwrap_or(Err(RefreshError::Cancelled))
	}

	fn start_episode(self: &Arc<Self>) {
		let episode = Episode { coordinator: Arc::clone(self), settled: false };

		self.metrics.record_attempt();

		#[cfg(feature = "tracing")]
		tracing::debug!("Starting refresh episode.");

		tokio::spawn(episode.run());
	}

	async fn call_refresh_endpoint(&self) -> Result<AccessToken, RefreshError> {
		let timeout = self.config.refresh_timeout;

		tokio::time::timeout(timeout.unsigned_abs(), self.exchange())
			.await
			.unwrap_or(Err(RefreshError::TimedOut { after: timeout }))
	}

	async fn exchange(&self) -> Result<AccessToken, RefreshError> {
		let request = ApiRequest::post(self.config.endpoints.refresh.clone())
			.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.with_body(b"{}".to_vec());
		let response = self.transport.execute(self.refresh_url.clone(), request).await?;

		if !response.status.is_success() {
			return Err(RefreshError::Rejected { status: response.status.as_u16() });
		}

		let payload = payload::parse::<AuthPayload>(&response.body)
			.map_err(|err| RefreshError::Malformed { message: err.to_string() })?;
		let record = payload.access_token();

		// Replays must be able to carry the token.
		HeaderValue::from_str(&record.token.header_value()).map_err(|_| {
			RefreshError::Malformed { message: "access token is not a valid header value".into() }
		})?;

		Ok(record)
	}

	fn publish_outcome(&self, outcome: Result<AccessToken, RefreshError>) -> ReplayOutcome {
		match outcome {
			Ok(record) => {
				let token = record.token.clone();

				self.holder.store(record);
				self.metrics.record_success();
				self.broadcast.publish(CredentialEvent::TokenUpdated(token.clone()));

				Ok(token)
			},
			Err(err) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(error = %err, kind = err.as_str(), "Refresh episode failed.");

				self.holder.clear();
				self.metrics.record_failure();
				self.broadcast.publish(CredentialEvent::AuthenticationFailed);

				Err(err)
			},
		}
	}

	fn drain(&self, queue: VecDeque<PendingReplay>, outcome: ReplayOutcome) {
		let waiting = queue.len();
		let mut resumed = 0;

		for replay in queue {
			#[cfg(feature = "tracing")]
			tracing::trace!(replay = replay.id().0, "Resuming queued request.");

			if replay.resolve(outcome.clone()) {
				resumed += 1;
			}
		}

		if outcome.is_err() {
			self.metrics.record_rejected_waiters(waiting);
		}

		#[cfg(feature = "tracing")]
		tracing::debug!(waiting, resumed, ok = outcome.is_ok(), "Refresh episode drained.");
		#[cfg(not(feature = "tracing"))]
		let _ = resumed;
	}
}
impl<T> Debug for RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("refresh_url", &self.refresh_url.as_str())
			.field("refreshing", &state.is_refreshing())
			.field("pending", &state.pending())
			.finish()
	}
}

/// One refresh episode; returning to `Idle` happens when it settles or is dropped.
struct Episode<T>
where
	T: ?Sized + HttpTransport,
{
	coordinator: Arc<RefreshCoordinator<T>>,
	settled: bool,
}
impl<T> Episode<T>
where
	T: ?Sized + HttpTransport,
{
	async fn run(self) {
		const KIND: FlowKind = FlowKind::Refresh;

		let coordinator = Arc::clone(&self.coordinator);
		let span = FlowSpan::new(KIND, "episode").with_path(&coordinator.config.endpoints.refresh);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = span.instrument(coordinator.call_refresh_endpoint()).await;

		obs::record_flow_outcome(
			KIND,
			if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
		);

		let outcome = coordinator.publish_outcome(outcome);

		self.settle(outcome);
	}

	fn settle(mut self, outcome: ReplayOutcome) {
		self.settled = true;

		let queue = self.coordinator.state.lock().settle();

		self.coordinator.drain(queue, outcome);
	}
}
impl<T> Drop for Episode<T>
where
	T: ?Sized + HttpTransport,
{
	fn drop(&mut self) {
		if self.settled {
			return;
		}

		let queue = self.coordinator.state.lock().settle();

		self.coordinator.metrics.record_failure();
		self.coordinator.drain(queue, Err(RefreshError::Cancelled));
	}
}
