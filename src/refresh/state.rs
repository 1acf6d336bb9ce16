//! In-flight flag and replay queue guarded by the coordinator's lock.

// std
use std::collections::VecDeque;
// crates.io
use tokio::sync::oneshot;
// self
use crate::{auth::BearerToken, error::RefreshError};

/// Outcome delivered to every request waiting on a refresh episode.
pub type ReplayOutcome = Result<BearerToken, RefreshError>;

/// Identifier assigned to each waiting request, in arrival order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplayId(pub(crate) u64);

/// A suspended request waiting on the outcome of the in-flight refresh.
#[derive(Debug)]
pub struct PendingReplay {
	id: ReplayId,
	tx: oneshot::Sender<ReplayOutcome>,
}
impl PendingReplay {
	fn new(id: ReplayId) -> (Self, oneshot::Receiver<ReplayOutcome>) {
		let (tx, rx) = oneshot::channel();

		(Self { id, tx }, rx)
	}

	/// Identifier of the waiting request.
	pub fn id(&self) -> ReplayId {
		self.id
	}

	/// Resumes the waiting request. Returns `false` when it has already gone away.
	pub(crate) fn resolve(self, outcome: ReplayOutcome) -> bool {
		self.tx.send(outcome).is_ok()
	}
}

/// How a qualifying authentication failure entered the coordinator.
#[derive(Debug)]
pub(crate) enum Admission {
	/// First failure of an episode; the caller must start the refresh call.
	Leader(oneshot::Receiver<ReplayOutcome>),
	/// An episode is already running; the caller only waits.
	Follower(oneshot::Receiver<ReplayOutcome>),
	/// The queue is at capacity.
	Rejected(RefreshError),
}

/// `Idle` / `Refreshing` state plus the FIFO replay queue.
#[derive(Debug, Default)]
pub struct RefreshState {
	in_flight: bool,
	next_id: u64,
	queue: VecDeque<PendingReplay>,
}
impl RefreshState {
	/// Returns `true` while a refresh call is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.in_flight
	}

	/// Number of requests waiting on the current episode.
	pub fn pending(&self) -> usize {
		self.queue.len()
	}

	/// Enqueues a waiter, starting an episode when idle.
	///
	/// Replay ids are assigned here so they follow queue order.
	pub(crate) fn admit(&mut self, limit: usize) -> Admission {
		if self.in_flight && self.queue.len() >= limit {
			return Admission::Rejected(RefreshError::QueueFull { limit });
		}

		let id = ReplayId(self.next_id);

		self.next_id += 1;

		let (replay, rx) = PendingReplay::new(id);

		self.queue.push_back(replay);

		if self.in_flight {
			Admission::Follower(rx)
		} else {
			self.in_flight = true;

			Admission::Leader(rx)
		}
	}

	/// Returns to `Idle` and hands back every waiter in arrival order.
	pub(crate) fn settle(&mut self) -> VecDeque<PendingReplay> {
		self.in_flight = false;

		std::mem::take(&mut self.queue)
	}
}
