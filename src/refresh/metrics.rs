// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh episodes and the requests waiting on them.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	joined: AtomicU64,
	shortcuts: AtomicU64,
	rejected_waiters: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of refresh network calls started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of episodes that stored a new token.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of episodes that failed (including timeouts and cancellations).
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns how many requests joined an episode another request started.
	pub fn joined(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	/// Returns how many stale-token failures were replayed without a new episode.
	pub fn shortcuts(&self) -> u64 {
		self.shortcuts.load(Ordering::Relaxed)
	}

	/// Returns how many waiting requests were released with an error.
	pub fn rejected_waiters(&self) -> u64 {
		self.rejected_waiters.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_join(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_shortcut(&self) {
		self.shortcuts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rejected_waiters(&self, count: usize) {
		self.rejected_waiters.fetch_add(count as u64, Ordering::Relaxed);
	}
}
