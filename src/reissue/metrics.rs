// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for the reissue coordinator.
#[derive(Debug, Default)]
pub struct ReissueMetrics {
	expirations: AtomicU64,
	exchanges: AtomicU64,
	coalesced: AtomicU64,
	shortcuts: AtomicU64,
	replays: AtomicU64,
	failures: AtomicU64,
	forced_logouts: AtomicU64,
}
impl ReissueMetrics {
	/// Returns the number of expiry responses handed to the coordinator.
	pub fn expirations(&self) -> u64 {
		self.expirations.load(Ordering::Relaxed)
	}

	/// Returns the number of reissue exchanges that actually ran.
	pub fn exchanges(&self) -> u64 {
		self.exchanges.load(Ordering::Relaxed)
	}

	/// Returns the number of calls that joined an exchange started by another call.
	pub fn coalesced(&self) -> u64 {
		self.coalesced.load(Ordering::Relaxed)
	}

	/// Returns the number of calls replayed with a token another call already reissued.
	pub fn shortcuts(&self) -> u64 {
		self.shortcuts.load(Ordering::Relaxed)
	}

	/// Returns the number of replays sent.
	pub fn replays(&self) -> u64 {
		self.replays.load(Ordering::Relaxed)
	}

	/// Returns the number of logical calls that failed after reaching the coordinator.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Returns the number of forced logouts the coordinator triggered.
	pub fn forced_logouts(&self) -> u64 {
		self.forced_logouts.load(Ordering::Relaxed)
	}

	pub(crate) fn record_expiration(&self) {
		self.expirations.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_exchange(&self) {
		self.exchanges.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_coalesced(&self) {
		self.coalesced.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_shortcut(&self) {
		self.shortcuts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_replay(&self) {
		self.replays.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_forced_logout(&self) {
		self.forced_logouts.fetch_add(1, Ordering::Relaxed);
	}
}
