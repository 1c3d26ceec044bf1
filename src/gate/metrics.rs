// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, obs::GateStage};

/// Thread-safe counters for gate outcomes.
#[derive(Debug, Default)]
pub struct GateMetrics {
	admitted: AtomicU64,
	preflights: AtomicU64,
	origin_denied: AtomicU64,
	auth_denied: AtomicU64,
	rate_limited: AtomicU64,
	payload_rejected: AtomicU64,
	handler_errors: AtomicU64,
}
impl GateMetrics {
	/// Returns the number of requests that reached the handler.
	pub fn admitted(&self) -> u64 {
		self.admitted.load(Ordering::Relaxed)
	}

	/// Returns the number of requests rejected for exceeding a quota.
	pub fn rate_limited(&self) -> u64 {
		self.rate_limited.load(Ordering::Relaxed)
	}

	/// Returns the number of requests rejected by the API-key stage.
	pub fn auth_denied(&self) -> u64 {
		self.auth_denied.load(Ordering::Relaxed)
	}

	/// Copies every counter.
	pub fn snapshot(&self) -> GateCounters {
		GateCounters {
			admitted: self.admitted(),
			preflights: self.preflights.load(Ordering::Relaxed),
			origin_denied: self.origin_denied.load(Ordering::Relaxed),
			auth_denied: self.auth_denied(),
			rate_limited: self.rate_limited(),
			payload_rejected: self.payload_rejected.load(Ordering::Relaxed),
			handler_errors: self.handler_errors.load(Ordering::Relaxed),
		}
	}

	/// Zeroes every counter.
	pub fn reset(&self) {
		for counter in [
			&self.admitted,
			&self.preflights,
			&self.origin_denied,
			&self.auth_denied,
			&self.rate_limited,
			&self.payload_rejected,
			&self.handler_errors,
		] {
			counter.store(0, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_admitted(&self) {
		self.admitted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_preflight(&self) {
		self.preflights.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_denied(&self, stage: GateStage) {
		let counter = match stage {
			GateStage::Origin => &self.origin_denied,
			GateStage::ApiKey => &self.auth_denied,
			GateStage::RateLimit => &self.rate_limited,
			GateStage::PayloadSize => &self.payload_rejected,
			GateStage::SecurityHeaders | GateStage::Handler => &self.handler_errors,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_handler_error(&self) {
		self.handler_errors.fetch_add(1, Ordering::Relaxed);
	}
}

/// Point-in-time copy of [`GateMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateCounters {
	/// Requests that reached the handler.
	pub admitted: u64,
	/// Preflights answered by the gate.
	pub preflights: u64,
	/// Requests refused by the origin stage.
	pub origin_denied: u64,
	/// Requests refused by the API-key stage.
	pub auth_denied: u64,
	/// Requests refused by the rate-limit stage.
	pub rate_limited: u64,
	/// Requests refused by the payload-size stage.
	pub payload_rejected: u64,
	/// Handler failures.
	pub handler_errors: u64,
}
