//! Outcomes reported by the fixed-window limiter.

// self
use crate::{_prelude::*, clock};

/// Quota snapshot attached to every limiter outcome, allowed or not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitStatus {
	/// Configured ceiling for the window.
	pub limit: u32,
	/// Requests still available in the current window.
	pub remaining: u32,
	/// Instant the current window closes.
	pub window_reset_at: OffsetDateTime,
}
impl RateLimitStatus {
	/// Window close as whole epoch seconds, rounded up.
	pub fn reset_epoch_secs(&self) -> i64 {
		let ms = clock::to_epoch_ms(self.window_reset_at);

		ms.div_euclid(1_000) + i64::from(ms.rem_euclid(1_000) != 0)
	}
}

/// Result emitted by [`RateLimiter::check`](crate::rate_limit::RateLimiter::check).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed.
	Allow(RateLimitStatus),
	/// The quota is exhausted until the window closes.
	Reject {
		/// Quota snapshot; `remaining` is zero.
		status: RateLimitStatus,
		/// When the caller may retry.
		retry: RetryDirective,
	},
}
impl RateLimitDecision {
	/// Returns `true` for [`RateLimitDecision::Allow`].
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allow(_))
	}

	/// Quota snapshot regardless of the outcome.
	pub fn status(&self) -> &RateLimitStatus {
		match self {
			Self::Allow(status) | Self::Reject { status, .. } => status,
		}
	}
}

/// Advises callers when to retry after a rejection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when it is safe to retry.
	pub earliest_retry_at: OffsetDateTime,
	/// Time left until `earliest_retry_at`, measured when the rejection happened.
	pub recommended_backoff: Duration,
	/// Optional descriptive string.
	pub reason: Option<String>,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff, reason: None }
	}

	/// Adds a human-readable reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}

	/// Backoff in whole seconds, rounded up, as advertised through `Retry-After`.
	pub fn retry_after_secs(&self) -> u64 {
		let millis = u64::try_from(self.recommended_backoff.whole_milliseconds()).unwrap_or(0);

		millis.div_ceil(1_000)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn retry_after_rounds_up_to_whole_seconds() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);

		for (backoff_ms, expected) in [(1, 1), (999, 1), (1_000, 1), (1_001, 2), (0, 0), (-5, 0)] {
			let backoff = Duration::milliseconds(backoff_ms);
			let directive = RetryDirective::new(now + backoff, backoff);

			assert_eq!(directive.retry_after_secs(), expected, "Backoff of {backoff_ms} ms.");
		}
	}

	#[test]
	fn reset_seconds_round_up() {
		let status = RateLimitStatus {
			limit: 3,
			remaining: 0,
			window_reset_at: macros::datetime!(2025-01-01 00:00:00.2 UTC),
		};

		assert_eq!(status.reset_epoch_secs(), 1_735_689_601);
	}
}
