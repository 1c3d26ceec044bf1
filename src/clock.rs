//! Time sources shared by the store, the limiter, and the gate.
//!
//! Components never call `OffsetDateTime::now_utc` directly; they ask an injected [`Clock`] so
//! expiry, staleness, and window arithmetic can be driven by a [`ManualClock`] in tests.

// crates.io
use time::{PrimitiveDateTime, format_description::well_known::Rfc3339};
// self
use crate::_prelude::*;

/// Source of the current UTC instant.
pub trait Clock
where
	Self: Debug + Send + Sync,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;

	/// Returns the current instant as epoch milliseconds.
	fn now_ms(&self) -> i64 {
		to_epoch_ms(self.now())
	}
}

/// Wall-clock time source.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Settable time source for deterministic tests.
#[derive(Debug)]
pub struct ManualClock(Mutex<OffsetDateTime>);
impl ManualClock {
	/// Creates a clock frozen at the provided instant.
	pub fn new(instant: OffsetDateTime) -> Self {
		Self(Mutex::new(instant))
	}

	/// Moves the clock forward (or backward for negative durations).
	pub fn advance(&self, delta: Duration) {
		let mut now = self.0.lock();

		*now += delta;
	}

	/// Pins the clock to an absolute instant.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::now_utc())
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}

/// Converts an instant into epoch milliseconds.
pub fn to_epoch_ms(instant: OffsetDateTime) -> i64 {
	i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

/// Formats an instant as RFC 3339, falling back to epoch seconds if formatting fails.
pub fn rfc3339(instant: OffsetDateTime) -> String {
	instant.format(&Rfc3339).unwrap_or_else(|_| instant.unix_timestamp().to_string())
}

/// Shifts an instant, clamping to the representable range instead of overflowing.
pub fn saturating_add(instant: OffsetDateTime, delta: Duration) -> OffsetDateTime {
	instant.checked_add(delta).unwrap_or_else(|| {
		let bound = if delta.is_negative() { PrimitiveDateTime::MIN } else { PrimitiveDateTime::MAX };

		bound.assume_utc()
	})
}

/// Shifts an instant backwards, clamping to the representable range instead of overflowing.
pub fn saturating_sub(instant: OffsetDateTime, delta: Duration) -> OffsetDateTime {
	instant.checked_sub(delta).unwrap_or_else(|| {
		let bound = if delta.is_negative() { PrimitiveDateTime::MAX } else { PrimitiveDateTime::MIN };

		bound.assume_utc()
	})
}

/// Converts epoch milliseconds into an instant, returning `None` when out of range.
pub fn from_epoch_ms(ms: i64) -> Option<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn manual_clock_advances_and_pins() {
		let clock = ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC));

		clock.advance(Duration::minutes(90));

		assert_eq!(clock.now(), macros::datetime!(2025-01-01 01:30 UTC));

		clock.set(macros::datetime!(2024-06-01 12:00 UTC));

		assert_eq!(clock.now(), macros::datetime!(2024-06-01 12:00 UTC));
	}

	#[test]
	fn epoch_millis_convert_both_ways() {
		let instant = macros::datetime!(2025-01-01 00:00:01.5 UTC);
		let ms = to_epoch_ms(instant);

		assert_eq!(ms, 1_735_689_601_500);
		assert_eq!(from_epoch_ms(ms), Some(instant));
		assert!(from_epoch_ms(i64::MAX).is_none(), "Far-future millis must be out of range.");
		assert_eq!(rfc3339(instant), "2025-01-01T00:00:01.5Z");
	}

	#[test]
	fn saturating_shifts_clamp_instead_of_panicking() {
		let instant = macros::datetime!(2025-01-01 00:00 UTC);
		let far_future = saturating_add(instant, Duration::milliseconds(i64::MAX));
		let far_past = saturating_sub(instant, Duration::milliseconds(i64::MAX));

		assert_eq!(far_future, PrimitiveDateTime::MAX.assume_utc());
		assert_eq!(far_past, PrimitiveDateTime::MIN.assume_utc());
		assert!(to_epoch_ms(far_future) > to_epoch_ms(instant));
		assert_eq!(saturating_sub(instant, Duration::hours(1)), instant - Duration::hours(1));
	}
}
