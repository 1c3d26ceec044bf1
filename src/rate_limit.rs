//! Fixed-window request counters keyed by tenant and by client address.
//!
//! Each table maps a key to a [`RateCounter`]. A counter whose window has closed is replaced by a
//! fresh one the next time its key is touched; a periodic sweep removes counters nobody touched
//! again so one-off clients do not accumulate. Fixed windows admit a short burst around a window
//! boundary in exchange for O(1) work and one small record per key.

pub mod decision;

pub use decision::*;

// self
use crate::{
	_prelude::*,
	clock::{self, Clock},
	policy::Policy,
};

type CounterTable = Mutex<HashMap<String, RateCounter>>;

/// Ceiling and window length for one counter table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateQuota {
	/// Requests admitted per window.
	pub limit: u32,
	/// Window length.
	#[serde(rename = "window_ms", with = "crate::policy::duration_ms")]
	pub window: Duration,
}
impl RateQuota {
	/// Creates a quota.
	pub const fn new(limit: u32, window: Duration) -> Self {
		Self { limit, window }
	}
}

/// Which counter table a key belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LimiterScope {
	/// General request quota keyed by tenant identity.
	Tenant,
	/// Credential-injection quota keyed by client network address.
	Address,
}
impl LimiterScope {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Tenant => "tenant",
			Self::Address => "address",
		}
	}
}

/// Requests counted in the current window of one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateCounter {
	/// Requests seen in the window, including rejected ones.
	pub count: u32,
	/// Instant the window closes.
	pub window_reset_at: OffsetDateTime,
}
impl RateCounter {
	fn fresh(now: OffsetDateTime, window: Duration) -> Self {
		Self { count: 0, window_reset_at: clock::saturating_add(now, window) }
	}

	/// Returns `true` once the window has closed.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.window_reset_at
	}
}

/// Read-only view of one counter table for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterTableSnapshot {
	/// Configured ceiling.
	pub limit: u32,
	/// Window length in milliseconds.
	pub window_ms: i64,
	/// Keys with a counter in memory.
	pub tracked_keys: usize,
	/// Keys currently over their ceiling.
	pub limited_keys: usize,
}

/// Read-only view of both tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RateLimiterSnapshot {
	/// Tenant-keyed table.
	pub tenant: CounterTableSnapshot,
	/// Address-keyed table.
	pub address: CounterTableSnapshot,
}

/// Dual-keyed fixed-window limiter.
#[derive(Debug)]
pub struct RateLimiter {
	clock: Arc<dyn Clock>,
	tenant_quota: RateQuota,
	address_quota: RateQuota,
	tenant: CounterTable,
	address: CounterTable,
}
impl RateLimiter {
	/// Creates a limiter with the quotas from the policy.
	pub fn new(policy: &Policy, clock: Arc<dyn Clock>) -> Self {
		Self {
			clock,
			tenant_quota: policy.tenant_quota,
			address_quota: policy.address_quota,
			tenant: Default::default(),
			address: Default::default(),
		}
	}

	/// Configured quota for a table.
	pub fn quota(&self, scope: LimiterScope) -> RateQuota {
		match scope {
			LimiterScope::Tenant => self.tenant_quota,
			LimiterScope::Address => self.address_quota,
		}
	}

	/// Counts one request against the configured quota of the table.
	pub fn check(&self, scope: LimiterScope, key: &str) -> RateLimitDecision {
		self.check_with(scope, key, self.quota(scope))
	}

	/// Counts one request against an explicit quota.
	pub fn check_with(&self, scope: LimiterScope, key: &str, quota: RateQuota) -> RateLimitDecision {
		let now = self.clock.now();
		let mut table = self.table(scope).lock();
		let counter =
			table.entry(key.to_owned()).or_insert_with(|| RateCounter::fresh(now, quota.window));

		if counter.is_expired_at(now) {
			*counter = RateCounter::fresh(now, quota.window);
		}

		counter.count = counter.count.saturating_add(1);

		let status = RateLimitStatus {
			limit: quota.limit,
			remaining: quota.limit.saturating_sub(counter.count),
			window_reset_at: counter.window_reset_at,
		};

		if counter.count > quota.limit {
			let retry = RetryDirective::new(counter.window_reset_at, counter.window_reset_at - now)
				.with_reason(format!("{} quota exhausted", scope.as_str()));

			RateLimitDecision::Reject { status, retry }
		} else {
			RateLimitDecision::Allow(status)
		}
	}

	/// Current counter for a key, if one is tracked.
	pub fn counter(&self, scope: LimiterScope, key: &str) -> Option<RateCounter> {
		self.table(scope).lock().get(key).copied()
	}

	/// Removes counters whose window already closed; returns how many were dropped.
	pub fn purge_expired(&self) -> usize {
		let now = self.clock.now();

		[&self.tenant, &self.address]
			.into_iter()
			.map(|table| {
				let mut table = table.lock();
				let before = table.len();

				table.retain(|_, counter| !counter.is_expired_at(now));

				before - table.len()
			})
			.sum()
	}

	/// Point-in-time view of both tables.
	pub fn snapshot(&self) -> RateLimiterSnapshot {
		let now = self.clock.now();

		RateLimiterSnapshot {
			tenant: Self::table_snapshot(&self.tenant, self.tenant_quota, now),
			address: Self::table_snapshot(&self.address, self.address_quota, now),
		}
	}

	/// Drops every counter.
	pub fn clear(&self) {
		self.tenant.lock().clear();
		self.address.lock().clear();
	}

	fn table(&self, scope: LimiterScope) -> &CounterTable {
		match scope {
			LimiterScope::Tenant => &self.tenant,
			LimiterScope::Address => &self.address,
		}
	}

	fn table_snapshot(
		table: &CounterTable,
		quota: RateQuota,
		now: OffsetDateTime,
	) -> CounterTableSnapshot {
		let table = table.lock();

		CounterTableSnapshot {
			limit: quota.limit,
			window_ms: i64::try_from(quota.window.whole_milliseconds()).unwrap_or(i64::MAX),
			tracked_keys: table.len(),
			limited_keys: table
				.values()
				.filter(|counter| !counter.is_expired_at(now) && counter.count > quota.limit)
				.count(),
		}
	}
}
