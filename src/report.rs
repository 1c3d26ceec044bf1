//! Read-only health, metrics, and tenant listings aggregated from the store, the limiter, and the
//! gate counters.

// self
use crate::{
	_prelude::*,
	clock::{self, Clock},
	credential::{ScopeSet, TenantId},
	gate::{GateCounters, GateMetrics},
	policy::Policy,
	rate_limit::{RateLimiter, RateLimiterSnapshot, RateQuota},
	store::{CredentialStore, StoreStats},
};

/// Liveness body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
	/// Always `healthy` while the process answers.
	pub status: &'static str,
	/// `secure` when admission control is enabled, `open` otherwise.
	pub mode: &'static str,
	/// Seconds since the reporter was created.
	pub uptime: i64,
	/// In-memory state sizes.
	pub memory: MemoryUsage,
	/// Tenant counts.
	pub users: UserCounts,
	/// When the report was built.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}

/// Sizes of the in-memory tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
	/// Cached credentials.
	pub credential_entries: usize,
	/// Tenant-keyed rate counters.
	pub tenant_counters: usize,
	/// Address-keyed rate counters.
	pub address_counters: usize,
}

/// Cached and recently active tenants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct UserCounts {
	/// Cached tenants.
	pub total: usize,
	/// Tenants read or written within the active window.
	pub active: usize,
}

/// Metrics body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
	/// Credential cache statistics.
	pub store: StoreStats,
	/// Rate counter tables.
	pub rate_limits: RateLimiterSnapshot,
	/// Gate outcome counters.
	pub gate: GateCounters,
	/// Effective configuration, echoed only when admission control is enabled.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub configuration: Option<ConfigurationEcho>,
	/// When the report was built.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}

/// Non-secret view of the active policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationEcho {
	/// Per-tenant quota.
	pub tenant_rate_limit: RateQuota,
	/// Per-address quota.
	pub address_rate_limit: RateQuota,
	/// Allowed origins.
	pub allowed_origins: Vec<String>,
	/// Maximum declared body size.
	pub max_payload_bytes: u64,
	/// Expiry safety margin in milliseconds.
	pub expiry_buffer_ms: i64,
	/// Minimum injection lifetime in milliseconds.
	pub min_injection_ttl_ms: i64,
	/// Staleness threshold in milliseconds.
	pub stale_threshold_ms: i64,
}
impl ConfigurationEcho {
	fn from_policy(policy: &Policy) -> Self {
		Self {
			tenant_rate_limit: policy.tenant_quota,
			address_rate_limit: policy.address_quota,
			allowed_origins: policy.allowed_origins.clone(),
			max_payload_bytes: policy.max_payload_bytes,
			expiry_buffer_ms: whole_ms(policy.expiry_buffer),
			min_injection_ttl_ms: whole_ms(policy.min_injection_ttl),
			stale_threshold_ms: whole_ms(policy.stale_threshold),
		}
	}
}

/// Admin listing of cached tenants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActiveTenantsReport {
	/// Cached tenants.
	pub total: usize,
	/// Tenants read or written within the active window.
	pub active: usize,
	/// Tenants whose credential is expired (buffer included).
	pub expired: usize,
	/// Per-tenant summaries sorted by id.
	pub tenants: Vec<TenantSummary>,
	/// When the report was built.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}

/// One tenant in [`ActiveTenantsReport`]; never carries token material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSummary {
	/// Tenant identifier.
	pub id: TenantId,
	/// Outside the expiry buffer.
	pub valid: bool,
	/// Seconds until the literal expiry, floored at zero.
	pub expires_in: i64,
	/// Granted scopes.
	pub scope: ScopeSet,
}

/// Builds the admin reports. Reading a report never records a credential access.
#[derive(Clone, Debug)]
pub struct AdminReporter {
	store: CredentialStore,
	limiter: Arc<RateLimiter>,
	gate: Arc<GateMetrics>,
	policy: Arc<Policy>,
	clock: Arc<dyn Clock>,
	started_at: OffsetDateTime,
}
impl AdminReporter {
	/// Creates a reporter; uptime is measured from now.
	pub fn new(
		store: CredentialStore,
		limiter: Arc<RateLimiter>,
		gate: Arc<GateMetrics>,
		policy: Arc<Policy>,
		clock: Arc<dyn Clock>,
	) -> Self {
		let started_at = clock.now();

		Self { store, limiter, gate, policy, clock, started_at }
	}

	/// Liveness summary.
	pub fn health(&self) -> HealthReport {
		let now = self.clock.now();
		let stats = self.store.stats();
		let counters = self.limiter.snapshot();

		HealthReport {
			status: "healthy",
			mode: self.policy.mode(),
			uptime: (now - self.started_at).whole_seconds().max(0),
			memory: MemoryUsage {
				credential_entries: stats.total_tenants,
				tenant_counters: counters.tenant.tracked_keys,
				address_counters: counters.address.tracked_keys,
			},
			users: UserCounts { total: stats.total_tenants, active: stats.active_tenants },
			timestamp: now,
		}
	}

	/// Store, limiter, and gate counters, plus the configuration when enabled.
	pub fn metrics(&self) -> MetricsReport {
		MetricsReport {
			store: self.store.stats(),
			rate_limits: self.limiter.snapshot(),
			gate: self.gate.snapshot(),
			configuration: self.policy.enabled.then(|| ConfigurationEcho::from_policy(&self.policy)),
			timestamp: self.clock.now(),
		}
	}

	/// Every cached tenant with its validity and remaining lifetime.
	pub fn active_tenants(&self) -> ActiveTenantsReport {
		let now = self.clock.now();
		let active_since = clock::saturating_sub(now, self.policy.active_window);
		let mut tenants = Vec::new();
		let mut active = 0;

		for (id, entry) in self.store.entries() {
			if entry.last_accessed >= active_since {
				active += 1;
			}

			tenants.push(TenantSummary {
				id,
				valid: !self.store.is_expired(&entry.credential),
				expires_in: entry.credential.remaining_at(now).whole_seconds().max(0),
				scope: entry.credential.scope,
			});
		}

		tenants.sort_by(|a, b| a.id.cmp(&b.id));

		ActiveTenantsReport {
			total: tenants.len(),
			active,
			expired: tenants.iter().filter(|tenant| !tenant.valid).count(),
			tenants,
			timestamp: now,
		}
	}
}

fn whole_ms(duration: Duration) -> i64 {
	i64::try_from(duration.whole_milliseconds()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		clock::{self, ManualClock},
		credential::Credential,
		rate_limit::LimiterScope,
	};

	const NOW: OffsetDateTime = macros::datetime!(2025-03-01 09:00 UTC);

	fn reporter(policy: Policy) -> (AdminReporter, CredentialStore, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::new(NOW));
		let store = CredentialStore::new(&policy, clock.clone());
		let limiter = Arc::new(RateLimiter::new(&policy, clock.clone()));

		limiter.check(LimiterScope::Address, "10.0.0.1");

		let reporter = AdminReporter::new(
			store.clone(),
			limiter,
			Default::default(),
			Arc::new(policy),
			clock.clone(),
		);

		(reporter, store, clock)
	}

	fn credential(expires_in: Duration, scope: &str) -> Credential {
		Credential::new(
			"a",
			"r",
			clock::to_epoch_ms(NOW + expires_in),
			scope.parse().expect("Scope fixture should parse."),
			"Bearer",
		)
	}

	#[test]
	fn health_reports_mode_uptime_and_sizes() {
		let (reporter, store, clock) = reporter(Policy::default());

		store.put("u1", credential(Duration::hours(1), "a")).expect("Put should succeed.");
		clock.advance(Duration::seconds(42));

		let health = reporter.health();

		assert_eq!(health.mode, "open");
		assert_eq!(health.uptime, 42);
		assert_eq!(health.memory.credential_entries, 1);
		assert_eq!(health.memory.address_counters, 1);
		assert_eq!(health.users, UserCounts { total: 1, active: 1 });
	}

	#[test]
	fn configuration_is_echoed_only_when_enabled_and_never_leaks_the_secret() {
		let (open, ..) = reporter(Policy::default());

		assert!(open.metrics().configuration.is_none());

		let (secure, ..) = reporter(Policy::default().with_secret_key("super-secret"));
		let rendered = serde_json::to_string(&secure.metrics()).expect("Metrics serialize.");

		assert!(rendered.contains("tenantRateLimit"));
		assert!(!rendered.contains("super-secret"));
	}

	#[test]
	fn tenant_listing_is_sorted_and_does_not_touch_entries() {
		let (reporter, store, clock) = reporter(Policy::default());

		store.put("u2", credential(Duration::minutes(2), "b")).expect("Put should succeed.");
		store.put("u1", credential(Duration::hours(2), "a c")).expect("Put should succeed.");
		clock.advance(Duration::hours(2));

		let listing = reporter.active_tenants();
		let ids = listing.tenants.iter().map(|tenant| tenant.id.to_string()).collect::<Vec<_>>();

		assert_eq!(ids, ["u1", "u2"]);
		assert_eq!(listing.total, 2);
		assert_eq!(listing.active, 0, "Listing must not count as an access.");
		assert_eq!(listing.expired, 2);
		assert!(listing.tenants.iter().all(|tenant| tenant.expires_in == 0));
		assert_eq!(reporter.active_tenants().active, 0);
	}
}
