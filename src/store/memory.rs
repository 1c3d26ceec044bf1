//! Thread-safe in-memory credential cache keyed by tenant.

// self
use crate::{
	_prelude::*,
	clock::{self, Clock},
	credential::{Credential, TenantId, ValidationError},
	obs,
	policy::Policy,
	store::{CacheEntry, CredentialLookup, StoreStats},
};

type EntryMap = Arc<RwLock<HashMap<TenantId, CacheEntry>>>;

/// Process-lifetime cache of tenant credentials.
///
/// Every read-modify-write (a write, the access bump on a read, the sweep's delete) runs under a
/// single write lock, so operations on one tenant are atomic and a write racing the sweep always
/// leaves the freshly written entry in place.
#[derive(Clone, Debug)]
pub struct CredentialStore {
	entries: EntryMap,
	clock: Arc<dyn Clock>,
	expiry_buffer: Duration,
	stale_threshold: Duration,
	active_window: Duration,
}
impl CredentialStore {
	/// Creates an empty store using the policy's expiry and staleness settings.
	pub fn new(policy: &Policy, clock: Arc<dyn Clock>) -> Self {
		Self {
			entries: Default::default(),
			clock,
			expiry_buffer: policy.expiry_buffer,
			stale_threshold: policy.stale_threshold,
			active_window: policy.active_window,
		}
	}

	/// Validates and stores a credential, replacing any previous entry for the tenant.
	pub fn put(&self, tenant: &str, credential: Credential) -> Result<(), ValidationError> {
		let tenant = TenantId::new(tenant)?;

		credential.validate()?;

		let now = self.clock.now();

		self.entries.write().insert(tenant.clone(), CacheEntry::new(credential, now));
		obs::log_credential_event("put", &tenant);

		Ok(())
	}

	/// Returns the tenant's credential and records the access.
	pub fn get(&self, tenant: &str) -> Option<Credential> {
		if tenant.is_empty() {
			return None;
		}

		let now = self.clock.now();
		let mut entries = self.entries.write();
		let entry = entries.get_mut(tenant)?;

		entry.touch(now);

		Some(entry.credential.clone())
	}

	/// Deletes the tenant's entry; returns whether one existed.
	pub fn remove(&self, tenant: &str) -> bool {
		let removed = self.entries.write().remove(tenant).is_some();

		if removed {
			obs::log_credential_event("remove", tenant);
		}

		removed
	}

	/// Returns `true` when `expires_at <= now + expiry_buffer`.
	pub fn is_expired(&self, credential: &Credential) -> bool {
		is_expired_at(credential, self.clock.now(), self.expiry_buffer)
	}

	/// Snapshot of every cached tenant, in no particular order.
	pub fn list_tenant_ids(&self) -> Vec<TenantId> {
		self.entries.read().keys().cloned().collect()
	}

	/// Snapshot of every entry without recording an access.
	pub fn entries(&self) -> Vec<(TenantId, CacheEntry)> {
		self.entries.read().iter().map(|(tenant, entry)| (tenant.clone(), entry.clone())).collect()
	}

	/// Evicts entries idle for longer than the staleness threshold; returns how many were dropped.
	pub fn purge_stale(&self) -> usize {
		let threshold = clock::saturating_sub(self.clock.now(), self.stale_threshold);
		let mut entries = self.entries.write();
		let before = entries.len();

		entries.retain(|_, entry| entry.last_accessed >= threshold);

		before - entries.len()
	}

	/// Aggregate counts and write-time bounds.
	pub fn stats(&self) -> StoreStats {
		let now = self.clock.now();
		let active_since = clock::saturating_sub(now, self.active_window);
		let entries = self.entries.read();

		StoreStats {
			total_tenants: entries.len(),
			active_tenants: entries.values().filter(|e| e.last_accessed >= active_since).count(),
			expired_count: entries
				.values()
				.filter(|e| is_expired_at(&e.credential, now, self.expiry_buffer))
				.count(),
			oldest_last_updated: entries.values().map(|e| e.last_updated).min(),
			newest_last_updated: entries.values().map(|e| e.last_updated).max(),
		}
	}

	/// Number of cached tenants.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Drops every entry.
	pub fn clear(&self) {
		self.entries.write().clear();
	}

	/// Clock the store evaluates expiry against.
	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}
}
impl CredentialLookup for CredentialStore {
	fn credential(&self, tenant: &str) -> Option<Credential> {
		self.get(tenant)
	}

	fn is_expired(&self, credential: &Credential) -> bool {
		CredentialStore::is_expired(self, credential)
	}
}

fn is_expired_at(credential: &Credential, now: OffsetDateTime, buffer: Duration) -> bool {
	credential.expires_at <= clock::to_epoch_ms(clock::saturating_add(now, buffer))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{clock::ManualClock, credential::ScopeSet};

	fn store() -> (CredentialStore, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::default());

		(CredentialStore::new(&Policy::default(), clock.clone()), clock)
	}

	fn credential_expiring_at(expires_at: i64) -> Credential {
		let scope = ScopeSet::from_str("calendar.events").expect("Scope fixture should parse.");

		Credential::new("access", "refresh", expires_at, scope, "Bearer")
	}

	#[test]
	fn rejected_writes_leave_the_entry_untouched() {
		let (store, clock) = store();
		let original = credential_expiring_at(clock.now_ms() + 3_600_000);

		store.put("u1", original.clone()).expect("Valid credential should be stored.");

		let mut broken = credential_expiring_at(clock.now_ms() + 7_200_000);

		broken.refresh_token = crate::credential::TokenSecret::new("");

		assert_eq!(
			store.put("u1", broken),
			Err(ValidationError::EmptyField { field: "refreshToken" })
		);
		assert_eq!(store.get("u1"), Some(original));
		assert!(store.put("", credential_expiring_at(1)).is_err());
	}

	#[test]
	fn empty_tenant_lookup_short_circuits() {
		let (store, _) = store();

		assert!(store.get("").is_none());
		assert!(!store.remove("ghost"), "Removing an absent tenant is not an error.");
	}

	#[test]
	fn expiry_boundary_counts_as_expired() {
		let (store, clock) = store();
		let buffer_ms = 5 * 60 * 1_000;

		assert!(store.is_expired(&credential_expiring_at(clock.now_ms() + buffer_ms)));
		assert!(!store.is_expired(&credential_expiring_at(clock.now_ms() + buffer_ms + 1)));
		assert!(store.is_expired(&credential_expiring_at(clock.now_ms() - 1)));
	}

	#[test]
	fn unbounded_thresholds_saturate_instead_of_panicking() {
		let clock = Arc::new(ManualClock::default());
		let policy = Policy {
			stale_threshold: Duration::milliseconds(i64::MAX),
			active_window: Duration::milliseconds(i64::MAX),
			expiry_buffer: Duration::milliseconds(i64::MAX),
			..Policy::default()
		};
		let store = CredentialStore::new(&policy, clock.clone());

		store
			.put("u1", credential_expiring_at(clock.now_ms() + 3_600_000))
			.expect("Valid credential should be stored.");

		assert_eq!(store.purge_stale(), 0);
		assert_eq!(store.stats().active_tenants, 1);
		assert!(store.get("u1").is_some_and(|credential| store.is_expired(&credential)));
	}

	#[test]
	fn lookup_contract_filters_expired_credentials() {
		let (store, clock) = store();

		store
			.put("soon", credential_expiring_at(clock.now_ms() + 60_000))
			.expect("Near-expiry credential can still be cached.");

		let lookup: &dyn CredentialLookup = &store;

		assert!(lookup.credential("soon").is_some());
		assert!(lookup.usable_credential("soon").is_none());
	}
}
