// std
use std::sync::Arc;
// crates.io
use time::{Duration, OffsetDateTime, macros};
// self
use oauth2_admission::{
	clock::{self, ManualClock},
	credential::{Credential, ValidationError},
	policy::Policy,
	store::{CredentialLookup, CredentialStore},
};

const NOW: OffsetDateTime = macros::datetime!(2025-11-10 12:00 UTC);

fn make_store() -> (CredentialStore, Arc<ManualClock>) {
	let clock = Arc::new(ManualClock::new(NOW));

	(CredentialStore::new(&Policy::default(), clock.clone()), clock)
}

fn build_credential(access: &str, expires_in: Duration) -> Credential {
	Credential::new(
		access,
		"refresh-1",
		clock::to_epoch_ms(NOW + expires_in),
		"calendar.events".parse().expect("Scope fixture should parse."),
		"Bearer",
	)
}

#[test]
fn put_then_get_returns_an_equal_credential_and_bumps_access() {
	let (store, clock) = make_store();
	let credential = build_credential("access-1", Duration::hours(1));

	store.put("u1", credential.clone()).expect("Valid credential should be stored.");
	clock.advance(Duration::minutes(3));

	let fetched = store.get("u1").expect("Stored credential should remain present.");
	let (_, entry) = store
		.entries()
		.into_iter()
		.find(|(tenant, _)| tenant.as_ref() == "u1")
		.expect("Entry should be listed.");

	assert_eq!(fetched, credential);
	assert_eq!(entry.last_updated, NOW);
	assert_eq!(entry.last_accessed, NOW + Duration::minutes(3));
}

#[test]
fn invalid_writes_leave_the_store_untouched() {
	let (store, _) = make_store();
	let mut credential = build_credential("", Duration::hours(1));

	assert_eq!(
		store.put("u1", credential.clone()),
		Err(ValidationError::EmptyField { field: "accessToken" })
	);

	credential = build_credential("access-1", Duration::hours(1));

	assert!(matches!(store.put("", credential), Err(ValidationError::InvalidTenant(_))));
	assert!(store.is_empty());
	assert!(store.get("").is_none());
}

#[test]
fn expiry_includes_the_five_minute_buffer() {
	let (store, _) = make_store();

	assert!(store.is_expired(&build_credential("a", Duration::minutes(5))));
	assert!(store.is_expired(&build_credential("a", Duration::minutes(4))));
	assert!(!store.is_expired(&build_credential("a", Duration::minutes(5) + Duration::SECOND)));

	store
		.put("u1", build_credential("a", Duration::minutes(4)))
		.expect("Short-lived credentials are still valid writes.");

	assert!(store.credential("u1").is_some());
	assert!(store.usable_credential("u1").is_none(), "Buffered credentials are unusable.");
}

#[test]
fn purge_removes_only_entries_idle_past_the_threshold() {
	let (store, clock) = make_store();

	store.put("idle", build_credential("a", Duration::days(7))).expect("Put should succeed.");
	store.put("busy", build_credential("b", Duration::days(7))).expect("Put should succeed.");
	clock.advance(Duration::hours(23));

	assert_eq!(store.purge_stale(), 0, "Nothing is idle for more than a day yet.");

	store.get("busy");
	clock.advance(Duration::hours(2));

	assert_eq!(store.purge_stale(), 1);
	assert_eq!(
		store.list_tenant_ids().iter().map(|tenant| tenant.to_string()).collect::<Vec<_>>(),
		["busy"]
	);
}

#[test]
fn put_wins_over_a_concurrent_purge() {
	let (store, clock) = make_store();

	store.put("u1", build_credential("old", Duration::days(7))).expect("Put should succeed.");
	clock.advance(Duration::hours(25));
	store.put("u1", build_credential("new", Duration::days(7))).expect("Put should succeed.");

	assert_eq!(store.purge_stale(), 0, "A fresh write resets the idle clock.");
	let current = store.get("u1").expect("Rewritten credential should remain present.");

	assert_eq!(current.access_token.expose(), "new");
}

#[test]
fn remove_is_idempotent() {
	let (store, _) = make_store();

	store.put("u1", build_credential("a", Duration::hours(1))).expect("Put should succeed.");

	assert!(store.remove("u1"));
	assert!(!store.remove("u1"));
	assert!(!store.remove("never-existed"));
	assert!(store.get("u1").is_none());
}

#[test]
fn stats_count_active_and_expired_entries() {
	let (store, clock) = make_store();

	assert_eq!(store.stats().oldest_last_updated, None);

	store.put("u1", build_credential("a", Duration::minutes(2))).expect("Put should succeed.");
	clock.advance(Duration::hours(2));
	store.put("u2", build_credential("b", Duration::days(1))).expect("Put should succeed.");

	let stats = store.stats();

	assert_eq!(stats.total_tenants, 2);
	assert_eq!(stats.active_tenants, 1);
	assert_eq!(stats.expired_count, 1);
	assert_eq!(stats.oldest_last_updated, Some(NOW));
	assert_eq!(stats.newest_last_updated, Some(NOW + Duration::hours(2)));
}

#[test]
fn concurrent_writers_and_readers_keep_one_entry_per_tenant() {
	let (store, _) = make_store();
	let handles = (0..8)
		.map(|worker| {
			let store = store.clone();

			std::thread::spawn(move || {
				for round in 0..50 {
					let tenant = format!("tenant-{}", round % 5);

					store
						.put(&tenant, build_credential(&format!("w{worker}"), Duration::hours(1)))
						.expect("Concurrent put should succeed.");
					store.get(&tenant);
				}
			})
		})
		.collect::<Vec<_>>();

	for handle in handles {
		handle.join().expect("Worker thread should not panic.");
	}

	assert_eq!(store.len(), 5);
}
