//! Tenant credential cache: lookup contract, cache entries, statistics, and the sweep task that
//! evicts idle entries.

pub mod memory;
pub mod sweep;

pub use memory::CredentialStore;
pub use sweep::SweepTask;

// self
use crate::{_prelude::*, credential::Credential};

/// Read contract handlers use to obtain the caller's credential.
pub trait CredentialLookup
where
	Self: Send + Sync,
{
	/// Returns the cached credential for a tenant, recording the access.
	fn credential(&self, tenant: &str) -> Option<Credential>;

	/// Returns `true` when the credential is inside the expiry buffer or past its deadline.
	fn is_expired(&self, credential: &Credential) -> bool;

	/// Returns the cached credential only when it is still usable.
	fn usable_credential(&self, tenant: &str) -> Option<Credential> {
		self.credential(tenant).filter(|credential| !self.is_expired(credential))
	}
}

/// Cached credential plus its bookkeeping timestamps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
	/// Stored credential.
	pub credential: Credential,
	/// When the credential was last written.
	pub last_updated: OffsetDateTime,
	/// When the credential was last read (or written). Never moves backwards.
	pub last_accessed: OffsetDateTime,
}
impl CacheEntry {
	pub(crate) fn new(credential: Credential, now: OffsetDateTime) -> Self {
		Self { credential, last_updated: now, last_accessed: now }
	}

	pub(crate) fn touch(&mut self, now: OffsetDateTime) {
		self.last_accessed = self.last_accessed.max(now);
	}
}

/// Aggregate view of the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
	/// Entries in the cache.
	pub total_tenants: usize,
	/// Entries read or written within the active window.
	pub active_tenants: usize,
	/// Entries whose credential is expired (buffer included).
	pub expired_count: usize,
	/// Oldest write instant, `None` when the cache is empty.
	#[serde(with = "time::serde::rfc3339::option")]
	pub oldest_last_updated: Option<OffsetDateTime>,
	/// Newest write instant, `None` when the cache is empty.
	#[serde(with = "time::serde::rfc3339::option")]
	pub newest_last_updated: Option<OffsetDateTime>,
}
