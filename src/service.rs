//! Credential injection, status, and deletion expressed as transport-agnostic operations that
//! return serializable bodies.

// self
use crate::{
	_prelude::*,
	clock::Clock,
	credential::{CredentialPayload, TenantId, ValidationError},
	policy::Policy,
	store::{CredentialLookup, CredentialStore},
};

/// Body returned after a credential is stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionReceipt {
	/// Always `true`; failures are returned as [`Error`].
	pub success: bool,
	/// Human-readable confirmation.
	pub message: String,
	/// Tenant the credential was stored for.
	pub tenant_id: TenantId,
	/// Literal expiry as epoch milliseconds.
	pub expires_at: i64,
	/// Seconds until the literal expiry.
	pub expires_in: i64,
	/// When the credential was stored.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}

/// Body describing the cached credential of one tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
	/// Whether anything is cached for the tenant.
	pub has_credential: bool,
	/// Present and outside the expiry buffer.
	pub valid: bool,
	/// Literal expiry as epoch milliseconds.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<i64>,
	/// Seconds until the literal expiry, floored at zero.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<i64>,
	/// Inside the expiry buffer or past the deadline.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expired: Option<bool>,
	/// When the status was read.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}

/// Body returned by [`CredentialService::delete`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeletionReceipt {
	/// Always `true`; deleting an absent tenant succeeds.
	pub success: bool,
	/// Human-readable confirmation.
	pub message: String,
	/// When the deletion ran.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}

/// Handlers behind the gate for the credential routes.
#[derive(Clone, Debug)]
pub struct CredentialService {
	store: CredentialStore,
	policy: Arc<Policy>,
}
impl CredentialService {
	/// Creates the service over a shared store.
	pub fn new(store: CredentialStore, policy: Arc<Policy>) -> Self {
		Self { store, policy }
	}

	/// Backing store.
	pub fn store(&self) -> &CredentialStore {
		&self.store
	}

	/// Decodes a JSON body and injects it.
	pub fn inject_json(&self, body: &[u8]) -> Result<InjectionReceipt> {
		self.inject(CredentialPayload::from_json(body)?)
	}

	/// Validates and stores a credential.
	///
	/// Beyond field validation, the credential must not already be expired and must still live
	/// for at least the configured minimum injection lifetime.
	pub fn inject(&self, payload: CredentialPayload) -> Result<InjectionReceipt> {
		let (tenant, credential) = payload.into_parts()?;
		let now = self.clock().now();
		let remaining = credential.remaining_at(now);

		if !remaining.is_positive() {
			return Err(ValidationError::AlreadyExpired.into());
		}
		if remaining < self.policy.min_injection_ttl {
			return Err(ValidationError::ExpiresTooSoon {
				min_ttl_secs: self.policy.min_injection_ttl.whole_seconds(),
			}
			.into());
		}

		let expires_at = credential.expires_at;

		self.store.put(&tenant, credential)?;

		Ok(InjectionReceipt {
			success: true,
			message: "Credential stored.".into(),
			tenant_id: tenant,
			expires_at,
			expires_in: remaining.whole_seconds(),
			timestamp: now,
		})
	}

	/// Reports whether a usable credential is cached, recording the access.
	pub fn status(&self, tenant: &str) -> CredentialStatus {
		let now = self.clock().now();
		let Some(credential) = self.store.credential(tenant) else {
			return CredentialStatus {
				has_credential: false,
				valid: false,
				expires_at: None,
				expires_in: None,
				expired: None,
				timestamp: now,
			};
		};
		let expired = self.store.is_expired(&credential);

		CredentialStatus {
			has_credential: true,
			valid: !expired,
			expires_at: Some(credential.expires_at),
			expires_in: Some(credential.remaining_at(now).whole_seconds().max(0)),
			expired: Some(expired),
			timestamp: now,
		}
	}

	/// Removes the tenant's credential; succeeds whether or not one was cached.
	pub fn delete(&self, tenant: &str) -> DeletionReceipt {
		let message = if self.store.remove(tenant) {
			"Credential removed."
		} else {
			"No credential was stored for this tenant."
		};

		DeletionReceipt { success: true, message: message.into(), timestamp: self.clock().now() }
	}

	fn clock(&self) -> &Arc<dyn Clock> {
		self.store.clock()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::clock::{self, ManualClock};

	const NOW: OffsetDateTime = macros::datetime!(2025-03-01 09:00 UTC);

	fn service() -> (CredentialService, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::new(NOW));
		let policy = Arc::new(Policy::default());
		let store = CredentialStore::new(&policy, clock.clone());

		(CredentialService::new(store, policy), clock)
	}

	fn body(expires_at: i64) -> Vec<u8> {
		serde_json::to_vec(&serde_json::json!({
			"tenantId": "u1",
			"accessToken": "ya29.a",
			"refreshToken": "1//r",
			"expiresAt": expires_at,
			"scope": "calendar.events",
			"tokenType": "Bearer",
		}))
		.expect("Fixture should serialize.")
	}

	#[test]
	fn expired_and_short_lived_credentials_are_rejected_distinctly() {
		let (service, _) = service();
		let now_ms = clock::to_epoch_ms(NOW);
		let expired = service.inject_json(&body(now_ms - 1)).expect_err("Expired tokens fail.");
		let short = service
			.inject_json(&body(now_ms + 60_000))
			.expect_err("Tokens living one minute must be rejected.");

		assert!(matches!(expired, Error::Validation(ValidationError::AlreadyExpired)));
		assert!(matches!(
			short,
			Error::Validation(ValidationError::ExpiresTooSoon { min_ttl_secs: 300 })
		));
		assert_ne!(expired.public_message(), short.public_message());
		assert!(service.store().is_empty(), "Rejected writes must not mutate the store.");
	}

	#[test]
	fn status_reflects_the_expiry_buffer() {
		let (service, clock) = service();
		let receipt = service
			.inject_json(&body(clock::to_epoch_ms(NOW + Duration::minutes(10))))
			.expect("Ten-minute credential should be accepted.");

		assert_eq!(receipt.expires_in, 600);

		let status = service.status("u1");

		assert!(status.valid);
		assert_eq!(status.expired, Some(false));

		clock.advance(Duration::minutes(6));

		let status = service.status("u1");

		assert!(status.has_credential);
		assert!(!status.valid, "Four minutes left is inside the five-minute buffer.");
		assert_eq!(status.expires_in, Some(240));
	}

	#[test]
	fn unknown_tenant_status_omits_optional_fields() {
		let (service, _) = service();
		let rendered = serde_json::to_value(service.status("ghost")).expect("Status serializes.");

		assert_eq!(rendered["hasCredential"], false);
		assert!(rendered.get("expiresAt").is_none());
		assert!(rendered["timestamp"].is_string());
	}

	#[test]
	fn delete_is_idempotent() {
		let (service, _) = service();

		service
			.inject_json(&body(clock::to_epoch_ms(NOW + Duration::hours(1))))
			.expect("Credential should be accepted.");

		let first = service.delete("u1");
		let second = service.delete("u1");

		assert!(first.success && second.success);
		assert_ne!(first.message, second.message);
		assert!(!service.status("u1").has_credential);
	}
}
