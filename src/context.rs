//! Startup-built owner of every admission component.

// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	gate::AccessGate,
	obs::SweepKind,
	policy::Policy,
	rate_limit::RateLimiter,
	report::AdminReporter,
	service::CredentialService,
	store::{CredentialStore, SweepTask},
};

/// Explicit context replacing process-wide singletons.
///
/// Construction validates the policy. [`AdmissionContext::start`] launches the credential and
/// rate-counter sweeps; [`AdmissionContext::shutdown`] stops them. [`AdmissionContext::reset`]
/// empties every table for test isolation.
#[derive(Debug)]
pub struct AdmissionContext {
	policy: Arc<Policy>,
	clock: Arc<dyn Clock>,
	store: CredentialStore,
	limiter: Arc<RateLimiter>,
	gate: AccessGate,
	service: CredentialService,
	reporter: AdminReporter,
	sweeps: Mutex<Vec<SweepTask>>,
}
impl AdmissionContext {
	/// Builds every component over the wall clock.
	pub fn new(policy: Policy) -> Result<Self> {
		Self::with_clock(policy, Arc::new(SystemClock))
	}

	/// Builds every component over the provided clock.
	pub fn with_clock(policy: Policy, clock: Arc<dyn Clock>) -> Result<Self> {
		policy.validate()?;

		let policy = Arc::new(policy);
		let store = CredentialStore::new(&policy, clock.clone());
		let limiter = Arc::new(RateLimiter::new(&policy, clock.clone()));
		let gate = AccessGate::new(policy.clone(), limiter.clone(), clock.clone());
		let service = CredentialService::new(store.clone(), policy.clone());
		let reporter = AdminReporter::new(
			store.clone(),
			limiter.clone(),
			gate.metrics().clone(),
			policy.clone(),
			clock.clone(),
		);

		Ok(Self {
			policy,
			clock,
			store,
			limiter,
			gate,
			service,
			reporter,
			sweeps: Default::default(),
		})
	}

	/// Effective policy.
	pub fn policy(&self) -> &Arc<Policy> {
		&self.policy
	}

	/// Shared clock.
	pub fn clock(&self) -> &Arc<dyn Clock> {
		&self.clock
	}

	/// Credential cache.
	pub fn store(&self) -> &CredentialStore {
		&self.store
	}

	/// Rate limiter.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	/// Admission gate.
	pub fn gate(&self) -> &AccessGate {
		&self.gate
	}

	/// Credential route handlers.
	pub fn service(&self) -> &CredentialService {
		&self.service
	}

	/// Admin reports.
	pub fn reporter(&self) -> &AdminReporter {
		&self.reporter
	}

	/// Spawns both sweeps on the current Tokio runtime; a no-op while they already run.
	pub fn start(&self) {
		let mut sweeps = self.sweeps.lock();

		if !sweeps.is_empty() {
			return;
		}

		let store = self.store.clone();
		let limiter = self.limiter.clone();

		sweeps.push(SweepTask::spawn(
			SweepKind::Credentials,
			self.policy.credential_sweep_interval,
			move || store.purge_stale(),
		));
		sweeps.push(SweepTask::spawn(
			SweepKind::RateCounters,
			self.policy.rate_limit_sweep_interval,
			move || limiter.purge_expired(),
		));
	}

	/// Returns `true` while the sweeps run.
	pub fn is_running(&self) -> bool {
		self.sweeps.lock().iter().any(SweepTask::is_running)
	}

	/// Stops both sweeps and waits for them to exit.
	pub async fn shutdown(&self) {
		let sweeps = std::mem::take(&mut *self.sweeps.lock());

		for sweep in sweeps {
			sweep.stop().await;
		}
	}

	/// Drops every cached credential, rate counter, and gate counter.
	pub fn reset(&self) {
		self.store.clear();
		self.limiter.clear();
		self.gate.metrics().reset();
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{clock::ManualClock, policy::PolicyError};

	#[test]
	fn invalid_policy_is_rejected_at_construction() {
		let err = AdmissionContext::new(Policy::default().with_enabled(true))
			.expect_err("Enabled without a secret must be rejected.");

		assert!(matches!(err, Error::Config(PolicyError::EnabledWithoutSecret)));
	}

	#[tokio::test(start_paused = true)]
	async fn start_is_idempotent_and_shutdown_stops_everything() {
		let context =
			AdmissionContext::with_clock(Policy::default(), Arc::new(ManualClock::default()))
				.expect("Default policy should be valid.");

		context.start();
		context.start();

		assert_eq!(context.sweeps.lock().len(), 2);
		assert!(context.is_running());

		context.shutdown().await;

		assert!(!context.is_running());
	}
}
