//! Optional observability helpers for the gate, the store, and the sweep tasks.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit structured events and spans named
//!   `oauth2_admission.gate` with a `stage` field. Tenant identifiers only ever appear as a
//!   [`tenant_fingerprint`].
//! - Enable `metrics` to increment `oauth2_admission_gate_total` (labeled by `stage` + `outcome`)
//!   and `oauth2_admission_sweep_removed_total` (labeled by `task`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const TENANT_FINGERPRINT_LEN: usize = 12;

/// Pipeline positions observed by the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GateStage {
	/// Cross-origin admission.
	Origin,
	/// Defensive response headers.
	SecurityHeaders,
	/// Shared-secret authentication.
	ApiKey,
	/// Fixed-window quota.
	RateLimit,
	/// Declared body size.
	PayloadSize,
	/// The wrapped downstream handler.
	Handler,
}
impl GateStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Origin => "origin",
			Self::SecurityHeaders => "security_headers",
			Self::ApiKey => "api_key",
			Self::RateLimit => "rate_limit",
			Self::PayloadSize => "payload_size",
			Self::Handler => "handler",
		}
	}
}
impl Display for GateStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageVerdict {
	/// The stage passed the request on.
	Continue,
	/// The stage answered a preflight and stopped.
	Preflight,
	/// The stage rejected the request.
	Deny,
}
impl StageVerdict {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Continue => "continue",
			Self::Preflight => "preflight",
			Self::Deny => "deny",
		}
	}
}
impl Display for StageVerdict {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Background sweeps that evict idle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SweepKind {
	/// Stale credential eviction.
	Credentials,
	/// Closed rate-limit window eviction.
	RateCounters,
}
impl SweepKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Credentials => "credentials",
			Self::RateCounters => "rate_counters",
		}
	}
}
impl Display for SweepKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Short, stable, non-reversible label for a tenant identifier, safe to put in logs.
pub fn tenant_fingerprint(tenant: &str) -> String {
	let digest = Sha256::digest(tenant.as_bytes());
	let mut encoded = URL_SAFE_NO_PAD.encode(digest);

	encoded.truncate(TENANT_FINGERPRINT_LEN);

	encoded
}
