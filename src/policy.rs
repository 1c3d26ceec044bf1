//! Admission policy: the immutable configuration snapshot read by every component.
//!
//! A [`Policy`] can be built from defaults with the `with_*` helpers, decoded from JSON (durations
//! are expressed in milliseconds), or read from `ADMISSION_*` environment variables. Whatever the
//! source, [`Policy::validate`] must pass before the policy is handed to an
//! [`AdmissionContext`](crate::AdmissionContext).

// crates.io
use url::Url;
// self
use crate::{_prelude::*, credential::TokenSecret, rate_limit::RateQuota};

/// Allowed-origin entry that admits every origin.
pub const WILDCARD_ORIGIN: &str = "*";

/// Longest duration any setting may carry.
pub const MAX_SETTING_DURATION: Duration = Duration::days(365);

const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Errors raised while loading or validating a [`Policy`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PolicyError {
	/// Admission control cannot be enabled without a shared secret.
	#[error("Admission control is enabled but no secret key is configured.")]
	EnabledWithoutSecret,
	/// An allowed origin is not a bare `scheme://host[:port]` origin.
	#[error("Allowed origin `{origin}` is not a valid origin.")]
	InvalidOrigin {
		/// Offending entry.
		origin: String,
	},
	/// A rate quota was configured with a zero limit.
	#[error("The {quota} rate quota must allow at least one request.")]
	ZeroQuota {
		/// Quota label.
		quota: &'static str,
	},
	/// A duration setting was zero or negative.
	#[error("The {field} setting must be a positive duration.")]
	NonPositiveDuration {
		/// Setting name.
		field: &'static str,
	},
	/// A duration setting exceeded [`MAX_SETTING_DURATION`].
	#[error("The {field} setting must not exceed {max_days} days.")]
	DurationTooLong {
		/// Setting name.
		field: &'static str,
		/// Upper bound in days.
		max_days: i64,
	},
	/// An environment variable could not be parsed.
	#[error("Environment variable {key} has an invalid value `{value}`.")]
	InvalidEnv {
		/// Variable name.
		key: &'static str,
		/// Raw value.
		value: String,
	},
	/// A JSON policy document could not be decoded.
	#[error("Policy document is invalid at `{path}`: {message}")]
	Parse {
		/// Path of the offending value.
		path: String,
		/// Decoder message.
		message: String,
	},
}

/// Immutable admission configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Policy {
	/// Enables origin and API-key enforcement. When off the gate runs in open mode.
	pub enabled: bool,
	/// Shared secret every protected request must present.
	#[serde(skip_serializing)]
	pub secret_key: Option<TokenSecret>,
	/// Exact origins (or `*`) permitted to call the service from a browser.
	pub allowed_origins: Vec<String>,
	/// Per-tenant quota applied to tool invocations.
	pub tenant_quota: RateQuota,
	/// Per-address quota applied to credential injection.
	pub address_quota: RateQuota,
	/// Maximum declared request body size.
	pub max_payload_bytes: u64,
	/// Safety margin subtracted from a credential's literal expiry.
	#[serde(rename = "expiry_buffer_ms", with = "duration_ms")]
	pub expiry_buffer: Duration,
	/// Minimum remaining lifetime an injected credential must have.
	#[serde(rename = "min_injection_ttl_ms", with = "duration_ms")]
	pub min_injection_ttl: Duration,
	/// Idle time after which a cached credential is evicted.
	#[serde(rename = "stale_threshold_ms", with = "duration_ms")]
	pub stale_threshold: Duration,
	/// Window within which a tenant counts as active.
	#[serde(rename = "active_window_ms", with = "duration_ms")]
	pub active_window: Duration,
	/// Period of the credential staleness sweep.
	#[serde(rename = "credential_sweep_interval_ms", with = "duration_ms")]
	pub credential_sweep_interval: Duration,
	/// Period of the expired rate-counter sweep.
	#[serde(rename = "rate_limit_sweep_interval_ms", with = "duration_ms")]
	pub rate_limit_sweep_interval: Duration,
}
impl Policy {
	/// Decodes a JSON policy document and validates it.
	pub fn from_json(body: &[u8]) -> Result<Self, PolicyError> {
		let de = &mut serde_json::Deserializer::from_slice(body);
		let policy: Self = serde_path_to_error::deserialize(de).map_err(|e| PolicyError::Parse {
			path: e.path().to_string(),
			message: e.into_inner().to_string(),
		})?;

		policy.validate()?;

		Ok(policy)
	}

	/// Reads the policy from `ADMISSION_*` environment variables layered over the defaults.
	pub fn from_env() -> Result<Self, PolicyError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads the policy from an arbitrary key lookup (the environment in production).
	pub fn from_lookup<F>(lookup: F) -> Result<Self, PolicyError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut policy = Self::default();

		if let Some(raw) = lookup("ADMISSION_ENABLED") {
			policy.enabled = parse_flag("ADMISSION_ENABLED", &raw)?;
		}
		if let Some(raw) = lookup("ADMISSION_SECRET_KEY").filter(|v| !v.is_empty()) {
			policy.secret_key = Some(TokenSecret::new(raw));
		}
		if let Some(raw) = lookup("ADMISSION_ALLOWED_ORIGINS") {
			policy.allowed_origins = raw
				.split(',')
				.map(str::trim)
				.filter(|origin| !origin.is_empty())
				.map(ToOwned::to_owned)
				.collect();
		}
		if let Some(raw) = lookup("ADMISSION_TENANT_RATE_LIMIT") {
			policy.tenant_quota.limit = parse_num("ADMISSION_TENANT_RATE_LIMIT", &raw)?;
		}
		if let Some(raw) = lookup("ADMISSION_TENANT_RATE_WINDOW_MS") {
			policy.tenant_quota.window = parse_ms("ADMISSION_TENANT_RATE_WINDOW_MS", &raw)?;
		}
		if let Some(raw) = lookup("ADMISSION_ADDRESS_RATE_LIMIT") {
			policy.address_quota.limit = parse_num("ADMISSION_ADDRESS_RATE_LIMIT", &raw)?;
		}
		if let Some(raw) = lookup("ADMISSION_ADDRESS_RATE_WINDOW_MS") {
			policy.address_quota.window = parse_ms("ADMISSION_ADDRESS_RATE_WINDOW_MS", &raw)?;
		}
		if let Some(raw) = lookup("ADMISSION_MAX_PAYLOAD_BYTES") {
			policy.max_payload_bytes = parse_num("ADMISSION_MAX_PAYLOAD_BYTES", &raw)?;
		}
		if let Some(raw) = lookup("ADMISSION_EXPIRY_BUFFER_MS") {
			policy.expiry_buffer = parse_ms("ADMISSION_EXPIRY_BUFFER_MS", &raw)?;
		}
		if let Some(raw) = lookup("ADMISSION_MIN_INJECTION_TTL_MS") {
			policy.min_injection_ttl = parse_ms("ADMISSION_MIN_INJECTION_TTL_MS", &raw)?;
		}
		if let Some(raw) = lookup("ADMISSION_STALE_THRESHOLD_MS") {
			policy.stale_threshold = parse_ms("ADMISSION_STALE_THRESHOLD_MS", &raw)?;
		}
		if let Some(raw) = lookup("ADMISSION_ACTIVE_WINDOW_MS") {
			policy.active_window = parse_ms("ADMISSION_ACTIVE_WINDOW_MS", &raw)?;
		}
		if let Some(raw) = lookup("ADMISSION_CREDENTIAL_SWEEP_INTERVAL_MS") {
			policy.credential_sweep_interval =
				parse_ms("ADMISSION_CREDENTIAL_SWEEP_INTERVAL_MS", &raw)?;
		}
		if let Some(raw) = lookup("ADMISSION_RATE_LIMIT_SWEEP_INTERVAL_MS") {
			policy.rate_limit_sweep_interval =
				parse_ms("ADMISSION_RATE_LIMIT_SWEEP_INTERVAL_MS", &raw)?;
		}

		policy.validate()?;

		Ok(policy)
	}

	/// Enables enforcement with the provided shared secret.
	pub fn with_secret_key(mut self, secret: impl Into<String>) -> Self {
		self.enabled = true;
		self.secret_key = Some(TokenSecret::new(secret));

		self
	}

	/// Overrides the enabled flag.
	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;

		self
	}

	/// Replaces the allowed origin list.
	pub fn with_allowed_origins<I, S>(mut self, origins: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.allowed_origins = origins.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the per-tenant quota.
	pub fn with_tenant_quota(mut self, quota: RateQuota) -> Self {
		self.tenant_quota = quota;

		self
	}

	/// Overrides the per-address quota.
	pub fn with_address_quota(mut self, quota: RateQuota) -> Self {
		self.address_quota = quota;

		self
	}

	/// Overrides the maximum declared body size.
	pub fn with_max_payload_bytes(mut self, bytes: u64) -> Self {
		self.max_payload_bytes = bytes;

		self
	}

	/// Overrides the expiry safety margin.
	pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
		self.expiry_buffer = buffer;

		self
	}

	/// Overrides the idle eviction threshold.
	pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
		self.stale_threshold = threshold;

		self
	}

	/// Overrides both sweep periods.
	pub fn with_sweep_intervals(mut self, credentials: Duration, rate_limits: Duration) -> Self {
		self.credential_sweep_interval = credentials;
		self.rate_limit_sweep_interval = rate_limits;

		self
	}

	/// Checks cross-field consistency.
	pub fn validate(&self) -> Result<(), PolicyError> {
		if self.enabled && self.secret_key.as_ref().is_none_or(TokenSecret::is_empty) {
			return Err(PolicyError::EnabledWithoutSecret);
		}

		for origin in &self.allowed_origins {
			validate_origin(origin)?;
		}

		if self.tenant_quota.limit == 0 {
			return Err(PolicyError::ZeroQuota { quota: "tenant" });
		}
		if self.address_quota.limit == 0 {
			return Err(PolicyError::ZeroQuota { quota: "address" });
		}

		for (field, value, allow_zero) in [
			("tenant_quota.window_ms", self.tenant_quota.window, false),
			("address_quota.window_ms", self.address_quota.window, false),
			("stale_threshold_ms", self.stale_threshold, false),
			("active_window_ms", self.active_window, false),
			("credential_sweep_interval_ms", self.credential_sweep_interval, false),
			("rate_limit_sweep_interval_ms", self.rate_limit_sweep_interval, false),
			("expiry_buffer_ms", self.expiry_buffer, true),
			("min_injection_ttl_ms", self.min_injection_ttl, true),
		] {
			if value.is_negative() || (value.is_zero() && !allow_zero) {
				return Err(PolicyError::NonPositiveDuration { field });
			}
			if value > MAX_SETTING_DURATION {
				return Err(PolicyError::DurationTooLong {
					field,
					max_days: MAX_SETTING_DURATION.whole_days(),
				});
			}
		}

		Ok(())
	}

	/// Returns `true` when the allow list contains the wildcard entry.
	pub fn allows_any_origin(&self) -> bool {
		self.allowed_origins.iter().any(|origin| origin == WILDCARD_ORIGIN)
	}

	/// Exact-match origin check.
	pub fn is_origin_allowed(&self, origin: &str) -> bool {
		self.allows_any_origin() || self.allowed_origins.iter().any(|allowed| allowed == origin)
	}

	/// Label reported by health surfaces.
	pub const fn mode(&self) -> &'static str {
		if self.enabled { "secure" } else { "open" }
	}
}
impl Default for Policy {
	fn default() -> Self {
		Self {
			enabled: false,
			secret_key: None,
			allowed_origins: Vec::new(),
			tenant_quota: RateQuota::new(100, Duration::minutes(15)),
			address_quota: RateQuota::new(10, Duration::minutes(15)),
			max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
			expiry_buffer: Duration::minutes(5),
			min_injection_ttl: Duration::minutes(5),
			stale_threshold: Duration::hours(24),
			active_window: Duration::hours(1),
			credential_sweep_interval: Duration::minutes(30),
			rate_limit_sweep_interval: Duration::seconds(60),
		}
	}
}

fn validate_origin(origin: &str) -> Result<(), PolicyError> {
	if origin == WILDCARD_ORIGIN {
		return Ok(());
	}

	let invalid = || PolicyError::InvalidOrigin { origin: origin.to_owned() };
	let parsed = Url::parse(origin).map_err(|_| invalid())?;

	if !matches!(parsed.scheme(), "http" | "https") || parsed.origin().ascii_serialization() != origin
	{
		return Err(invalid());
	}

	Ok(())
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, PolicyError> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(PolicyError::InvalidEnv { key, value: raw.to_owned() }),
	}
}

fn parse_num<T>(key: &'static str, raw: &str) -> Result<T, PolicyError>
where
	T: FromStr,
{
	raw.trim().parse().map_err(|_| PolicyError::InvalidEnv { key, value: raw.to_owned() })
}

fn parse_ms(key: &'static str, raw: &str) -> Result<Duration, PolicyError> {
	parse_num::<i64>(key, raw).map(Duration::milliseconds)
}

/// Serde adapter storing [`Duration`] values as integer milliseconds.
pub(crate) mod duration_ms {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(i64::try_from(value.whole_milliseconds()).unwrap_or(i64::MAX))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::milliseconds)
	}
}
