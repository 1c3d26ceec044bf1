//! The five built-in admission stages, in pipeline order.

// crates.io
use http::{
	HeaderMap, HeaderValue,
	header::{
		ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
		ACCESS_CONTROL_MAX_AGE, AUTHORIZATION, CONTENT_SECURITY_POLICY, ORIGIN, REFERRER_POLICY,
		RETRY_AFTER, VARY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
	},
};
// self
use crate::{
	_prelude::*,
	error::AuthError,
	gate::{
		GateContext, GateResponse, RouteClass, Stage, StageOutcome, Termination, X_API_KEY,
		X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
	},
	obs::GateStage,
	policy::Policy,
	rate_limit::{LimiterScope, RateLimitDecision, RateLimitStatus, RateLimiter},
};

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-API-Key";
const PREFLIGHT_MAX_AGE_SECS: &str = "86400";
const CONTENT_SECURITY_POLICY_VALUE: &str = "default-src 'none'; frame-ancestors 'none'";
const BEARER_PREFIX: &str = "bearer ";

/// Cross-origin admission.
///
/// Open mode admits everything. Otherwise a preflight is answered here, requests from a
/// non-allowed origin are refused, and requests without an `Origin` header (server-to-server
/// callers) pass.
#[derive(Debug)]
pub struct OriginStage {
	policy: Arc<Policy>,
}
impl OriginStage {
	/// Creates the stage.
	pub fn new(policy: Arc<Policy>) -> Self {
		Self { policy }
	}

	fn preflight(&self, permitted: Option<HeaderValue>) -> GateResponse {
		let mut response = GateResponse::no_content();
		let headers = &mut response.headers;

		headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
		headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
		headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(PREFLIGHT_MAX_AGE_SECS));

		if let Some(origin) = permitted {
			headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
			headers.insert(VARY, HeaderValue::from_static("Origin"));
		}

		response
	}
}
impl Stage for OriginStage {
	fn kind(&self) -> GateStage {
		GateStage::Origin
	}

	fn evaluate(&self, ctx: &mut GateContext) -> StageOutcome {
		if !self.policy.enabled {
			return StageOutcome::Continue;
		}

		let origin = ctx.request.headers.get(ORIGIN).cloned();
		let permitted = origin.clone().filter(|value| {
			value.to_str().is_ok_and(|origin| self.policy.is_origin_allowed(origin))
		});

		if ctx.request.is_preflight() {
			return StageOutcome::Terminate(Termination::Preflight(self.preflight(permitted)));
		}

		match (origin, permitted) {
			(None, _) => StageOutcome::Continue,
			(Some(_), Some(allowed)) => {
				ctx.response_headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
				ctx.response_headers.insert(VARY, HeaderValue::from_static("Origin"));

				StageOutcome::Continue
			},
			(Some(denied), None) => StageOutcome::deny(Error::OriginDenied {
				origin: String::from_utf8_lossy(denied.as_bytes()).into_owned(),
			}),
		}
	}
}

/// Attaches defensive response headers to every request; never stops one.
#[derive(Debug, Default)]
pub struct SecurityHeadersStage;
impl Stage for SecurityHeadersStage {
	fn kind(&self) -> GateStage {
		GateStage::SecurityHeaders
	}

	fn evaluate(&self, ctx: &mut GateContext) -> StageOutcome {
		let headers = &mut ctx.response_headers;

		headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
		headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
		headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
		headers
			.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static(CONTENT_SECURITY_POLICY_VALUE));

		StageOutcome::Continue
	}
}

/// Shared-secret authentication.
#[derive(Debug)]
pub struct ApiKeyStage {
	policy: Arc<Policy>,
}
impl ApiKeyStage {
	/// Creates the stage.
	pub fn new(policy: Arc<Policy>) -> Self {
		Self { policy }
	}
}
impl Stage for ApiKeyStage {
	fn kind(&self) -> GateStage {
		GateStage::ApiKey
	}

	fn evaluate(&self, ctx: &mut GateContext) -> StageOutcome {
		if !self.policy.enabled || ctx.request.route == RouteClass::Public {
			return StageOutcome::Continue;
		}

		let Some(secret) = self.policy.secret_key.as_ref().filter(|secret| !secret.is_empty())
		else {
			return StageOutcome::deny(Error::internal("admission is enabled without a secret key"));
		};

		match extract_api_key(&ctx.request.headers) {
			None => StageOutcome::deny(AuthError::MissingKey.into()),
			Some(candidate) if secret.matches(candidate) => StageOutcome::Continue,
			Some(_) => StageOutcome::deny(AuthError::InvalidKey.into()),
		}
	}
}

/// Extracts the API key from a request.
///
/// Precedence: a non-empty `X-API-Key` header, then an `Authorization: Bearer <key>` header
/// (scheme matched case-insensitively). Values that are not visible ASCII are ignored.
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
	let dedicated = headers
		.get(X_API_KEY)
		.and_then(|value| value.to_str().ok())
		.map(str::trim)
		.filter(|key| !key.is_empty());

	dedicated.or_else(|| {
		let authorization = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
		let scheme = authorization.get(..BEARER_PREFIX.len())?;

		if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
			return None;
		}

		Some(authorization[BEARER_PREFIX.len()..].trim()).filter(|key| !key.is_empty())
	})
}

/// Fixed-window quota: per address on credential injection, per tenant on tool invocation.
#[derive(Debug)]
pub struct RateLimitStage {
	limiter: Arc<RateLimiter>,
}
impl RateLimitStage {
	/// Creates the stage.
	pub fn new(limiter: Arc<RateLimiter>) -> Self {
		Self { limiter }
	}

	fn write_quota_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
		headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(status.limit));
		headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(status.remaining));
		headers.insert(X_RATELIMIT_RESET, HeaderValue::from(status.reset_epoch_secs()));
	}
}
impl Stage for RateLimitStage {
	fn kind(&self) -> GateStage {
		GateStage::RateLimit
	}

	fn evaluate(&self, ctx: &mut GateContext) -> StageOutcome {
		let (scope, key) = match ctx.request.route {
			RouteClass::CredentialInjection => (LimiterScope::Address, ctx.request.client_key()),
			RouteClass::ToolInvocation => (LimiterScope::Tenant, ctx.request.tenant_key()),
			RouteClass::Admin | RouteClass::Public => return StageOutcome::Continue,
		};
		let decision = self.limiter.check(scope, &key);

		Self::write_quota_headers(&mut ctx.response_headers, decision.status());

		match decision {
			RateLimitDecision::Allow(_) => StageOutcome::Continue,
			RateLimitDecision::Reject { retry, .. } => {
				ctx.response_headers.insert(RETRY_AFTER, HeaderValue::from(retry.retry_after_secs()));

				StageOutcome::deny(Error::RateLimited(retry))
			},
		}
	}
}

/// Refuses requests whose declared body exceeds the configured maximum.
#[derive(Debug)]
pub struct PayloadSizeStage {
	max_bytes: u64,
}
impl PayloadSizeStage {
	/// Creates the stage.
	pub fn new(max_bytes: u64) -> Self {
		Self { max_bytes }
	}
}
impl Stage for PayloadSizeStage {
	fn kind(&self) -> GateStage {
		GateStage::PayloadSize
	}

	fn evaluate(&self, ctx: &mut GateContext) -> StageOutcome {
		match ctx.request.content_length() {
			Some(declared) if declared > self.max_bytes =>
				StageOutcome::deny(Error::PayloadTooLarge { declared, max: self.max_bytes }),
			_ => StageOutcome::Continue,
		}
	}
}
