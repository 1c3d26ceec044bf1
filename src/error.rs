//! Admission-level error types shared by the store, the gate, and the service operations.

// crates.io
use http::StatusCode;
// self
use crate::{
	_prelude::*, credential::ValidationError, policy::PolicyError, rate_limit::RetryDirective,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical admission error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Malformed or too-short-lived credential; the caller must fix the request.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Missing or incorrect API key.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Invalid policy supplied at startup.
	#[error(transparent)]
	Config(#[from] PolicyError),

	/// Request origin is not on the allow list.
	#[error("Origin `{origin}` is not allowed.")]
	OriginDenied {
		/// Origin header value that was rejected.
		origin: String,
	},
	/// Declared request body exceeds the configured maximum.
	#[error("Request body of {declared} bytes exceeds the {max} byte limit.")]
	PayloadTooLarge {
		/// Declared `Content-Length`.
		declared: u64,
		/// Configured maximum.
		max: u64,
	},
	/// Quota exhausted for the current window; retry after the advertised delay.
	#[error("Rate limit exceeded; retry in {} seconds.", .0.retry_after_secs())]
	RateLimited(RetryDirective),
	/// Unexpected failure. The detail is logged server-side and never returned to callers.
	#[error("Internal error: {detail}.")]
	Internal {
		/// Diagnostic detail for logs.
		detail: String,
	},
}
impl Error {
	/// Wraps an unexpected failure.
	pub fn internal(detail: impl Display) -> Self {
		Self::Internal { detail: detail.to_string() }
	}

	/// HTTP status class for the error.
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Validation(_) => StatusCode::BAD_REQUEST,
			Self::Auth(_) => StatusCode::UNAUTHORIZED,
			Self::OriginDenied { .. } => StatusCode::FORBIDDEN,
			Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
			Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
			Self::Config(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Stable machine-readable label for response bodies and metrics.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Validation(_) => "validation_error",
			Self::Auth(_) => "unauthorized",
			Self::Config(_) => "configuration_error",
			Self::OriginDenied { .. } => "origin_denied",
			Self::PayloadTooLarge { .. } => "payload_too_large",
			Self::RateLimited(_) => "rate_limited",
			Self::Internal { .. } => "internal_error",
		}
	}

	/// Message safe to return to the caller.
	pub fn public_message(&self) -> String {
		match self {
			Self::Config(_) | Self::Internal { .. } => "An internal error occurred.".into(),
			other => other.to_string(),
		}
	}

	/// Offending field for validation failures tied to one.
	pub fn validation_field(&self) -> Option<&'static str> {
		match self {
			Self::Validation(e) => e.field(),
			_ => None,
		}
	}

	/// Returns `true` for the class that is logged with detail and hidden from callers.
	pub fn is_internal(&self) -> bool {
		matches!(self, Self::Config(_) | Self::Internal { .. })
	}
}
impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Self::internal(e)
	}
}

/// API-key authentication failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthError {
	/// Neither the dedicated header nor a bearer authorization header carried a key.
	#[error("API key is required.")]
	MissingKey,
	/// The supplied key does not match the configured secret.
	#[error("API key is invalid.")]
	InvalidKey,
}
