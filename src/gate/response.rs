//! Responses produced by the gate when it stops a request, and by handlers behind it.

// crates.io
use http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE};
// self
use crate::{_prelude::*, clock};

/// Transport-agnostic response.
#[derive(Clone, Debug, PartialEq)]
pub struct GateResponse {
	/// Status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// JSON body, absent for no-content replies.
	pub body: Option<serde_json::Value>,
}
impl GateResponse {
	/// Response with a status and nothing else.
	pub fn new(status: StatusCode) -> Self {
		Self { status, headers: HeaderMap::new(), body: None }
	}

	/// `204 No Content`.
	pub fn no_content() -> Self {
		Self::new(StatusCode::NO_CONTENT)
	}

	/// JSON response from any serializable body.
	pub fn json<T>(status: StatusCode, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let mut response = Self::new(status);

		response.body = Some(serde_json::to_value(body)?);
		response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(response)
	}

	/// Error body `{error, message, timestamp[, retryAfter]}` with the error's status.
	///
	/// Internal errors only ever expose a generic message.
	pub fn from_error(error: &Error, now: OffsetDateTime) -> Self {
		let mut body = serde_json::json!({
			"error": error.kind(),
			"message": error.public_message(),
			"timestamp": clock::rfc3339(now),
		});

		if let Error::RateLimited(retry) = error {
			body["retryAfter"] = retry.retry_after_secs().into();
		}
		if let Some(field) = error.validation_field() {
			body["field"] = field.into();
		}

		let mut response = Self::new(error.status());

		response.body = Some(body);
		response.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		response
	}

	/// Adds headers from `base` that the response does not already set.
	pub fn merge_headers(mut self, base: &HeaderMap) -> Self {
		for (name, value) in base {
			self.headers.entry(name).or_insert_with(|| value.clone());
		}

		self
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::header::X_FRAME_OPTIONS;
	use time::macros;
	// self
	use super::*;
	use crate::{credential::ValidationError, rate_limit::RetryDirective};

	#[test]
	fn error_bodies_carry_kind_message_and_timestamp() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let retry = RetryDirective::new(now + Duration::seconds(30), Duration::seconds(30));
		let response = GateResponse::from_error(&Error::RateLimited(retry), now);
		let body = response.body.expect("Error responses carry a body.");

		assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(body["error"], "rate_limited");
		assert_eq!(body["retryAfter"], 30);
		assert_eq!(body["timestamp"], "2025-01-01T00:00:00Z");

		let validation: Error = ValidationError::MissingField { field: "scope" }.into();
		let body = GateResponse::from_error(&validation, now).body.expect("Body expected.");

		assert_eq!(body["field"], "scope");
	}

	#[test]
	fn merge_keeps_response_specific_headers() {
		let mut base = HeaderMap::new();

		base.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
		base.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));

		let response = GateResponse::json(StatusCode::OK, &serde_json::json!({"ok": true}))
			.expect("JSON body should serialize.")
			.merge_headers(&base);

		assert_eq!(response.headers[X_FRAME_OPTIONS], "DENY");
		assert_eq!(response.headers[CONTENT_TYPE], "application/json");
	}
}
