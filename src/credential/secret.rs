//! Secure token secret wrapper that redacts sensitive material.

// crates.io
use subtle::ConstantTimeEq;
// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping OAuth tokens and API keys out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the wrapped value is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Compares the secret against a candidate without leaking where they first differ.
	pub fn matches(&self, candidate: &str) -> bool {
		constant_time_eq(self.0.as_bytes(), candidate.as_bytes())
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Constant-time byte comparison.
///
/// Inputs of different length are rejected before any byte is inspected; equal-length inputs
/// are XOR-accumulated across every byte so the running time only depends on the length.
pub fn constant_time_eq(lhs: &[u8], rhs: &[u8]) -> bool {
	if lhs.len() != rhs.len() {
		return false;
	}

	lhs.ct_eq(rhs).into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn constant_time_eq_requires_exact_match() {
		let secret = TokenSecret::new("s3cr3t-key");

		assert!(secret.matches("s3cr3t-key"));
		assert!(!secret.matches("s3cr3t-kez"), "Equal-length wrong keys must fail.");
		assert!(!secret.matches("s3cr3t"), "Shorter keys must fail.");
		assert!(!secret.matches("s3cr3t-key-and-more"), "Longer keys must fail.");
		assert!(!secret.matches(""));
		assert!(constant_time_eq(b"", b""));
	}
}
