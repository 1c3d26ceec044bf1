//! Cached OAuth credential model, its wire payload, and field validation.

// self
use crate::{
	_prelude::*,
	clock,
	credential::{IdentifierError, ScopeSet, ScopeValidationError, TenantId, TokenSecret},
};

/// Validation failures raised before a credential is written.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// A required field was absent.
	#[error("Field `{field}` is required.")]
	MissingField {
		/// Wire name of the missing field.
		field: &'static str,
	},
	/// A string field was present but empty.
	#[error("Field `{field}` cannot be empty.")]
	EmptyField {
		/// Wire name of the empty field.
		field: &'static str,
	},
	/// The expiry was zero, negative, or not an integer.
	#[error("Field `expiresAt` must be a positive integer epoch-millisecond timestamp.")]
	InvalidExpiresAt,
	/// The tenant identifier failed validation.
	#[error("Field `tenantId` is invalid: {0}")]
	InvalidTenant(#[from] IdentifierError),
	/// The scope string failed validation.
	#[error("Field `scope` is invalid: {0}")]
	InvalidScope(#[from] ScopeValidationError),
	/// The request body could not be decoded.
	#[error("Malformed credential payload at `{path}`: {message}")]
	Malformed {
		/// Path of the offending value inside the payload.
		path: String,
		/// Decoder message.
		message: String,
	},
	/// The credential expired before it was injected.
	#[error("Credential has already expired.")]
	AlreadyExpired,
	/// The credential would expire inside the minimum injection window.
	#[error("Credential expires within {min_ttl_secs} seconds; provide a fresher token.")]
	ExpiresTooSoon {
		/// Minimum lifetime an injected credential must still have, in seconds.
		min_ttl_secs: i64,
	},
}
impl ValidationError {
	/// Wire name of the offending field, when the failure is tied to one.
	pub fn field(&self) -> Option<&'static str> {
		match self {
			Self::MissingField { field } | Self::EmptyField { field } => Some(*field),
			Self::InvalidExpiresAt | Self::AlreadyExpired | Self::ExpiresTooSoon { .. } =>
				Some("expiresAt"),
			Self::InvalidTenant(_) => Some("tenantId"),
			Self::InvalidScope(_) => Some("scope"),
			Self::Malformed { .. } => None,
		}
	}
}

/// OAuth access/refresh token bundle cached for a tenant.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret; callers must avoid logging it.
	pub refresh_token: TokenSecret,
	/// Literal expiry as epoch milliseconds.
	pub expires_at: i64,
	/// Scopes granted to the access token.
	pub scope: ScopeSet,
	/// Token type reported by the identity provider (usually `Bearer`).
	pub token_type: String,
}
impl Credential {
	/// Assembles a credential; call [`Credential::validate`] before trusting it.
	pub fn new(
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		expires_at: i64,
		scope: ScopeSet,
		token_type: impl Into<String>,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
			expires_at,
			scope,
			token_type: token_type.into(),
		}
	}

	/// Checks every field, reporting the first offending one.
	pub fn validate(&self) -> Result<(), ValidationError> {
		if self.access_token.is_empty() {
			return Err(ValidationError::EmptyField { field: "accessToken" });
		}
		if self.refresh_token.is_empty() {
			return Err(ValidationError::EmptyField { field: "refreshToken" });
		}
		if self.expires_at <= 0 || clock::from_epoch_ms(self.expires_at).is_none() {
			return Err(ValidationError::InvalidExpiresAt);
		}
		if self.scope.is_empty() {
			return Err(ValidationError::EmptyField { field: "scope" });
		}
		if self.token_type.trim().is_empty() {
			return Err(ValidationError::EmptyField { field: "tokenType" });
		}

		Ok(())
	}

	/// Time left until the literal expiry, negative once it has passed.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		Duration::milliseconds(self.expires_at.saturating_sub(clock::to_epoch_ms(now)))
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.field("token_type", &self.token_type)
			.finish()
	}
}

/// Loosely typed credential injection body; every field is optional so that a missing one can
/// be reported by name.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPayload {
	/// Tenant the credential belongs to.
	pub tenant_id: Option<String>,
	/// Access token value.
	pub access_token: Option<String>,
	/// Refresh token value.
	pub refresh_token: Option<String>,
	/// Expiry as epoch milliseconds; kept loose so non-integers surface as a field error.
	pub expires_at: Option<serde_json::Value>,
	/// Space-delimited scope string.
	pub scope: Option<String>,
	/// Token type.
	pub token_type: Option<String>,
}
impl CredentialPayload {
	/// Decodes a JSON body, naming the offending path on failure.
	pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
		let de = &mut serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(de).map_err(|e| ValidationError::Malformed {
			path: e.path().to_string(),
			message: e.into_inner().to_string(),
		})
	}

	/// Validates the payload and splits it into the tenant and a checked [`Credential`].
	pub fn into_parts(self) -> Result<(TenantId, Credential), ValidationError> {
		let tenant = TenantId::new(required(self.tenant_id, "tenantId")?)?;
		let access_token = required(self.access_token, "accessToken")?;
		let refresh_token = required(self.refresh_token, "refreshToken")?;
		let expires_at = self
			.expires_at
			.ok_or(ValidationError::MissingField { field: "expiresAt" })?
			.as_i64()
			.ok_or(ValidationError::InvalidExpiresAt)?;
		let scope = ScopeSet::from_str(&required(self.scope, "scope")?)?;
		let token_type = required(self.token_type, "tokenType")?;
		let credential = Credential::new(access_token, refresh_token, expires_at, scope, token_type);

		credential.validate()?;

		Ok((tenant, credential))
	}
}
impl Debug for CredentialPayload {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialPayload")
			.field("tenant_id", &self.tenant_id)
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.field("token_type", &self.token_type)
			.finish()
	}
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
	match value {
		None => Err(ValidationError::MissingField { field }),
		Some(v) if v.is_empty() => Err(ValidationError::EmptyField { field }),
		Some(v) => Ok(v),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn payload() -> CredentialPayload {
		CredentialPayload {
			tenant_id: Some("u1".into()),
			access_token: Some("ya29.access".into()),
			refresh_token: Some("1//refresh".into()),
			expires_at: Some(serde_json::json!(1_900_000_000_000_i64)),
			scope: Some("calendar.events calendar.readonly".into()),
			token_type: Some("Bearer".into()),
		}
	}

	#[test]
	fn complete_payload_splits_into_parts() {
		let (tenant, credential) =
			payload().into_parts().expect("Complete payload should validate.");

		assert_eq!(tenant.as_ref(), "u1");
		assert_eq!(credential.expires_at, 1_900_000_000_000);
		assert_eq!(credential.access_token.expose(), "ya29.access");
		assert_eq!(credential.scope.len(), 2);
	}

	#[test]
	fn missing_and_empty_fields_are_named() {
		let mut missing = payload();

		missing.refresh_token = None;

		let err = missing.into_parts().expect_err("Missing refresh token must be rejected.");

		assert_eq!(err, ValidationError::MissingField { field: "refreshToken" });

		let mut empty = payload();

		empty.token_type = Some(String::new());

		let err = empty.into_parts().expect_err("Empty token type must be rejected.");

		assert_eq!(err.field(), Some("tokenType"));
	}

	#[test]
	fn expiry_must_be_a_positive_integer() {
		let candidates = [
			serde_json::json!(0),
			serde_json::json!(-5),
			serde_json::json!(1.5),
			serde_json::json!("soon"),
		];

		for bad in candidates {
			let mut p = payload();

			p.expires_at = Some(bad);

			assert_eq!(p.into_parts().err(), Some(ValidationError::InvalidExpiresAt));
		}
	}

	#[test]
	fn malformed_json_reports_path() {
		let err = CredentialPayload::from_json(br#"{"tenantId": 42}"#)
			.expect_err("Numeric tenant ids must be rejected.");

		assert!(matches!(err, ValidationError::Malformed { ref path, .. } if path == "tenantId"));
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let (_, credential) = payload().into_parts().expect("Payload should validate.");
		let rendered = format!("{credential:?}");

		assert!(!rendered.contains("ya29.access"));
		assert!(!rendered.contains("1//refresh"));
		assert!(!format!("{:?}", payload()).contains("ya29.access"));
	}
}
