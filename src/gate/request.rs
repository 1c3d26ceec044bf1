//! Request view evaluated by the gate stages.

// std
use std::net::IpAddr;
// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Method,
	header::{CONTENT_LENGTH, IntoHeaderName, ORIGIN},
	request::Parts,
};

/// Dedicated API-key header.
pub const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
/// Quota ceiling header.
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
/// Remaining quota header.
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// Window reset header (epoch seconds).
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const UNKNOWN_CLIENT: &str = "unknown";

/// Route families the gate treats differently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouteClass {
	/// Credential injection; rate limited per client address.
	CredentialInjection,
	/// Tool invocation on behalf of a tenant; rate limited per tenant.
	ToolInvocation,
	/// Administrative reads such as the active-tenant listing.
	Admin,
	/// Unauthenticated surfaces (health, metrics).
	Public,
}
impl RouteClass {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::CredentialInjection => "credential_injection",
			Self::ToolInvocation => "tool_invocation",
			Self::Admin => "admin",
			Self::Public => "public",
		}
	}
}

/// Transport-agnostic view of an inbound request.
#[derive(Clone, Debug)]
pub struct GateRequest {
	/// HTTP method.
	pub method: Method,
	/// Route family resolved by the host router.
	pub route: RouteClass,
	/// Request headers.
	pub headers: HeaderMap,
	/// Peer address reported by the transport.
	pub client_addr: Option<IpAddr>,
	/// Tenant the request acts for, when the host already knows it.
	pub tenant: Option<String>,
}
impl GateRequest {
	/// Creates a request with no headers.
	pub fn new(method: Method, route: RouteClass) -> Self {
		Self { method, route, headers: HeaderMap::new(), client_addr: None, tenant: None }
	}

	/// Builds a request from `http` request parts.
	pub fn from_parts(parts: &Parts, route: RouteClass) -> Self {
		Self {
			method: parts.method.clone(),
			route,
			headers: parts.headers.clone(),
			client_addr: None,
			tenant: None,
		}
	}

	/// Adds or replaces a header.
	pub fn with_header<K>(mut self, name: K, value: HeaderValue) -> Self
	where
		K: IntoHeaderName,
	{
		self.headers.insert(name, value);

		self
	}

	/// Sets the peer address.
	pub fn with_client_addr(mut self, addr: IpAddr) -> Self {
		self.client_addr = Some(addr);

		self
	}

	/// Sets the tenant the request acts for.
	pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
		self.tenant = Some(tenant.into());

		self
	}

	/// `Origin` header, when present and printable.
	pub fn origin(&self) -> Option<&str> {
		self.headers.get(ORIGIN).and_then(|value| value.to_str().ok())
	}

	/// Declared body size, when the `Content-Length` header parses.
	pub fn content_length(&self) -> Option<u64> {
		self.headers.get(CONTENT_LENGTH)?.to_str().ok()?.trim().parse().ok()
	}

	/// Returns `true` for CORS preflight requests.
	pub fn is_preflight(&self) -> bool {
		self.method == Method::OPTIONS
	}

	/// Key used for per-address quotas.
	pub fn client_key(&self) -> String {
		self.client_addr.map_or_else(|| UNKNOWN_CLIENT.to_owned(), |addr| addr.to_string())
	}

	/// Key used for per-tenant quotas, falling back to the client address.
	pub fn tenant_key(&self) -> String {
		self.tenant.clone().filter(|tenant| !tenant.is_empty()).unwrap_or_else(|| self.client_key())
	}
}

/// Mutable state threaded through the stages: the request plus the headers accumulated for the
/// eventual response.
#[derive(Clone, Debug)]
pub struct GateContext {
	/// Request under evaluation.
	pub request: GateRequest,
	/// Headers every response for this request must carry.
	pub response_headers: HeaderMap,
}
impl GateContext {
	/// Wraps a request with an empty header set.
	pub fn new(request: GateRequest) -> Self {
		Self { request, response_headers: HeaderMap::new() }
	}
}
