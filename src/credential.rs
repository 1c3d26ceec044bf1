//! Tenant identifiers, scope sets, token secrets, and the cached credential model.

pub mod id;
pub mod record;
pub mod scope;
pub mod secret;

pub use id::*;
pub use record::*;
pub use scope::*;
pub use secret::*;
