//! Multi-tenant OAuth credential admission: an in-memory tenant credential cache with expiry and
//! staleness eviction, fixed-window rate limiting, and an ordered access gate that guards every
//! request before it reaches the cache or the handlers behind it.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod clock;
pub mod context;
pub mod credential;
pub mod error;
pub mod gate;
pub mod obs;
pub mod policy;
pub mod rate_limit;
pub mod report;
pub mod service;
pub mod store;

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

pub use context::AdmissionContext;
pub use http;
