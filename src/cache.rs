//! Token cache contract and built-in backends.
//!
//! A cache persists [`TokenRecord`]s across process instances with a store-level TTL that is
//! independent of the token's own expiry. Callers must still check
//! [`TokenRecord::is_expired_at`] after a hit.

pub mod file;
pub mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

// self
use crate::{
	_prelude::*,
	auth::{CacheKey, TokenRecord},
};

/// Boxed future returned by [`TokenCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Key/value store with per-entry expiry.
///
/// A cold miss resolves to `Ok(None)`; `Err` is reserved for backend failures.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Fetches the record stored under `key`, if present and not yet reaped.
	fn get<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<TokenRecord>>;

	/// Stores `record` under `key`, replacing any previous value, for `ttl`.
	fn set<'a>(
		&'a self,
		key: &'a CacheKey,
		record: TokenRecord,
		ttl: Duration,
	) -> CacheFuture<'a, ()>;
}

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// Encoding or decoding of a cached record failed.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Absolute reaping instant for an entry written at `now` with `ttl`.
pub(crate) fn deadline(now: OffsetDateTime, ttl: Duration) -> OffsetDateTime {
	now.checked_add(ttl).unwrap_or(now)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn deadline_adds_ttl() {
		let now = macros::datetime!(2025-06-01 12:00 UTC);

		assert_eq!(deadline(now, Duration::seconds(90)), macros::datetime!(2025-06-01 12:01:30 UTC));
		assert_eq!(deadline(now, Duration::ZERO), now);
	}

	#[test]
	fn cache_error_serializes_as_tagged_enum() {
		let payload = serde_json::to_string(&CacheError::Backend { message: "down".into() })
			.expect("CacheError should serialize to JSON.");

		assert_eq!(payload, "{\"Backend\":{\"message\":\"down\"}}");
	}
}
