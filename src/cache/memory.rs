//! Thread-safe in-memory [`TokenCache`] for single-process deployments and tests.

// self
use crate::{
	_prelude::*,
	auth::{CacheKey, TokenRecord},
	cache::{self, CacheFuture, TokenCache},
};

#[derive(Clone, Debug)]
struct Entry {
	record: TokenRecord,
	reap_at: OffsetDateTime,
}

type EntryMap = Arc<RwLock<HashMap<CacheKey, Entry>>>;

/// In-process cache; clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache(EntryMap);
impl MemoryCache {
	/// Number of entries still held, including ones awaiting reaping.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no entries are held.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Instant at which the entry under `key` stops being served.
	pub fn reap_at(&self, key: &CacheKey) -> Option<OffsetDateTime> {
		self.0.read().get(key).map(|entry| entry.reap_at)
	}

	fn get_now(map: &EntryMap, key: &CacheKey, now: OffsetDateTime) -> Option<TokenRecord> {
		{
			let guard = map.read();

			match guard.get(key) {
				Some(entry) if now < entry.reap_at => return Some(entry.record.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = map.write();

		// Re-check under the write lock; a concurrent `set` may have replaced the entry.
		if guard.get(key).is_some_and(|entry| now >= entry.reap_at) {
			guard.remove(key);
		}

		guard.get(key).map(|entry| entry.record.clone())
	}

	fn set_now(
		map: &EntryMap,
		key: CacheKey,
		record: TokenRecord,
		ttl: Duration,
		now: OffsetDateTime,
	) {
		map.write().insert(key, Entry { record, reap_at: cache::deadline(now, ttl) });
	}
}
impl TokenCache for MemoryCache {
	fn get<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::get_now(&map, key, OffsetDateTime::now_utc())) })
	}

	fn set<'a>(
		&'a self,
		key: &'a CacheKey,
		record: TokenRecord,
		ttl: Duration,
	) -> CacheFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move {
			Self::set_now(&map, key, record, ttl, OffsetDateTime::now_utc());

			Ok(())
		})
	}
}
