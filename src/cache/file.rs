//! File-backed [`TokenCache`] that lets tokens survive process restarts on a single host.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{CacheKey, TokenRecord},
	cache::{self, CacheError, CacheFuture, TokenCache},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Entry {
	key: CacheKey,
	record: TokenRecord,
	reap_at: OffsetDateTime,
}

/// Persists cache entries to a JSON file after each write.
///
/// Entry deadlines are stored as absolute instants so a restarted process honours the TTL
/// chosen by the previous one. A `set` that fails to persist leaves the cache unchanged.
///
/// `set` writes and syncs the snapshot synchronously while holding the map lock, which blocks
/// the executor thread for the duration of the file I/O. Prefer it for low write rates such as
/// one write per token lifetime.
#[derive(Clone, Debug)]
pub struct FileCache {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<CacheKey, Entry>>>,
}
impl FileCache {
	/// Opens (or creates) a cache at the provided path, eagerly loading live entries.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path, OffsetDateTime::now_utc())?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Path of the backing snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(
		path: &Path,
		now: OffsetDateTime,
	) -> Result<HashMap<CacheKey, Entry>, CacheError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let metadata = path.metadata().map_err(|e| CacheError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| CacheError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let entries: Vec<Entry> =
			serde_json::from_slice(&bytes).map_err(|e| CacheError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries
			.into_iter()
			.filter(|entry| now < entry.reap_at)
			.map(|entry| (entry.key.clone(), entry))
			.collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), CacheError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| CacheError::Backend {
				message: format!("Failed to create cache directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &HashMap<CacheKey, Entry>) -> Result<(), CacheError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: Vec<_> = contents.values().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| CacheError::Serialization {
				message: format!("Failed to serialize cache snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| CacheError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| CacheError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| CacheError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| CacheError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TokenCache for FileCache {
	fn get<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<TokenRecord>> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();

			Ok(self
				.inner
				.read()
				.get(key)
				.filter(|entry| now < entry.reap_at)
				.map(|entry| entry.record.clone()))
		})
	}

	fn set<'a>(
		&'a self,
		key: &'a CacheKey,
		record: TokenRecord,
		ttl: Duration,
	) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let entry = Entry { key: key.to_owned(), record, reap_at: cache::deadline(now, ttl) };
			let mut guard = self.inner.write();
			let mut next = guard.clone();

			next.retain(|_, entry| now < entry.reap_at);
			next.insert(key.to_owned(), entry);
			// Readers only see the new entry once it is on disk.
			self.persist_locked(&next)?;
			*guard = next;

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;
	use crate::auth::{Audience, ClientId};

	fn temp_path(tag: &str) -> PathBuf {
		let unique = format!(
			"oauth2_m2m_file_cache_{tag}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn key() -> CacheKey {
		CacheKey::new(
			&ClientId::new("svc-file").expect("Client fixture should be valid."),
			&Audience::new("https://api.example.com").expect("Audience fixture should be valid."),
		)
	}

	fn record() -> TokenRecord {
		TokenRecord::builder()
			.access_token("file-token")
			.token_type("Bearer")
			.expires_in(Duration::hours(1))
			.claim("scope", "read")
			.build()
			.expect("Failed to build file-cache test record.")
	}

	#[test]
	fn set_and_reload_round_trip() {
		let path = temp_path("reload");
		let cache = FileCache::open(&path).expect("Failed to open file cache.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file cache test.");
		let record = record();

		rt.block_on(cache.set(&key(), record.clone(), Duration::minutes(55)))
			.expect("Failed to write record to file cache.");
		drop(cache);

		let reopened = FileCache::open(&path).expect("Failed to reopen file cache.");
		let fetched = rt
			.block_on(reopened.get(&key()))
			.expect("Failed to read record from file cache.")
			.expect("File cache lost record after reopen.");

		assert_eq!(fetched, record);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file cache snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn expired_entries_are_dropped_on_load() {
		let path = temp_path("expired");
		let now = OffsetDateTime::now_utc();
		let stale = Entry { key: key(), record: record(), reap_at: now - Duration::seconds(1) };

		fs::write(&path, serde_json::to_vec(&vec![stale]).expect("Snapshot should serialize."))
			.expect("Failed to seed file cache snapshot.");

		let cache = FileCache::open(&path).expect("Failed to open seeded file cache.");

		assert!(cache.inner.read().is_empty());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file cache snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn failed_persist_keeps_previous_state() {
		let dir = temp_path("unwritable");
		let path = dir.join("cache.json");
		let cache = FileCache::open(&path).expect("Failed to open nested file cache.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file cache test.");
		let previous = record();

		rt.block_on(cache.set(&key(), previous.clone(), Duration::minutes(30)))
			.expect("Initial write should succeed.");
		fs::remove_dir_all(&dir).expect("Failed to remove cache directory.");
		fs::write(&dir, b"occupied").expect("Failed to replace cache directory with a file.");

		let replacement = TokenRecord::builder()
			.access_token("unsaved-token")
			.expires_in(Duration::hours(1))
			.build()
			.expect("Failed to build replacement record.");
		let err = rt
			.block_on(cache.set(&key(), replacement, Duration::minutes(30)))
			.expect_err("Writes into an unusable directory must fail.");

		assert!(matches!(err, CacheError::Backend { .. }));

		let held = rt
			.block_on(cache.get(&key()))
			.expect("Reads should still succeed.")
			.expect("The previous record should still be served.");

		assert_eq!(held, previous);

		fs::remove_file(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove placeholder file {}: {e}", dir.display())
		});
	}

	#[test]
	fn corrupt_snapshot_is_a_serialization_error() {
		let path = temp_path("corrupt");

		fs::write(&path, b"not json").expect("Failed to seed corrupt snapshot.");

		let err = FileCache::open(&path).expect_err("Corrupt snapshots must be rejected.");

		assert!(matches!(err, CacheError::Serialization { .. }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file cache snapshot {}: {e}", path.display())
		});
	}
}
