//! Three-tier token acquisition: memory slot, external cache, then a fresh grant.
//!
//! [`TokenAcquirer::acquire`] walks the tiers in order on every call. A grant is the only
//! operation that writes: the new record goes to the cache first and then to the memory slot,
//! so a failure at either step leaves both tiers at their previous values. Concurrent callers
//! for the same [`CacheKey`] serialize on a [`FlightGuards`] entry; whoever waits re-runs the
//! tiers afterwards and picks up the token the first caller stored.

// self
use crate::{
	_prelude::*,
	auth::{CacheKey, CredentialIdentity, TokenRecord},
	cache::TokenCache,
	http::TokenHttpClient,
	oauth::{ClientCredentialsGrant, TransportErrorMapper},
	obs::{self, AcquireOutcome, AcquireSpan, TokenSource},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Acquirer specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestAcquirer = TokenAcquirer<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Default margin subtracted from `expires_in` before writing to the cache.
pub const DEFAULT_CACHE_BUFFER: Duration = Duration::seconds(300);

/// Computes the cache TTL for a token living `expires_in`.
///
/// Returns `expires_in - buffer`, or the full `expires_in` when the subtraction would go
/// negative. A zero result is kept as is.
pub fn cache_ttl(expires_in: Duration, buffer: Duration) -> Duration {
	let buffered = expires_in - buffer;

	if buffered.is_negative() { expires_in } else { buffered }
}

/// Single-flight guards keyed by [`CacheKey`].
///
/// Share one instance between acquirers (see [`TokenAcquirer::with_flight_guards`]) to keep at
/// most one grant in flight per client/audience pair across all of them.
#[derive(Debug, Default)]
pub struct FlightGuards(Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>);
impl FlightGuards {
	/// Returns (and creates on demand) the guard for `key`.
	pub fn guard(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
		let mut guards = self.0.lock();

		guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Number of keys that have been guarded so far.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Returns `true` when no key has been guarded yet.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}
}

/// Produces a currently valid [`TokenRecord`] for one [`CredentialIdentity`].
pub struct TokenAcquirer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	identity: CredentialIdentity,
	key: CacheKey,
	grant: ClientCredentialsGrant<C, M>,
	cache: Arc<dyn TokenCache>,
	cache_buffer: Duration,
	memory: Mutex<Option<TokenRecord>>,
	flights: Arc<FlightGuards>,
}
impl<C, M> TokenAcquirer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an acquirer that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		identity: CredentialIdentity,
		token_url: &Url,
		cache: Arc<dyn TokenCache>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let grant =
			ClientCredentialsGrant::new(&identity, token_url, http_client.into(), mapper.into())?;

		Ok(Self {
			key: identity.cache_key(),
			identity,
			grant,
			cache,
			cache_buffer: DEFAULT_CACHE_BUFFER,
			memory: Default::default(),
			flights: Default::default(),
		})
	}

	/// Overrides the cache buffer (defaults to 300 seconds). Negative values clamp to zero.
	pub fn with_cache_buffer(mut self, buffer: Duration) -> Self {
		self.cache_buffer = if buffer.is_negative() { Duration::ZERO } else { buffer };

		self
	}

	/// Shares single-flight guards with other acquirers.
	pub fn with_flight_guards(mut self, flights: Arc<FlightGuards>) -> Self {
		self.flights = flights;

		self
	}

	/// Identity this acquirer serves.
	pub fn identity(&self) -> &CredentialIdentity {
		&self.identity
	}

	/// Key used for the cache tier and the single-flight guard.
	pub fn cache_key(&self) -> &CacheKey {
		&self.key
	}

	/// Buffer subtracted from `expires_in` when writing to the cache.
	pub fn cache_buffer(&self) -> Duration {
		self.cache_buffer
	}

	/// Record held in the memory slot, expired or not. Performs no I/O.
	pub fn cached(&self) -> Option<TokenRecord> {
		self.memory.lock().clone()
	}

	/// Empties the memory slot so the next `acquire` consults the cache.
	pub fn clear_memory(&self) {
		self.memory.lock().take();
	}

	/// Returns a currently valid token, consulting memory, cache, and the token endpoint in
	/// that order.
	///
	/// Cache failures propagate as [`Error::Cache`] without falling through to the grant.
	pub async fn acquire(&self) -> Result<TokenRecord> {
		let span = AcquireSpan::new(&self.identity);

		obs::record_acquire_outcome(AcquireOutcome::Attempt);

		let result = span.instrument(self.acquire_tiers()).await;

		match &result {
			Ok(_) => obs::record_acquire_outcome(AcquireOutcome::Success),
			Err(_) => obs::record_acquire_outcome(AcquireOutcome::Failure),
		}

		result
	}

	async fn acquire_tiers(&self) -> Result<TokenRecord> {
		if let Some(record) = self.from_memory(OffsetDateTime::now_utc()) {
			return Ok(served(TokenSource::Memory, record));
		}

		let guard = self.flights.guard(&self.key);
		let _singleflight = guard.lock().await;

		// Another caller may have filled the slot while this one waited.
		if let Some(record) = self.from_memory(OffsetDateTime::now_utc()) {
			return Ok(served(TokenSource::Memory, record));
		}
		if let Some(record) = self.cache.get(&self.key).await? {
			if !record.is_expired_at(OffsetDateTime::now_utc()) {
				*self.memory.lock() = Some(record.clone());

				return Ok(served(TokenSource::Cache, record));
			}

			obs::log_stale_cache_hit(&record);
		}

		let record = self.grant.request().await?;
		let ttl = cache_ttl(record.lifetime(), self.cache_buffer);

		self.cache.set(&self.key, record.clone(), ttl).await?;
		obs::log_cache_write(ttl);
		*self.memory.lock() = Some(record.clone());

		Ok(served(TokenSource::Grant, record))
	}

	fn from_memory(&self, now: OffsetDateTime) -> Option<TokenRecord> {
		self.memory.lock().as_ref().filter(|record| !record.is_expired_at(now)).cloned()
	}
}
#[cfg(feature = "reqwest")]
impl TokenAcquirer<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an acquirer backed by its own reqwest transport.
	pub fn new(
		identity: CredentialIdentity,
		token_url: &Url,
		cache: Arc<dyn TokenCache>,
	) -> Result<Self> {
		Self::with_http_client(
			identity,
			token_url,
			cache,
			ReqwestHttpClient::new()?,
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> Debug for TokenAcquirer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenAcquirer")
			.field("identity", &self.identity)
			.field("cache_buffer", &self.cache_buffer)
			.field("has_memory_token", &self.memory.lock().is_some())
			.finish_non_exhaustive()
	}
}

fn served(source: TokenSource, record: TokenRecord) -> TokenRecord {
	obs::log_token_source(source, &record);
	obs::record_token_source(source);

	record
}
