//! Machine-to-machine OAuth 2.0 tokens without the stampede: client-credentials grants reused
//! from memory, shared through a TTL cache, and refreshed once per expiry behind a
//! single-flight guard.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod acquirer;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
#[cfg(feature = "reqwest")] pub mod facade;
pub mod http;
pub mod oauth;
pub mod obs;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	// self
	use crate::{
		acquirer::ReqwestAcquirer,
		auth::{Audience, CacheKey, ClientId, CredentialIdentity, Domain, TokenRecord},
		cache::{CacheError, CacheFuture, MemoryCache, TokenCache},
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Token transport counterpart of [`test_reqwest_client`].
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		ReqwestHttpClient::with_client(test_reqwest_client())
	}

	/// Identity used across integration tests.
	pub fn test_identity() -> CredentialIdentity {
		CredentialIdentity::new(
			ClientId::new("svc-reports").expect("Client fixture should be valid."),
			Audience::new("https://api.example.com").expect("Audience fixture should be valid."),
			Domain::new("tenant.example.com").expect("Domain fixture should be valid."),
			"s3cr3t",
		)
	}

	/// Constructs a [`ReqwestAcquirer`] pointed at `token_url` with the insecure test transport.
	pub fn build_reqwest_test_acquirer(
		token_url: &str,
		cache: Arc<dyn TokenCache>,
	) -> ReqwestAcquirer {
		let token_url = Url::parse(token_url).expect("Token URL fixture should parse.");

		ReqwestAcquirer::with_http_client(
			test_identity(),
			&token_url,
			cache,
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
		.expect("Failed to build test acquirer.")
	}

	/// [`MemoryCache`] wrapper that counts calls, records TTLs, and can be told to fail.
	#[derive(Debug, Default)]
	pub struct CountingCache {
		inner: MemoryCache,
		gets: AtomicUsize,
		sets: Mutex<Vec<(CacheKey, Duration)>>,
		fail_get: AtomicBool,
		fail_set: AtomicBool,
	}
	impl CountingCache {
		/// Number of `get` calls so far.
		pub fn gets(&self) -> usize {
			self.gets.load(Ordering::SeqCst)
		}

		/// Number of `set` calls so far.
		pub fn sets(&self) -> usize {
			self.sets.lock().len()
		}

		/// TTL passed to the most recent `set`.
		pub fn last_ttl(&self) -> Option<Duration> {
			self.sets.lock().last().map(|(_, ttl)| *ttl)
		}

		/// Backing memory cache, for seeding and inspection without touching the counters.
		pub fn inner(&self) -> &MemoryCache {
			&self.inner
		}

		/// Makes subsequent `get` calls fail with a backend error.
		pub fn fail_get(&self, fail: bool) {
			self.fail_get.store(fail, Ordering::SeqCst);
		}

		/// Makes subsequent `set` calls fail with a backend error.
		pub fn fail_set(&self, fail: bool) {
			self.fail_set.store(fail, Ordering::SeqCst);
		}

		/// Seeds a record directly into the backing cache.
		pub async fn seed(&self, key: &CacheKey, record: TokenRecord, ttl: Duration) {
			self.inner.set(key, record, ttl).await.expect("Seeding the memory cache should work.");
		}
	}
	impl TokenCache for CountingCache {
		fn get<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<TokenRecord>> {
			self.gets.fetch_add(1, Ordering::SeqCst);

			if self.fail_get.load(Ordering::SeqCst) {
				return Box::pin(async {
					Err(CacheError::Backend { message: "injected get failure".into() })
				});
			}

			self.inner.get(key)
		}

		fn set<'a>(
			&'a self,
			key: &'a CacheKey,
			record: TokenRecord,
			ttl: Duration,
		) -> CacheFuture<'a, ()> {
			if self.fail_set.load(Ordering::SeqCst) {
				return Box::pin(async {
					Err(CacheError::Backend { message: "injected set failure".into() })
				});
			}

			self.sets.lock().push((key.clone(), ttl));
			self.inner.set(key, record, ttl)
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
