//! Authorized HTTP client facade with scoped release.
//!
//! [`AuthorizedClient`] owns one [`TokenAcquirer`] and at most one open reqwest client. The
//! client is built on first use and dropped by [`AuthorizedClient::close`]; the acquirer's
//! memory slot survives a close, so reopening costs no grant while the token is valid.

// std
use std::ops::Deref;
// crates.io
use reqwest::{Method, RequestBuilder, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	acquirer::TokenAcquirer,
	auth::TokenRecord,
	error::ConfigError,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
};

type ClientFactory = Arc<dyn Fn() -> Result<ReqwestClient, ConfigError> + Send + Sync>;

/// Ready-to-use transport carrying a valid token.
///
/// Clones share the underlying connection pool.
#[derive(Clone)]
pub struct Transport {
	client: ReqwestClient,
	token: TokenRecord,
	base_url: Option<Url>,
}
impl Transport {
	/// Token attached to every request.
	pub fn token(&self) -> &TokenRecord {
		&self.token
	}

	/// `Authorization` header value.
	pub fn authorization(&self) -> String {
		self.token.authorization()
	}

	/// Underlying reqwest client.
	pub fn client(&self) -> &ReqwestClient {
		&self.client
	}

	/// Starts a request with the authorization header set.
	///
	/// Absolute URLs are used as is; anything else is joined against the base URL.
	pub fn request(&self, method: Method, path_or_url: &str) -> Result<RequestBuilder> {
		let url = self.resolve(path_or_url)?;

		Ok(self.client.request(method, url).header(AUTHORIZATION, self.authorization()))
	}

	/// Shorthand for a `GET` request.
	pub fn get(&self, path_or_url: &str) -> Result<RequestBuilder> {
		self.request(Method::GET, path_or_url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(&self, path_or_url: &str) -> Result<RequestBuilder> {
		self.request(Method::POST, path_or_url)
	}

	fn resolve(&self, path_or_url: &str) -> Result<Url, ConfigError> {
		let invalid = |source| ConfigError::InvalidRequestUrl { url: path_or_url.into(), source };

		match Url::parse(path_or_url) {
			Ok(url) => Ok(url),
			Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
				Some(base) => base.join(path_or_url).map_err(invalid),
				None => Err(invalid(url::ParseError::RelativeUrlWithoutBase)),
			},
			Err(e) => Err(invalid(e)),
		}
	}
}
impl Debug for Transport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Transport")
			.field("token", &self.token)
			.field("base_url", &self.base_url.as_ref().map(Url::as_str))
			.finish_non_exhaustive()
	}
}

/// Facade that hands out authorized transports and releases them on scope exit.
pub struct AuthorizedClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	acquirer: TokenAcquirer<C, M>,
	base_url: Option<Url>,
	client_factory: ClientFactory,
	client: Mutex<Option<ReqwestClient>>,
	attached: Mutex<Option<TokenRecord>>,
}
impl<C, M> AuthorizedClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Wraps an acquirer. Nothing is opened until the first [`AuthorizedClient::transport`].
	pub fn new(acquirer: TokenAcquirer<C, M>) -> Self {
		Self {
			acquirer,
			base_url: None,
			client_factory: Arc::new(|| ReqwestClient::builder().build().map_err(ConfigError::from)),
			client: Default::default(),
			attached: Default::default(),
		}
	}

	/// Sets the base URL that relative request paths are joined against.
	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}

	/// Replaces how the API client is built on each (re)open.
	pub fn with_client_factory<F>(mut self, factory: F) -> Self
	where
		F: 'static + Send + Sync + Fn() -> Result<ReqwestClient, ConfigError>,
	{
		self.client_factory = Arc::new(factory);

		self
	}

	/// Acquirer backing this facade.
	pub fn acquirer(&self) -> &TokenAcquirer<C, M> {
		&self.acquirer
	}

	/// Base URL for relative request paths, if configured.
	pub fn base_url(&self) -> Option<&Url> {
		self.base_url.as_ref()
	}

	/// Returns `true` while an HTTP client is open.
	pub fn is_open(&self) -> bool {
		self.client.lock().is_some()
	}

	/// Returns the open transport, building it and attaching a token on first use.
	///
	/// The attached token is reused until it expires, at which point the acquirer is asked for
	/// a new one.
	pub async fn transport(&self) -> Result<Transport> {
		let client = self.open_client()?;
		let now = OffsetDateTime::now_utc();
		let attached = self.attached.lock().clone().filter(|token| !token.is_expired_at(now));
		let token = match attached {
			Some(token) => token,
			None => {
				let token = self.acquirer.acquire().await?;

				*self.attached.lock() = Some(token.clone());

				token
			},
		};

		Ok(Transport { client, token, base_url: self.base_url.clone() })
	}

	/// Opens a transport whose guard closes the facade when dropped.
	///
	/// A failure to open also closes, so no client is left behind.
	pub async fn enter(&self) -> Result<AuthorizedScope<'_, C, M>> {
		match self.transport().await {
			Ok(transport) => Ok(AuthorizedScope { owner: self, transport }),
			Err(e) => {
				self.close();

				Err(e)
			},
		}
	}

	/// Runs `f` with an open transport and closes afterwards, whatever `f` returns.
	pub async fn scope<F, Fut, T>(&self, f: F) -> Result<T>
	where
		F: FnOnce(Transport) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let scope = self.enter().await?;

		f(scope.transport.clone()).await
	}

	/// Drops the HTTP client and the attached token.
	///
	/// Returns `false` when nothing was open. Calling it repeatedly is harmless.
	pub fn close(&self) -> bool {
		let was_open = self.client.lock().take().is_some();

		self.attached.lock().take();

		was_open
	}

	fn open_client(&self) -> Result<ReqwestClient, ConfigError> {
		let mut client = self.client.lock();

		if let Some(open) = client.as_ref() {
			return Ok(open.clone());
		}

		let built = (self.client_factory)()?;

		*client = Some(built.clone());

		Ok(built)
	}
}
impl<C, M> Debug for AuthorizedClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizedClient")
			.field("acquirer", &self.acquirer)
			.field("base_url", &self.base_url.as_ref().map(Url::as_str))
			.field("open", &self.is_open())
			.finish_non_exhaustive()
	}
}

/// Guard returned by [`AuthorizedClient::enter`]; closes the facade on drop.
pub struct AuthorizedScope<'a, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	owner: &'a AuthorizedClient<C, M>,
	transport: Transport,
}
impl<C, M> Deref for AuthorizedScope<'_, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	type Target = Transport;

	fn deref(&self) -> &Self::Target {
		&self.transport
	}
}
impl<C, M> Drop for AuthorizedScope<'_, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn drop(&mut self) {
		self.owner.close();
	}
}
impl<C, M> Debug for AuthorizedScope<'_, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AuthorizedScope").field(&self.transport).finish()
	}
}
