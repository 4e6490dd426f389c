//! Settings for one credential identity, sourced explicitly from the environment or a lookup.
//!
//! Nothing here runs at load time; callers build [`ClientSettings`] and hand it to the
//! constructors they need.

// std
use std::env;
// self
use crate::{
	_prelude::*,
	acquirer::{DEFAULT_CACHE_BUFFER, TokenAcquirer},
	auth::{Audience, ClientId, CredentialIdentity, Domain, IdentifierError},
	cache::TokenCache,
	error::ConfigError,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
};
#[cfg(feature = "reqwest")]
use crate::{
	acquirer::ReqwestAcquirer, facade::AuthorizedClient, http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
};

/// Authorization server domain.
pub const ENV_DOMAIN: &str = "AUTH0_DOMAIN";
/// OAuth client identifier.
pub const ENV_CLIENT_ID: &str = "AUTH0_CLIENT_ID";
/// OAuth client secret.
pub const ENV_CLIENT_SECRET: &str = "AUTH0_CLIENT_SECRET";
/// Target API audience.
pub const ENV_AUDIENCE: &str = "AUTH0_AUDIENCE";
/// Optional token endpoint override.
pub const ENV_AUTH_BASE_URL: &str = "AUTH0_AUTH_BASE_URL";
/// Optional cache buffer in whole seconds.
pub const ENV_TOKEN_CACHE_BUFFER: &str = "AUTH0_TOKEN_CACHE_BUFFER";

/// Identity, token endpoint, and cache buffer for one acquirer.
#[derive(Clone, Debug)]
pub struct ClientSettings {
	/// Credential identity.
	pub identity: CredentialIdentity,
	/// Token endpoint; always HTTPS.
	pub token_url: Url,
	/// Margin subtracted from `expires_in` before caching.
	pub cache_buffer: Duration,
}
impl ClientSettings {
	/// Builds settings for `identity` with the default token URL and cache buffer.
	pub fn new(identity: CredentialIdentity) -> Result<Self, ConfigError> {
		let token_url = default_token_url(&identity.domain)?;

		Ok(Self { identity, token_url, cache_buffer: DEFAULT_CACHE_BUFFER })
	}

	/// Overrides the token endpoint. Only HTTPS URLs are accepted.
	pub fn with_token_url(mut self, token_url: Url) -> Result<Self, ConfigError> {
		self.token_url = ensure_https(token_url)?;

		Ok(self)
	}

	/// Overrides the cache buffer. Negative values clamp to zero.
	pub fn with_cache_buffer(mut self, buffer: Duration) -> Self {
		self.cache_buffer = if buffer.is_negative() { Duration::ZERO } else { buffer };

		self
	}

	/// Reads settings from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Reads settings through `lookup`, which returns the raw value of a variable if set.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &'static str| {
			lookup(name)
				.map(|value| value.trim().to_owned())
				.filter(|value| !value.is_empty())
		};
		let required = |name: &'static str| var(name).ok_or(ConfigError::MissingVar { name });
		let domain = required(ENV_DOMAIN)?;
		let client_id = required(ENV_CLIENT_ID)?;
		let client_secret = required(ENV_CLIENT_SECRET)?;
		let audience = required(ENV_AUDIENCE)?;
		let identity = CredentialIdentity::new(
			ClientId::new(client_id).map_err(invalid(ENV_CLIENT_ID))?,
			Audience::new(audience).map_err(invalid(ENV_AUDIENCE))?,
			Domain::new(domain).map_err(invalid(ENV_DOMAIN))?,
			client_secret,
		);
		let mut settings = Self::new(identity)?;

		if let Some(raw) = var(ENV_AUTH_BASE_URL) {
			let token_url =
				Url::parse(&raw).map_err(|source| ConfigError::InvalidTokenUrl { source })?;

			settings = settings.with_token_url(token_url)?;
		}
		if let Some(raw) = var(ENV_TOKEN_CACHE_BUFFER) {
			let secs = raw
				.parse::<i64>()
				.ok()
				.filter(|secs| *secs >= 0)
				.ok_or(ConfigError::InvalidCacheBuffer { value: raw })?;

			settings.cache_buffer = Duration::seconds(secs);
		}

		Ok(settings)
	}

	/// Builds an acquirer on a caller-provided transport + mapper pair.
	pub fn acquirer_with<C, M>(
		&self,
		cache: Arc<dyn TokenCache>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<TokenAcquirer<C, M>>
	where
		C: ?Sized + TokenHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		Ok(TokenAcquirer::with_http_client(
			self.identity.clone(),
			&self.token_url,
			cache,
			http_client,
			mapper,
		)?
		.with_cache_buffer(self.cache_buffer))
	}

	/// Builds an acquirer on the default reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn acquirer(&self, cache: Arc<dyn TokenCache>) -> Result<ReqwestAcquirer> {
		self.acquirer_with(cache, ReqwestHttpClient::new()?, ReqwestTransportErrorMapper)
	}

	/// Builds an [`AuthorizedClient`] on the default reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn authorized_client(
		&self,
		cache: Arc<dyn TokenCache>,
	) -> Result<AuthorizedClient<ReqwestHttpClient, ReqwestTransportErrorMapper>> {
		Ok(AuthorizedClient::new(self.acquirer(cache)?))
	}
}

/// `https://{domain}/oauth/token`.
pub fn default_token_url(domain: &Domain) -> Result<Url, ConfigError> {
	let url = Url::parse(&format!("https://{domain}/oauth/token"))
		.map_err(|source| ConfigError::InvalidTokenUrl { source })?;

	ensure_https(url)
}

fn ensure_https(url: Url) -> Result<Url, ConfigError> {
	if url.scheme() != "https" {
		return Err(ConfigError::InsecureTokenUrl { url: url.to_string() });
	}

	Ok(url)
}

fn invalid(name: &'static str) -> impl Fn(IdentifierError) -> ConfigError {
	move |source| ConfigError::InvalidIdentifier { name, source }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map = pairs
			.iter()
			.map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
			.collect::<HashMap<_, _>>();

		move |name| map.get(name).cloned()
	}

	const BASE: [(&str, &str); 4] = [
		(ENV_DOMAIN, "tenant.eu.auth0.com"),
		(ENV_CLIENT_ID, "svc-reports"),
		(ENV_CLIENT_SECRET, "s3cr3t"),
		(ENV_AUDIENCE, "https://api.example.com"),
	];

	#[test]
	fn defaults_derive_from_domain() {
		let settings =
			ClientSettings::from_lookup(lookup(&BASE)).expect("Base settings should load.");

		assert_eq!(settings.token_url.as_str(), "https://tenant.eu.auth0.com/oauth/token");
		assert_eq!(settings.cache_buffer, Duration::seconds(300));
		assert_eq!(settings.identity.client_id.as_str(), "svc-reports");
		assert_eq!(settings.identity.client_secret.expose(), "s3cr3t");
	}

	#[test]
	fn overrides_are_applied() {
		let mut pairs = BASE.to_vec();

		pairs.push((ENV_AUTH_BASE_URL, "https://login.example.com/token"));
		pairs.push((ENV_TOKEN_CACHE_BUFFER, "60"));

		let settings =
			ClientSettings::from_lookup(lookup(&pairs)).expect("Overridden settings should load.");

		assert_eq!(settings.token_url.as_str(), "https://login.example.com/token");
		assert_eq!(settings.cache_buffer, Duration::seconds(60));
	}

	#[test]
	fn missing_and_blank_values_are_reported() {
		let err = ClientSettings::from_lookup(lookup(&BASE[..3]))
			.expect_err("Audience is required.");

		assert!(matches!(err, ConfigError::MissingVar { name: ENV_AUDIENCE }));

		let mut pairs = BASE.to_vec();

		pairs[1] = (ENV_CLIENT_ID, "   ");

		let err = ClientSettings::from_lookup(lookup(&pairs)).expect_err("Blank client id fails.");

		assert!(matches!(err, ConfigError::MissingVar { name: ENV_CLIENT_ID }));
	}

	#[test]
	fn invalid_values_are_rejected() {
		let mut pairs = BASE.to_vec();

		pairs.push((ENV_AUTH_BASE_URL, "http://login.example.com/token"));

		assert!(matches!(
			ClientSettings::from_lookup(lookup(&pairs)),
			Err(ConfigError::InsecureTokenUrl { .. })
		));

		let mut pairs = BASE.to_vec();

		pairs.push((ENV_TOKEN_CACHE_BUFFER, "-5"));

		assert!(matches!(
			ClientSettings::from_lookup(lookup(&pairs)),
			Err(ConfigError::InvalidCacheBuffer { .. })
		));

		let mut pairs = BASE.to_vec();

		pairs[0] = (ENV_DOMAIN, "tenant example.com");

		assert!(matches!(
			ClientSettings::from_lookup(lookup(&pairs)),
			Err(ConfigError::InvalidIdentifier { name: ENV_DOMAIN, .. })
		));
	}
}
