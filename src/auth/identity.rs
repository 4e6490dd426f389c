//! Credential identity and the cache key derived from it.

// self
use crate::{
	_prelude::*,
	auth::{Audience, ClientId, Domain, TokenSecret},
};

/// Which token is needed: a client, the API it targets, and the issuing domain.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialIdentity {
	/// OAuth client identifier.
	pub client_id: ClientId,
	/// Target API audience.
	pub audience: Audience,
	/// Authorization server domain.
	pub domain: Domain,
	/// Client secret sent with every grant.
	pub client_secret: TokenSecret,
}
impl CredentialIdentity {
	/// Bundles the identity fields.
	pub fn new(
		client_id: ClientId,
		audience: Audience,
		domain: Domain,
		client_secret: impl Into<String>,
	) -> Self {
		Self { client_id, audience, domain, client_secret: TokenSecret::new(client_secret) }
	}

	/// Key under which this identity's token is cached.
	///
	/// Only `client_id` and `audience` participate, so two domains sharing both values share an
	/// entry.
	pub fn cache_key(&self) -> CacheKey {
		CacheKey::new(&self.client_id, &self.audience)
	}
}
impl Debug for CredentialIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialIdentity")
			.field("client_id", &self.client_id)
			.field("audience", &self.audience)
			.field("domain", &self.domain)
			.field("client_secret", &"<redacted>")
			.finish()
	}
}

/// Plain `client_id + audience` concatenation used by every cache backend.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);
impl CacheKey {
	/// Builds the key for a client/audience pair.
	pub fn new(client_id: &ClientId, audience: &Audience) -> Self {
		let mut key = String::with_capacity(client_id.len() + audience.len());

		key.push_str(client_id);
		key.push_str(audience);

		Self(key)
	}

	/// Returns the key as stored in the cache.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for CacheKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Debug for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "CacheKey({})", self.0)
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
