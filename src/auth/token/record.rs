//! Immutable token records and their builder.

// crates.io
use serde_json::Value;
// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Response fields the grant returned beyond the modelled ones (e.g. `scope`).
pub type RawClaims = BTreeMap<String, Value>;

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Bearer token obtained from a client-credentials grant.
///
/// `expires_at` is fixed when the grant response arrives and never recomputed. A refresh
/// produces a new record rather than mutating this one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token type reported by the server, usually `Bearer`.
	pub token_type: String,
	/// Instant the grant response was received.
	pub issued_at: OffsetDateTime,
	/// `issued_at + expires_in`.
	pub expires_at: OffsetDateTime,
	/// Extra response fields kept verbatim.
	#[serde(default)]
	pub raw_claims: RawClaims,
}
impl TokenRecord {
	/// Default token type when the server omits or blanks it.
	pub const DEFAULT_TOKEN_TYPE: &'static str = "Bearer";

	/// Returns a builder for constructing records.
	pub fn builder() -> TokenRecordBuilder {
		TokenRecordBuilder::default()
	}

	/// `now >= expires_at`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_at
	}

	/// Checks expiry against the current UTC clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Lifetime granted by the server (the original `expires_in`).
	pub fn lifetime(&self) -> Duration {
		self.expires_at - self.issued_at
	}

	/// Time left before expiry at `now`; zero once expired.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - now;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}

	/// Value for an `Authorization` header, e.g. `Bearer eyJ...`.
	pub fn authorization(&self) -> String {
		format!("{} {}", self.token_type, self.access_token.expose())
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("raw_claims", &self.raw_claims.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug, Default)]
pub struct TokenRecordBuilder {
	access_token: Option<TokenSecret>,
	token_type: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	raw_claims: RawClaims,
}
impl TokenRecordBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the token type; blank values fall back to [`TokenRecord::DEFAULT_TOKEN_TYPE`].
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Adds one extra response field.
	pub fn claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.raw_claims.insert(name.into(), value.into());

		self
	}

	/// Replaces all extra response fields.
	pub fn raw_claims(mut self, claims: RawClaims) -> Self {
		self.raw_claims = claims;

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};
		let token_type = self
			.token_type
			.filter(|value| !value.trim().is_empty())
			.unwrap_or_else(|| TokenRecord::DEFAULT_TOKEN_TYPE.to_owned());

		Ok(TokenRecord {
			access_token,
			token_type,
			issued_at,
			expires_at,
			raw_claims: self.raw_claims,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn record() -> TokenRecord {
		TokenRecord::builder()
			.access_token("access")
			.token_type("Bearer")
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::seconds(86_400))
			.claim("scope", "read:catalogue")
			.build()
			.expect("Token record fixture should build.")
	}

	#[test]
	fn expiry_boundary_is_inclusive() {
		let record = record();

		assert_eq!(record.expires_at, macros::datetime!(2025-01-02 00:00 UTC));
		assert!(!record.is_expired_at(macros::datetime!(2025-01-01 23:59:59 UTC)));
		assert!(record.is_expired_at(macros::datetime!(2025-01-02 00:00 UTC)));
		assert!(record.is_expired_at(macros::datetime!(2025-01-03 00:00 UTC)));
	}

	#[test]
	fn lifetime_and_remaining_derive_from_fixed_instants() {
		let record = record();

		assert_eq!(record.lifetime(), Duration::seconds(86_400));
		assert_eq!(
			record.remaining_at(macros::datetime!(2025-01-01 23:00 UTC)),
			Duration::hours(1)
		);
		assert_eq!(record.remaining_at(macros::datetime!(2025-02-01 00:00 UTC)), Duration::ZERO);
	}

	#[test]
	fn builder_requires_token_and_expiry() {
		assert_eq!(
			TokenRecord::builder().expires_in(Duration::minutes(1)).build(),
			Err(TokenRecordBuilderError::MissingAccessToken)
		);
		assert_eq!(
			TokenRecord::builder().access_token("a").build(),
			Err(TokenRecordBuilderError::MissingExpiry)
		);
	}

	#[test]
	fn blank_token_type_defaults_to_bearer() {
		let record = TokenRecord::builder()
			.access_token("a")
			.token_type(" ")
			.expires_in(Duration::minutes(1))
			.build()
			.expect("Record should build with a blank token type.");

		assert_eq!(record.token_type, "Bearer");
		assert_eq!(record.authorization(), "Bearer a");
	}

	#[test]
	fn serde_preserves_token_fields() {
		let record = record();
		let payload = serde_json::to_string(&record).expect("Record should serialize.");
		let decoded: TokenRecord =
			serde_json::from_str(&payload).expect("Record should deserialize.");

		assert_eq!(decoded, record);
		assert_eq!(decoded.raw_claims.get("scope"), Some(&Value::from("read:catalogue")));
	}

	#[test]
	fn debug_redacts_access_token() {
		let rendered = format!("{:?}", record());

		assert!(rendered.contains("<redacted>"));
		assert!(!rendered.contains("\"access\""));
	}
}
