//! Validated identifiers for the credential triple (client, audience, domain).

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $validate:path) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$validate(view)?;

				Ok(Self(view.to_owned()))
			}

			/// Returns the identifier as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$validate(&value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

// Auth0 audiences are full API URLs, so the limit is looser than a typical slug.
const IDENTIFIER_MAX_LEN: usize = 256;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (client, audience, domain).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (client, audience, domain).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (client, audience, domain).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
	/// The audience looked like a URL but was not an absolute URL with a host.
	#[error("Audience `{value}` is not a usable API URL: {reason}.")]
	InvalidAudience {
		/// Rejected audience.
		value: String,
		/// What is wrong with it.
		reason: &'static str,
	},
	/// The domain was not a bare host (optionally with a port).
	#[error("Domain `{value}` is not a bare host: {reason}.")]
	InvalidDomain {
		/// Rejected domain.
		value: String,
		/// What is wrong with it.
		reason: &'static str,
	},
}

def_id! {
	ClientId,
	"OAuth 2.0 client identifier issued by the authorization server.",
	"Client",
	validate_client_id
}
def_id! {
	Audience,
	"Target API the requested token is authorized for: an absolute API URL or an opaque name.",
	"Audience",
	validate_audience
}
def_id! {
	Domain,
	"Authorization server host, with an optional port (e.g. `tenant.eu.auth0.com`).",
	"Domain",
	validate_domain
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

fn validate_client_id(view: &str) -> Result<(), IdentifierError> {
	validate_view("Client", view)
}

fn validate_audience(view: &str) -> Result<(), IdentifierError> {
	validate_view("Audience", view)?;

	// Names without a scheme are opaque API identifiers.
	if !view.contains("://") {
		return Ok(());
	}

	let invalid = |reason| IdentifierError::InvalidAudience { value: view.to_owned(), reason };
	let url = Url::parse(view).map_err(|_| invalid("it does not parse"))?;

	if !url.has_host() {
		return Err(invalid("it has no host"));
	}
	if url.fragment().is_some() {
		return Err(invalid("it carries a fragment"));
	}

	Ok(())
}

fn validate_domain(view: &str) -> Result<(), IdentifierError> {
	validate_view("Domain", view)?;

	let invalid = |reason| IdentifierError::InvalidDomain { value: view.to_owned(), reason };

	if view.contains("://") {
		return Err(invalid("it includes a scheme"));
	}

	let url = Url::parse(&format!("https://{view}")).map_err(|_| invalid("it is not a valid host"))?;

	if matches!(url.host_str(), None | Some("")) {
		return Err(invalid("it is not a valid host"));
	}
	if !url.username().is_empty() || url.password().is_some() {
		return Err(invalid("it includes credentials"));
	}
	if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
		return Err(invalid("it includes a path"));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_padding_and_empty_values() {
		assert!(ClientId::new(" client").is_err(), "Leading whitespace must be rejected.");
		assert!(ClientId::new("client ").is_err(), "Trailing whitespace must be rejected.");
		assert!(Audience::new("").is_err());
		assert!(Domain::new("tenant .auth0.com").is_err());

		let audience = Audience::new("https://api.example.com/")
			.expect("URL-shaped audiences should be accepted.");

		assert_eq!(audience.as_str(), "https://api.example.com/");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let client: ClientId =
			serde_json::from_str("\"svc-reporting\"").expect("Client id should deserialize.");

		assert_eq!(client.as_ref(), "svc-reporting");
		assert!(serde_json::from_str::<ClientId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<Domain>("\"\"").is_err());
	}

	#[test]
	fn length_limit_is_inclusive() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		Audience::new(&exact).expect("Exact length should succeed.");

		let err = Audience::new("a".repeat(IDENTIFIER_MAX_LEN + 1))
			.expect_err("Overlong audiences must be rejected.");

		assert_eq!(err, IdentifierError::TooLong { kind: "Audience", max: IDENTIFIER_MAX_LEN });
	}

	#[test]
	fn audiences_accept_api_urls_and_opaque_names() {
		for ok in ["https://api.example.com", "https://api.example.com/v2/", "urn:reports", "api"] {
			Audience::new(ok).unwrap_or_else(|e| panic!("Audience {ok} should be accepted: {e}"));
		}

		assert!(matches!(
			Audience::new("https://"),
			Err(IdentifierError::InvalidAudience { .. })
		));
		assert!(matches!(
			Audience::new("https://api.example.com/#section"),
			Err(IdentifierError::InvalidAudience { reason: "it carries a fragment", .. })
		));
	}

	#[test]
	fn domains_must_be_bare_hosts() {
		for ok in ["tenant.eu.auth0.com", "localhost:8443", "127.0.0.1"] {
			Domain::new(ok).unwrap_or_else(|e| panic!("Domain {ok} should be accepted: {e}"));
		}

		assert!(matches!(
			Domain::new("https://tenant.auth0.com"),
			Err(IdentifierError::InvalidDomain { reason: "it includes a scheme", .. })
		));
		assert!(matches!(
			Domain::new("tenant.auth0.com/oauth"),
			Err(IdentifierError::InvalidDomain { reason: "it includes a path", .. })
		));
		assert!(matches!(
			Domain::new("user@tenant.auth0.com"),
			Err(IdentifierError::InvalidDomain { reason: "it includes credentials", .. })
		));
		assert!(serde_json::from_str::<Domain>("\"tenant.auth0.com?x=1\"").is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<ClientId, u8> = HashMap::from_iter([(
			ClientId::new("svc-a").expect("Client used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("svc-a"), Some(&7));
	}
}
