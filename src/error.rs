//! Error taxonomy shared by the acquirer, caches, and facade.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// None of the variants leave partial state behind: a failed acquisition keeps the memory slot
/// and the cache entry at their pre-call values.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The token endpoint could not produce a usable token.
	#[error(transparent)]
	Acquisition(#[from] AcquisitionError),
	/// The token cache failed on read or write.
	#[error("{0}")]
	Cache(
		#[from]
		#[source]
		crate::cache::CacheError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl Error {
	/// Returns `true` for token endpoint failures.
	pub fn is_acquisition(&self) -> bool {
		matches!(self, Self::Acquisition(_))
	}

	/// Returns `true` for cache backend failures.
	pub fn is_cache(&self) -> bool {
		matches!(self, Self::Cache(_))
	}

	/// Returns `true` for configuration failures.
	pub fn is_config(&self) -> bool {
		matches!(self, Self::Config(_))
	}
}

/// Configuration and validation failures, raised at construction time.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A required environment variable is unset or empty.
	#[error("Required setting `{name}` is not set.")]
	MissingVar {
		/// Variable name.
		name: &'static str,
	},
	/// An identity field failed validation.
	#[error("Setting `{name}` is invalid.")]
	InvalidIdentifier {
		/// Variable name.
		name: &'static str,
		/// Validation failure.
		#[source]
		source: crate::auth::IdentifierError,
	},
	/// Token endpoint URL cannot be parsed.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Token endpoint does not use HTTPS.
	#[error("Token endpoint must use HTTPS: {url}.")]
	InsecureTokenUrl {
		/// Offending URL.
		url: String,
	},
	/// Cache buffer is not a non-negative integer number of seconds.
	#[error("Token cache buffer `{value}` is not a non-negative number of seconds.")]
	InvalidCacheBuffer {
		/// Raw value supplied.
		value: String,
	},
	/// A request path or URL could not be resolved for the authorized transport.
	#[error("Request URL `{url}` cannot be resolved.")]
	InvalidRequestUrl {
		/// Path or URL supplied by the caller.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures of the client-credentials grant. Callers may retry with a fresh `acquire`.
#[derive(Debug, ThisError)]
pub enum AcquisitionError {
	/// The authorization server answered with an OAuth error body.
	#[error("Token endpoint rejected the grant: {error}{}.", fmt_description(.description))]
	Rejected {
		/// OAuth `error` code (e.g. `access_denied`, `invalid_client`).
		error: String,
		/// OAuth `error_description`, when supplied.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The token endpoint returned an unexpected response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with a body that could not be parsed.
	#[error("Token endpoint returned a malformed body.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The request timed out.
	#[error("Request timed out while calling the token endpoint.")]
	TimedOut {
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a zero duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an empty access token.
	#[error("Token endpoint returned an empty access token.")]
	EmptyAccessToken,
}
impl AcquisitionError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// HTTP status associated with the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. }
			| Self::TokenEndpoint { status, .. }
			| Self::ResponseParse { status, .. }
			| Self::TimedOut { status } => *status,
			_ => None,
		}
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for AcquisitionError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

fn fmt_description(description: &Option<String>) -> String {
	description.as_deref().map(|value| format!(" ({value})")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as _;
	// self
	use super::*;
	use crate::cache::CacheError;

	#[test]
	fn cache_error_converts_with_source() {
		let cache_error = CacheError::Backend { message: "redis unreachable".into() };
		let error: Error = cache_error.clone().into();

		assert!(error.is_cache());
		assert!(!error.is_acquisition());
		assert!(error.to_string().contains("redis unreachable"));

		let source = error.source().expect("Cache errors should expose their source.");

		assert_eq!(source.to_string(), cache_error.to_string());
	}

	#[test]
	fn rejected_message_includes_description() {
		let error = AcquisitionError::Rejected {
			error: "access_denied".into(),
			description: Some("Service not enabled".into()),
			status: Some(403),
		};

		assert_eq!(
			error.to_string(),
			"Token endpoint rejected the grant: access_denied (Service not enabled)."
		);
		assert_eq!(error.status(), Some(403));

		let error: Error = error.into();

		assert!(error.is_acquisition());
	}

	#[test]
	fn config_errors_name_the_setting() {
		let error: Error = ConfigError::MissingVar { name: "AUTH0_CLIENT_ID" }.into();

		assert!(error.is_config());
		assert_eq!(error.to_string(), "Required setting `AUTH0_CLIENT_ID` is not set.");
	}
}
