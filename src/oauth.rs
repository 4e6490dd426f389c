//! Client-credentials grant built on the `oauth2` crate.
//!
//! The grant posts `grant_type=client_credentials`, `client_id`, `client_secret`, and
//! `audience` as form parameters and turns the JSON response into a [`TokenRecord`]. Transport
//! failures go through a [`TransportErrorMapper`] so custom HTTP stacks can classify their own
//! errors.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId as OAuthClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, RequestTokenError, StandardRevocableToken,
	StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{Audience, CredentialIdentity, RawClaims, TokenRecord, TokenSecret},
	error::{AcquisitionError, ConfigError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

/// Response fields beyond the standard ones, kept verbatim.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtraClaims(pub RawClaims);
impl ExtraTokenFields for ExtraClaims {}

/// Token endpoint response shape accepted by the grant.
pub type GrantTokenResponse = StandardTokenResponse<ExtraClaims, BasicTokenType>;

type GrantClient = oauth2::Client<
	BasicErrorResponse,
	GrantTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport.
	fn map_transport_error(
		&self,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => AcquisitionError::Io(inner).into(),
			HttpClientError::Other(message) => AcquisitionError::TokenEndpoint {
				message: format!("HTTP client error: {message}"),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
			_ => AcquisitionError::TokenEndpoint {
				message: "unclassified HTTP client error".into(),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
		}
	}
}

/// Configured client-credentials exchange for one identity.
pub(crate) struct ClientCredentialsGrant<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: GrantClient,
	audience: Audience,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> ClientCredentialsGrant<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		identity: &CredentialIdentity,
		token_url: &Url,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(token_url.to_string())
			.map_err(|source| ConfigError::InvalidTokenUrl { source })?;
		let oauth_client: GrantClient =
			oauth2::Client::new(OAuthClientId::new(identity.client_id.to_string()))
				.set_client_secret(ClientSecret::new(identity.client_secret.expose().to_owned()))
				.set_auth_type(AuthType::RequestBody)
				.set_token_uri(token_url);

		Ok(Self { oauth_client, audience: identity.audience.clone(), http_client, error_mapper })
	}

	/// Performs one grant request. Nothing is cached here.
	pub(crate) async fn request(&self) -> Result<TokenRecord> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let response = self
			.oauth_client
			.exchange_client_credentials()
			.add_extra_param("audience", self.audience.as_str())
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(meta.take(), err, self.error_mapper.as_ref()))?;

		map_token_response(response, OffsetDateTime::now_utc()).map_err(Error::from)
	}
}

fn map_token_response(
	response: GrantTokenResponse,
	received_at: OffsetDateTime,
) -> Result<TokenRecord, AcquisitionError> {
	let access_token = response.access_token().secret();

	if access_token.is_empty() {
		return Err(AcquisitionError::EmptyAccessToken);
	}

	let expires_in = response.expires_in().ok_or(AcquisitionError::MissingExpiresIn)?.as_secs();
	let expires_in =
		i64::try_from(expires_in).map_err(|_| AcquisitionError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(AcquisitionError::NonPositiveExpiresIn);
	}

	let expires_at = received_at
		.checked_add(Duration::seconds(expires_in))
		.ok_or(AcquisitionError::ExpiresInOutOfRange)?;
	let token_type = match response.token_type() {
		BasicTokenType::Bearer => "Bearer",
		other => other.as_ref(),
	};
	let mut claims = response.extra_fields().0.clone();

	if let Some(scopes) = response.scopes() {
		let joined = scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" ");

		claims.insert("scope".into(), joined.into());
	}

	Ok(TokenRecord {
		access_token: TokenSecret::new(access_token.to_owned()),
		token_type: token_type.to_owned(),
		issued_at: received_at,
		expires_at,
		raw_claims: claims,
	})
}

fn map_request_error<E, M>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => AcquisitionError::Rejected {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
			status: meta_status(meta_ref),
		}
		.into(),
		RequestTokenError::Request(error) => mapper.map_transport_error(meta_ref, error),
		RequestTokenError::Parse(error, _body) =>
			AcquisitionError::ResponseParse { source: error, status: meta_status(meta_ref) }.into(),
		RequestTokenError::Other(message) => AcquisitionError::TokenEndpoint {
			message,
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		}
		.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return AcquisitionError::TimedOut {
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
		}
		.into();
	}

	AcquisitionError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::Value;
	use time::macros;
	// self
	use super::*;

	fn parse(body: &str) -> GrantTokenResponse {
		serde_json::from_str(body).expect("Token response fixture should deserialize.")
	}

	#[test]
	fn response_maps_to_record_with_fixed_expiry() {
		let received = macros::datetime!(2025-05-05 10:00 UTC);
		let response = parse(
			r#"{"access_token":"eyJ","token_type":"Bearer","expires_in":86400,"scope":"read:a read:b","org":"acme"}"#,
		);
		let record = map_token_response(response, received).expect("Response should map.");

		assert_eq!(record.access_token.expose(), "eyJ");
		assert_eq!(record.token_type, "Bearer");
		assert_eq!(record.issued_at, received);
		assert_eq!(record.expires_at, macros::datetime!(2025-05-06 10:00 UTC));
		assert_eq!(record.raw_claims.get("org"), Some(&Value::from("acme")));
		assert_eq!(record.raw_claims.get("scope"), Some(&Value::from("read:a read:b")));
	}

	#[test]
	fn lowercase_bearer_is_normalized() {
		let response = parse(r#"{"access_token":"t","token_type":"bearer","expires_in":60}"#);
		let record = map_token_response(response, OffsetDateTime::now_utc())
			.expect("Lowercase bearer should map.");

		assert_eq!(record.authorization(), "Bearer t");
	}

	#[test]
	fn missing_or_zero_expiry_is_rejected() {
		let missing = parse(r#"{"access_token":"t","token_type":"Bearer"}"#);

		assert!(matches!(
			map_token_response(missing, OffsetDateTime::now_utc()),
			Err(AcquisitionError::MissingExpiresIn)
		));

		let zero = parse(r#"{"access_token":"t","token_type":"Bearer","expires_in":0}"#);

		assert!(matches!(
			map_token_response(zero, OffsetDateTime::now_utc()),
			Err(AcquisitionError::NonPositiveExpiresIn)
		));
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn grant_configures_token_endpoint() {
		// self
		use crate::{
			auth::{ClientId, Domain},
			http::ReqwestHttpClient,
		};

		let identity = CredentialIdentity::new(
			ClientId::new("svc-grant").expect("Client fixture should be valid."),
			Audience::new("https://api.example.com").expect("Audience fixture should be valid."),
			Domain::new("tenant.example.com").expect("Domain fixture should be valid."),
			"secret",
		);
		let token_url =
			Url::parse("https://tenant.example.com/oauth/token").expect("Token URL should parse.");
		let grant = ClientCredentialsGrant::new(
			&identity,
			&token_url,
			Arc::new(ReqwestHttpClient::new().expect("Reqwest client should build.")),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.expect("Grant should build from a valid identity.");

		assert_eq!(grant.oauth_client.token_uri().as_str(), token_url.as_str());
		assert_eq!(grant.audience, identity.audience);
	}

	#[test]
	fn empty_access_token_is_rejected() {
		let response = parse(r#"{"access_token":"","token_type":"Bearer","expires_in":60}"#);

		assert!(matches!(
			map_token_response(response, OffsetDateTime::now_utc()),
			Err(AcquisitionError::EmptyAccessToken)
		));
	}
}
