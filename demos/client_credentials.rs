//! Demonstrates loading settings, acquiring a service token through the memory/cache/grant
//! tiers, and calling an API inside a scope that releases the transport afterwards.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_m2m::{
	acquirer::ReqwestAcquirer,
	cache::{MemoryCache, TokenCache},
	config::{self, ClientSettings},
	error::ConfigError,
	facade::AuthorizedClient,
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	reqwest::Client,
	url::Url,
};

fn insecure_client() -> Result<Client, oauth2_m2m::reqwest::Error> {
	Client::builder().danger_accept_invalid_certs(true).danger_accept_invalid_hostnames(true).build()
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token").body_includes("grant_type=client_credentials");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/reports").header("authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;
	let token_url = server.url("/oauth/token");
	let settings = ClientSettings::from_lookup(|name| match name {
		config::ENV_DOMAIN => Some("tenant.example.com".into()),
		config::ENV_CLIENT_ID => Some("svc-reports".into()),
		config::ENV_CLIENT_SECRET => Some("super-secret".into()),
		config::ENV_AUDIENCE => Some("https://api.example.com".into()),
		config::ENV_AUTH_BASE_URL => Some(token_url.clone()),
		_ => None,
	})?;
	let cache: Arc<dyn TokenCache> = Arc::new(MemoryCache::default());
	let acquirer: ReqwestAcquirer = settings.acquirer_with(
		cache,
		ReqwestHttpClient::with_client(insecure_client()?),
		ReqwestTransportErrorMapper,
	)?;
	let client = AuthorizedClient::new(acquirer)
		.with_base_url(Url::parse(&server.url("/v1/"))?)
		.with_client_factory(|| insecure_client().map_err(ConfigError::from));
	let status = {
		let transport = client.enter().await?;

		println!("Using token fingerprint {}.", transport.token().access_token.fingerprint());

		transport.get("reports")?.send().await?.status()
	};

	println!("API answered {status}; transport open afterwards: {}.", client.is_open());

	// Memory tier: no second grant.
	let again = client.acquirer().acquire().await?;

	println!("Reused token expiring at {}.", again.expires_at);

	token_mock.assert_async().await;
	api_mock.assert_async().await;

	Ok(())
}
