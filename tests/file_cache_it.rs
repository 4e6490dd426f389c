// std
use std::{env, fs, process};
// crates.io
use httpmock::prelude::*;
// self
use oauth2_m2m::{_preludet::*, cache::FileCache};

#[tokio::test]
async fn token_survives_restart_through_file_cache() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"durable-token\",\"token_type\":\"Bearer\",\"expires_in\":7200,\"scope\":\"read:reports\"}",
			);
		})
		.await;
	let path = env::temp_dir().join(format!(
		"oauth2_m2m_restart_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos()
	));
	let first = {
		let cache = Arc::new(FileCache::open(&path).expect("Failed to open file cache."));
		let acquirer = build_reqwest_test_acquirer(&server.url("/oauth/token"), cache);

		acquirer.acquire().await.expect("Initial grant should succeed.")
	};
	let reopened = Arc::new(FileCache::open(&path).expect("Failed to reopen file cache."));
	let acquirer = build_reqwest_test_acquirer(&server.url("/oauth/token"), reopened);
	let second = acquirer.acquire().await.expect("Restarted acquire should hit the file cache.");

	assert_eq!(second, first);
	assert_eq!(second.expires_at, first.expires_at);
	assert_eq!(
		second.raw_claims.get("scope").and_then(|value| value.as_str()),
		Some("read:reports")
	);

	mock.assert_calls_async(1).await;

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary file cache snapshot {}: {e}", path.display())
	});
}
