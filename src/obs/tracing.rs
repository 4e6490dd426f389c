// self
use crate::{
	_prelude::*,
	auth::{CredentialIdentity, TokenRecord},
	obs::TokenSource,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedAcquire<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedAcquire<F> = F;

/// Span wrapping one `acquire` call.
#[derive(Clone, Debug)]
pub struct AcquireSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl AcquireSpan {
	/// Creates a span tagged with the identity's client and audience. The secret never appears.
	pub fn new(identity: &CredentialIdentity) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_m2m.acquire",
				client_id = identity.client_id.as_str(),
				audience = identity.audience.as_str(),
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = identity;

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedAcquire<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits the event naming the tier that served `record`.
pub fn log_token_source(source: TokenSource, record: &TokenRecord) {
	#[cfg(feature = "tracing")]
	{
		let fingerprint = record.access_token.fingerprint();
		let expires_at = record.expires_at.unix_timestamp();

		match source {
			TokenSource::Memory => tracing::info!(%fingerprint, expires_at, "Token from memory."),
			TokenSource::Cache => tracing::info!(%fingerprint, expires_at, "Token from cache."),
			TokenSource::Grant =>
				tracing::info!(%fingerprint, expires_at, "Token from token endpoint."),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (source, record);
	}
}

/// Emits the event recording a cache write and its TTL.
pub fn log_cache_write(ttl: Duration) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(ttl_secs = ttl.whole_seconds(), "Token cached.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = ttl;
	}
}

/// Emits the event recording an expired cache hit that is treated as a miss.
pub fn log_stale_cache_hit(record: &TokenRecord) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			expires_at = record.expires_at.unix_timestamp(),
			"Cached token already expired; requesting a new one."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = record;
	}
}
