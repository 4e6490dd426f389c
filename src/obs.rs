//! Optional observability helpers for token acquisition.
//!
//! # Feature Flags
//!
//! - `tracing` (default): every `acquire` runs inside an `oauth2_m2m.acquire` span carrying
//!   `client_id` and `audience`, and emits info events naming the tier that served the token.
//! - `metrics`: increments `oauth2_m2m_acquire_total` labeled by `outcome`, and
//!   `oauth2_m2m_token_source_total` labeled by `source`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Tier that produced the token returned by `acquire`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenSource {
	/// In-process memory slot.
	Memory,
	/// External cache.
	Cache,
	/// Fresh client-credentials grant.
	Grant,
}
impl TokenSource {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenSource::Memory => "memory",
			TokenSource::Cache => "cache",
			TokenSource::Grant => "grant",
		}
	}
}
impl Display for TokenSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each `acquire` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AcquireOutcome {
	/// Entry to `acquire`.
	Attempt,
	/// A valid token was returned.
	Success,
	/// An error was propagated to the caller.
	Failure,
}
impl AcquireOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AcquireOutcome::Attempt => "attempt",
			AcquireOutcome::Success => "success",
			AcquireOutcome::Failure => "failure",
		}
	}
}
impl Display for AcquireOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
