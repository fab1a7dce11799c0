//! Optional observability helpers for the authentication flow.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bitbucket_identity.flow` with the `flow`
//!   (entry point) and `stage` (call site) fields, plus warnings for degraded remote calls.
//! - Enable `metrics` to increment the `bitbucket_identity_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub(crate) use tracing::FlowSpan;

// self
use crate::_prelude::*;

/// Flow entry points observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization redirect construction.
	Begin,
	/// Callback handling, token exchange, and identity resolution.
	Complete,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Begin => "begin",
			FlowKind::Complete => "complete",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Notes a degraded (non-aborting) remote-call failure; the attempt continues without the
/// data.
pub(crate) fn soft_failure(endpoint: &'static str, error: &dyn StdError) {
	#[cfg(feature = "tracing")]
	::tracing::warn!(
		endpoint,
		error = %error,
		"Failed to retrieve optional Bitbucket data; continuing without it."
	);

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (endpoint, error);
	}
}

/// Notes an outbound Bitbucket API call.
pub(crate) fn api_call(url: &str) {
	#[cfg(feature = "tracing")]
	::tracing::debug!(url, "GET Bitbucket API.");

	#[cfg(not(feature = "tracing"))]
	{
		let _ = url;
	}
}
