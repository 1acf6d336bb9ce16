//! Optional observability helpers for client flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_client.flow` with the `flow` and
//!   `stage` fields, plus debug/warn events around refresh episodes.
//! - Enable `metrics` to increment the `bearer_client_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and the
//!   `bearer_client_auth_failure_total` counter labeled by failure `kind`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Client flows observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Application request dispatched through the interceptor chain.
	Request,
	/// Single-flight refresh episode.
	Refresh,
	/// Credential login.
	Login,
	/// Account signup.
	Signup,
	/// Session logout.
	Logout,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Request => "request",
			FlowKind::Refresh => "refresh",
			FlowKind::Login => "login",
			FlowKind::Signup => "signup",
			FlowKind::Logout => "logout",
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
	/// Entry to a client helper.
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
