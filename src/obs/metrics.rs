// self
use crate::{
	error::AuthFailureKind,
	obs::{FlowKind, FlowOutcome},
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bearer_client_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a 401 that was surfaced without a refresh.
pub fn record_auth_failure(kind: AuthFailureKind) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("bearer_client_auth_failure_total", "kind" => kind.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = kind;
	}
}
