//! Request and response interceptors wrapped around every dispatch.

// self
use crate::{
	_prelude::*,
	auth::{BearerToken, CredentialHolder},
	config::ExemptEndpoints,
	error::{AuthFailureKind, ConfigError},
	http::{ApiRequest, ApiResponse},
};

/// An outgoing request plus its one-shot replay marker.
///
/// A context may be replayed after a refresh at most once: [`RequestContext::mark_retried`]
/// is never undone, so a second 401 on the same context is terminal.
#[derive(Clone, Debug)]
pub struct RequestContext {
	/// Request being dispatched.
	pub request: ApiRequest,
	retried: bool,
	sent_token: Option<BearerToken>,
}
impl RequestContext {
	/// Wraps a fresh request that has not been replayed.
	pub fn new(request: ApiRequest) -> Self {
		Self { request, retried: false, sent_token: None }
	}

	/// Returns `true` once the request has been handed to the refresh coordinator.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Bearer token attached by the last dispatch, if any.
	pub fn sent_token(&self) -> Option<&BearerToken> {
		self.sent_token.as_ref()
	}

	/// Consumes the replay allowance.
	pub fn mark_retried(&mut self) {
		self.retried = true;
	}

	/// Rewrites the `Authorization` header ahead of a replay.
	pub fn rewrite_bearer(&mut self, token: &BearerToken) -> Result<(), ConfigError> {
		self.request.set_bearer(token)?;
		self.sent_token = Some(token.clone());

		Ok(())
	}
}

/// Decision taken by [`inspect`] for one response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
	/// Hand the response to the caller unchanged.
	Deliver,
	/// Surface the 401 as a terminal error.
	Reject(AuthFailureKind),
	/// Wait on the refresh coordinator, then replay.
	Refresh,
}

/// Request interceptor: attaches the held bearer token, if any.
///
/// Without a held token the request goes out as-is. A token that cannot be encoded as a
/// header value is skipped rather than failing the dispatch.
pub fn authorize(holder: &CredentialHolder, ctx: &mut RequestContext) {
	let Some(token) = holder.bearer() else {
		return;
	};

	if let Err(_err) = ctx.rewrite_bearer(&token) {
		#[cfg(feature = "tracing")]
		tracing::warn!(error = %_err, "Held token is not a valid header value; sent without it.");
	}
}

/// Response interceptor: classifies a completed response.
///
/// Exempt endpoints are checked before the replay marker so login, signup, and refresh
/// failures never reach the coordinator.
pub fn inspect(exempt: &ExemptEndpoints, ctx: &RequestContext, response: &ApiResponse) -> Verdict {
	if !response.is_unauthenticated() {
		Verdict::Deliver
	} else if exempt.contains(&ctx.request.path) {
		Verdict::Reject(AuthFailureKind::Exempt)
	} else if ctx.is_retried() {
		Verdict::Reject(AuthFailureKind::Terminal)
	} else {
		Verdict::Refresh
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::StatusCode;
	// self
	use super::*;
	use crate::{auth::AccessToken, config::Endpoints};

	fn unauthorized() -> ApiResponse {
		ApiResponse::new(StatusCode::UNAUTHORIZED, "{\"detail\":\"expired\"}")
	}

	#[test]
	fn authorize_attaches_only_held_tokens() {
		let holder = CredentialHolder::default();
		let mut ctx = RequestContext::new(ApiRequest::get("/sessions"));

		authorize(&holder, &mut ctx);

		assert!(ctx.request.authorization().is_none());
		assert!(ctx.sent_token().is_none());

		holder.store(AccessToken::new("T1"));
		authorize(&holder, &mut ctx);

		assert_eq!(
			ctx.request.authorization().and_then(|value| value.to_str().ok()),
			Some("Bearer T1")
		);
		assert_eq!(ctx.sent_token(), Some(&BearerToken::new("T1")));
	}

	#[test]
	fn inspect_follows_exempt_then_retry_order() {
		let exempt = ExemptEndpoints::for_endpoints(&Endpoints::default());
		let mut ctx = RequestContext::new(ApiRequest::get("/sessions"));
		let ok = ApiResponse::new(StatusCode::OK, "[]");
		let forbidden = ApiResponse::new(StatusCode::FORBIDDEN, "");

		assert_eq!(inspect(&exempt, &ctx, &ok), Verdict::Deliver);
		assert_eq!(inspect(&exempt, &ctx, &forbidden), Verdict::Deliver);
		assert_eq!(inspect(&exempt, &ctx, &unauthorized()), Verdict::Refresh);

		ctx.mark_retried();

		assert_eq!(
			inspect(&exempt, &ctx, &unauthorized()),
			Verdict::Reject(AuthFailureKind::Terminal)
		);

		let mut login = RequestContext::new(ApiRequest::post("/auth/login"));

		assert_eq!(
			inspect(&exempt, &login, &unauthorized()),
			Verdict::Reject(AuthFailureKind::Exempt)
		);

		login.mark_retried();

		assert_eq!(
			inspect(&exempt, &login, &unauthorized()),
			Verdict::Reject(AuthFailureKind::Exempt)
		);
	}
}
