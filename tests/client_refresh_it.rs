#![cfg(feature = "reqwest")]

// std
use std::time::Duration as StdDuration;
// crates.io
use futures::future::join_all;
use httpmock::prelude::*;
// self
use bearer_client::{
	auth::{AccessToken, CredentialEvent},
	client::ReqwestAuthClient,
	config::ClientConfig,
	error::{AuthFailureKind, Error, RefreshError},
};

fn build_client(server: &MockServer) -> ReqwestAuthClient {
	let config = ClientConfig::builder(
		server.url("/api/v1").parse().expect("Mock server URL should parse."),
	)
	.build()
	.expect("Client configuration should validate.");

	ReqwestAuthClient::new(config).expect("Reqwest client should build.")
}

fn issued(token: &str) -> serde_json::Value {
	serde_json::json!({
		"success": true,
		"message": "Token refreshed",
		"token": { "access_token": token, "token_type": "bearer", "expires_in": 900 },
		"refresh_token": null,
		"user_id": "u-1",
	})
}

#[tokio::test]
async fn concurrent_expiry_refreshes_once_and_replays_everything() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let expired = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/documents").header("authorization", "Bearer T1");
			then.status(401).json_body(serde_json::json!({ "detail": "Token expired" }));
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/documents").header("authorization", "Bearer T2");
			then.status(200).json_body(serde_json::json!({ "documents": [] }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/auth/refresh");
			then.status(200).json_body(issued("T2")).delay(StdDuration::from_millis(200));
		})
		.await;

	client.holder().store(AccessToken::new("T1"));

	let (_, mut events) = client.broadcast().subscribe_channel();
	let responses = join_all((0..5).map(|_| client.get("/documents"))).await;

	for response in responses {
		assert!(response.expect("Every request should be replayed.").status.is_success());
	}

	refresh.assert_calls_async(1).await;
	expired.assert_calls_async(5).await;
	fresh.assert_calls_async(5).await;

	assert_eq!(client.holder().bearer().map(|token| token.expose().to_owned()), Some("T2".into()));
	assert!(matches!(
		events.try_recv(),
		Ok(CredentialEvent::TokenUpdated(token)) if token.expose() == "T2"
	));
	assert!(events.try_recv().is_err());
	assert!(!client.coordinator().is_refreshing());
}

#[tokio::test]
async fn rejected_refresh_fails_request_and_clears_session() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let protected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/profile");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/auth/refresh");
			then.status(401).json_body(serde_json::json!({ "detail": "Invalid refresh token" }));
		})
		.await;

	client.holder().store(AccessToken::new("T1"));

	let (_, mut events) = client.broadcast().subscribe_channel();
	let err = client.get("/profile").await.expect_err("Rejected refresh should fail the request.");

	assert!(matches!(err, Error::Refresh(RefreshError::Rejected { status: 401 })));
	assert!(client.holder().bearer().is_none());
	assert_eq!(events.try_recv().ok(), Some(CredentialEvent::AuthenticationFailed));
	assert!(events.try_recv().is_err());

	refresh.assert_calls_async(1).await;
	protected.assert_calls_async(1).await;
}

#[tokio::test]
async fn exempt_login_failure_skips_refresh() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/auth/login");
			then.status(401).json_body(serde_json::json!({ "detail": "Invalid credentials" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/auth/refresh");
			then.status(200).json_body(issued("T2"));
		})
		.await;
	let err = client
		.post_json(
			"/auth/login?next=/home",
			&serde_json::json!({ "email": "a@b.c", "password": "x" }),
		)
		.await
		.expect_err("Bad credentials should surface directly.");

	assert!(matches!(
		err,
		Error::Unauthenticated { kind: AuthFailureKind::Exempt, status: 401, .. }
	));

	login.assert_calls_async(1).await;
	refresh.assert_calls_async(0).await;
}

#[tokio::test]
async fn replayed_request_is_not_refreshed_twice() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let protected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/admin");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/auth/refresh");
			then.status(200).json_body(issued("T2"));
		})
		.await;

	client.holder().store(AccessToken::new("T1"));

	let err = client.get("/admin").await.expect_err("Second 401 should be terminal.");

	assert!(matches!(err, Error::Unauthenticated { kind: AuthFailureKind::Terminal, .. }));
	// The refresh itself succeeded, so the new token stays installed.
	assert_eq!(client.holder().bearer().map(|token| token.expose().to_owned()), Some("T2".into()));

	protected.assert_calls_async(2).await;
	refresh.assert_calls_async(1).await;
}

#[tokio::test]
async fn non_auth_statuses_pass_through() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let forbidden = server
		.mock_async(|when, then| {
			when.method(DELETE).path("/api/v1/documents/7");
			then.status(403).body("forbidden");
		})
		.await;
	let response = client.delete("/documents/7").await.expect("403 is not an auth failure.");

	assert_eq!(response.status.as_u16(), 403);
	assert!(matches!(
		response.error_for_status(),
		Err(Error::Status { status: 403, body_preview }) if body_preview == "forbidden"
	));

	forbidden.assert_calls_async(1).await;
	assert_eq!(client.refresh_metrics().attempts(), 0);
}
