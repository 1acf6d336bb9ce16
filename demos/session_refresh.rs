//! Demonstrates a login followed by an access-token expiry: three concurrent requests hit the
//! 401, share a single refresh call, and are replayed with the new token.

// std
use std::time::Duration;
// crates.io
use color_eyre::Result;
use futures::future::join_all;
use httpmock::prelude::*;
// self
use bearer_client::{
	auth::CredentialEvent, client::ReqwestAuthClient, config::ClientConfig, payload::Credentials,
	url::Url,
};

fn issued(token: &str) -> serde_json::Value {
	serde_json::json!({
		"success": true,
		"message": "ok",
		"token": { "access_token": token, "token_type": "bearer", "expires_in": 900 },
		"user_id": "demo-user",
	})
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/auth/login");
			then.status(200)
				.header("set-cookie", "refresh_token=demo-refresh; Path=/; HttpOnly")
				.json_body(issued("demo-access-1"));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/notes").header("authorization", "Bearer demo-access-1");
			then.status(401).json_body(serde_json::json!({ "detail": "Token expired" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/notes").header("authorization", "Bearer demo-access-2");
			then.status(200).json_body(serde_json::json!({ "notes": ["first", "second"] }));
		})
		.await;

	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/auth/refresh");
			then.status(200).json_body(issued("demo-access-2")).delay(Duration::from_millis(100));
		})
		.await;
	let config = ClientConfig::builder(Url::parse(&server.url("/api/v1"))?).build()?;
	let client = ReqwestAuthClient::new(config)?;

	client.broadcast().subscribe(|event| match event {
		CredentialEvent::TokenUpdated(token) => println!("Token updated: {}.", token.expose()),
		CredentialEvent::AuthenticationFailed => println!("Authentication failed; log in again."),
	});
	client.login(&Credentials::new("demo@example.com", "demo-password")).await?;

	for response in join_all((0..3).map(|_| client.get("/notes"))).await {
		let response = response?.error_for_status()?;

		println!("Replayed request answered: {}.", response.text());
	}

	println!("Refresh calls: {}.", client.refresh_metrics().attempts());

	refresh_mock.assert_async().await;

	Ok(())
}
