//! Example: A session from login to logout
//!
//! Starts a local mock API, then walks one [`ClientContext`] through login,
//! an authenticated request, a transparent token refresh and logout while
//! printing the events the transport broadcasts.
//!
//! Run with:
//!
//! ```bash
//! RUST_LOG=authwire_core=debug cargo run -p authwire-infra --example session_walkthrough
//! ```

use std::sync::Arc;

use authwire_domain::constants::{LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH};
use authwire_domain::{AuthEvent, ClientConfig, LoginCredentials};
use authwire_infra::{init_tracing, ClientContext, LogFormat};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROFILE: &str = "/api/v1/user/profile";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::Pretty);

    println!("Authwire Session Walkthrough");
    println!("============================\n");

    let server = start_mock_api().await;
    let context = ClientContext::new(ClientConfig::with_base_url(server.uri()))?;

    context.events().subscribe(Arc::new(|event: &AuthEvent| match event {
        AuthEvent::LoadingChanged(_) => {}
        AuthEvent::TokenRefreshed(bundle) => {
            println!("  [event] {} -> new access token {}", event.name(), bundle.access_token);
        }
        other => println!("  [event] {}", other.name()),
    }));

    println!("1. Logging in");
    let session = context.auth().login(&LoginCredentials::new("demo", "demo-password")).await?;
    println!("   user: {}", session.user.unwrap_or_default());

    println!("2. Fetching the profile with an access token the server will reject");
    let profile = context.transport().get(PROFILE).await?;
    println!("   profile: {profile}");
    println!("   refresh cycles so far: {}", context.coordinator().refresh_count());

    println!("3. Logging out");
    context.auth().logout().await?;
    println!("   authenticated: {}", context.auth().is_authenticated());

    Ok(())
}

/// Mock API: the first access token is already revoked, so the profile
/// request goes through one refresh before it succeeds.
async fn start_mock_api() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "revoked-token",
            "refreshToken": "refresh-1",
            "expiresIn": 3600,
            "csrfToken": "csrf-1",
            "user": {"username": "demo", "role": "viewer"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "live-token",
            "expiresIn": 3600
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(PROFILE))
        .and(header("authorization", "Bearer live-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "demo"})))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(PROFILE))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"code": "AUTH_EXPIRED"})))
        .with_priority(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(LOGOUT_PATH))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    server
}
