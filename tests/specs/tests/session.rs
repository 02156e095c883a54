// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end session flows: silent refresh, 401 replay, guards, login.

use serde_json::json;

use parley::{GuardDecision, TokenPair};
use parley_specs::{client_for, MockBackend};

fn pair(access: &str, refresh: Option<&str>) -> TokenPair {
    TokenPair { access_token: access.to_owned(), refresh_token: refresh.map(str::to_owned) }
}

#[tokio::test]
async fn expired_access_token_is_refreshed_and_the_call_replayed() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let client = client_for(&backend);

    // A1 is stale as far as the backend is concerned; only A2 works.
    client.tokens.set_tokens(&pair("A1", Some("R1")));
    backend.state.script_refresh(200, json!({ "accessToken": "A2", "refreshToken": "R2" }));
    backend.state.accept_token("A2");

    let value = client.session.get("/channel").await?;
    assert_eq!(value["auth"], "A2");
    assert_eq!(backend.state.refresh_count(), 1);
    assert_eq!(backend.state.channel_count(), 2); // 401, then one replay
    assert_eq!(client.tokens.access_token().as_deref(), Some("A2"));
    assert_eq!(client.tokens.refresh_token().as_deref(), Some("R2"));
    Ok(())
}

#[tokio::test]
async fn a_second_401_reaches_the_caller() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let client = client_for(&backend);

    client.tokens.set_tokens(&pair("A1", Some("R1")));
    // Refresh succeeds but the backend keeps rejecting.

    let err = match client.session.get("/channel").await {
        Err(e) => e,
        Ok(v) => anyhow::bail!("expected a 401, got {v}"),
    };
    assert!(err.is_unauthorized());
    assert_eq!(backend.state.refresh_count(), 1);
    assert_eq!(backend.state.channel_count(), 2);
    Ok(())
}

#[tokio::test]
async fn refresh_failure_clears_the_session() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let client = client_for(&backend);

    client.tokens.set_tokens(&pair("A1", Some("R1")));
    backend.state.script_refresh(401, json!({}));

    assert!(client.session.get("/channel").await.is_err());
    assert!(client.tokens.access_token().is_none());
    assert!(client.tokens.refresh_token().is_none());
    Ok(())
}

#[tokio::test]
async fn login_then_authenticated_fetch() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let client = client_for(&backend);
    backend.state.accept_token("A-login");

    client.session.login("ops@example.com", "hunter2").await?;
    assert_eq!(client.tokens.access_token().as_deref(), Some("A-login"));
    assert_eq!(client.tokens.refresh_token().as_deref(), Some("R-login"));

    let value = client.session.get("/channel").await?;
    assert_eq!(value["auth"], "A-login");
    assert_eq!(backend.state.refresh_count(), 0);

    client.session.logout();
    assert!(client.tokens.access_token().is_none());
    Ok(())
}

#[tokio::test]
async fn guest_guard_runs_a_silent_refresh_before_deciding() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;

    // Only a refresh token: simulate an access token that aged out.
    let mut config = parley::ClientConfig::default();
    config.base_url = backend.base_url();
    config.access_ttl_secs = 0;
    let client = parley::Client::new(config);
    client.tokens.set_tokens(&pair("gone", Some("R1")));
    assert!(client.tokens.access_token().is_none());

    let decision = client.session.guard_guest().await;
    // Refresh succeeded, so the guest route bounces to a landing page.
    assert!(matches!(decision, GuardDecision::To(_)));
    assert_eq!(backend.state.refresh_count(), 1);
    Ok(())
}

#[tokio::test]
async fn roster_refresh_uses_the_session_policy() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let client = client_for(&backend);

    client.tokens.set_tokens(&pair("A1", Some("R1")));
    backend.state.script_refresh(200, json!({ "accessToken": "A2" }));
    backend.state.accept_token("A2");

    // The roster's GET /channel goes through the coordinator, so the stale
    // access token is refreshed transparently.
    client.roster.refresh().await?;
    assert_eq!(backend.state.refresh_count(), 1);
    assert!(client.roster.channels().is_empty());
    Ok(())
}
