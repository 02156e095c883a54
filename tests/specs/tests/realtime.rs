// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime socket lifecycle against a live server: connect idempotence,
//! reconnection after a server-side drop, and explicit disconnect.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use parley::{EventKind, RealtimeEvent, TokenPair};
use parley_specs::{client_for, wait_for, MockBackend};

const TIMEOUT: Duration = Duration::from_secs(5);

fn seed_token(client: &parley::Client, token: &str) {
    client
        .tokens
        .set_tokens(&TokenPair { access_token: token.to_owned(), refresh_token: None });
}

#[tokio::test]
async fn connect_opens_one_socket_and_delivers_the_greeting() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let client = client_for(&backend);
    backend.state.accept_token("A1");
    seed_token(&client, "A1");

    let events: Arc<Mutex<Vec<RealtimeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let _sub = {
        let events = Arc::clone(&events);
        client.realtime.subscribe(move |event| events.lock().push(event.clone()))
    };

    client.realtime.connect();
    anyhow::ensure!(
        wait_for(|| client.realtime.connected(), TIMEOUT).await,
        "never reached Connected"
    );
    anyhow::ensure!(
        wait_for(|| !events.lock().is_empty(), TIMEOUT).await,
        "greeting never delivered"
    );
    assert_eq!(events.lock()[0].event, EventKind::Connected);

    // A second connect while connected must not open another socket.
    client.realtime.connect();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.state.ws_count(), 1);

    client.realtime.disconnect();
    Ok(())
}

#[tokio::test]
async fn server_drop_triggers_an_automatic_reconnect() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let client = client_for(&backend);
    backend.state.accept_token("A1");
    seed_token(&client, "A1");

    client.realtime.connect();
    anyhow::ensure!(
        wait_for(|| client.realtime.connected(), TIMEOUT).await,
        "never reached Connected"
    );

    backend.state.kick_sockets();
    anyhow::ensure!(
        wait_for(|| backend.state.ws_count() >= 2, TIMEOUT).await,
        "no reconnect after server drop"
    );
    anyhow::ensure!(
        wait_for(|| client.realtime.connected(), TIMEOUT).await,
        "never recovered to Connected"
    );

    client.realtime.disconnect();
    Ok(())
}

#[tokio::test]
async fn disconnect_prevents_any_reconnect() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let client = client_for(&backend);
    backend.state.accept_token("A1");
    seed_token(&client, "A1");

    client.realtime.connect();
    anyhow::ensure!(
        wait_for(|| client.realtime.connected(), TIMEOUT).await,
        "never reached Connected"
    );

    client.realtime.disconnect();
    assert!(!client.realtime.connected());
    anyhow::ensure!(
        wait_for(|| backend.state.ws_live_count() == 0, TIMEOUT).await,
        "socket never closed"
    );

    // Longer than the first two backoff steps: nothing may reconnect.
    tokio::time::sleep(Duration::from_millis(1800)).await;
    assert_eq!(backend.state.ws_count(), 1);
    assert!(!client.realtime.connected());
    Ok(())
}

#[tokio::test]
async fn connect_without_a_token_does_nothing() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let client = client_for(&backend);

    client.realtime.connect();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.state.ws_count(), 0);
    assert!(!client.realtime.connected());
    Ok(())
}

#[tokio::test]
async fn rejected_upgrades_keep_retrying_until_the_token_is_valid() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let client = client_for(&backend);
    seed_token(&client, "A1"); // not accepted yet

    client.realtime.connect();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!client.realtime.connected());

    // Once the backend accepts the token, a scheduled retry gets through.
    backend.state.accept_token("A1");
    anyhow::ensure!(
        wait_for(|| client.realtime.connected(), TIMEOUT).await,
        "retry never connected"
    );

    client.realtime.disconnect();
    Ok(())
}

#[tokio::test]
async fn malformed_frames_do_not_poison_the_channel() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let client = client_for(&backend);
    backend.state.accept_token("A1");
    seed_token(&client, "A1");
    backend.state.set_greeting(Some("this is not json"));

    let events: Arc<Mutex<Vec<RealtimeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let _sub = {
        let events = Arc::clone(&events);
        client.realtime.subscribe(move |event| events.lock().push(event.clone()))
    };

    client.realtime.connect();
    anyhow::ensure!(
        wait_for(|| client.realtime.connected(), TIMEOUT).await,
        "never reached Connected"
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(events.lock().is_empty());
    assert!(client.realtime.connected());

    client.realtime.disconnect();
    Ok(())
}
