// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime channel: one persistent socket per authenticated session, with
//! automatic reconstruction after disconnection.
//!
//! Transport failures never surface to callers. They become state transitions
//! followed by a scheduled reconnect. Consumers that need freshness
//! guarantees must fall back to HTTP fetches while [`RealtimeChannel::connected`]
//! is false.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::token::{claims, TokenStore};

/// Connection state of the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Kind tag of a realtime frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "connected")]
    Connected,
    #[serde(rename = "message:new")]
    MessageNew,
    #[serde(rename = "message:read")]
    MessageRead,
    #[serde(rename = "error")]
    Error,
}

/// A frame pushed by the server over the realtime socket.
///
/// Frames with an unknown `event` tag or malformed JSON are dropped before
/// dispatch. There is no buffering: a subscriber registered after an event
/// was delivered never sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub event: EventKind,
    #[serde(default)]
    pub data: Value,
}

type Subscriber = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Handle returned by [`RealtimeChannel::subscribe`].
///
/// Dropping the handle leaves the subscription in place; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    inner: Arc<ChannelInner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.inner.subscribers.lock().retain(|(id, _)| *id != self.id);
    }
}

/// One persistent event stream per authenticated session.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    base_url: String,
    tokens: TokenStore,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    user_tx: watch::Sender<Option<String>>,
    user_rx: watch::Receiver<Option<String>>,
    subscribers: Mutex<Vec<(u64, Subscriber)>>,
    next_subscriber_id: AtomicU64,
    attempt: AtomicU32,
    socket: Mutex<Option<SocketSlot>>,
    reconnect: Mutex<Option<CancellationToken>>,
    generation: AtomicU64,
}

/// The live (or connecting) socket task, tagged so a stale task's teardown
/// cannot clobber a newer connection's state.
struct SocketSlot {
    cancel: CancellationToken,
    generation: u64,
}

impl RealtimeChannel {
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (user_tx, user_rx) = watch::channel(None);
        Self {
            inner: Arc::new(ChannelInner {
                base_url: config.base_url.clone(),
                tokens,
                state_tx,
                state_rx,
                user_tx,
                user_rx,
                subscribers: Mutex::new(Vec::new()),
                next_subscriber_id: AtomicU64::new(1),
                attempt: AtomicU32::new(0),
                socket: Mutex::new(None),
                reconnect: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_rx.borrow()
    }

    pub fn connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch receiver for connection-state transitions.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_rx.clone()
    }

    /// The `sub` claim of the token the socket authenticated with.
    pub fn user_id(&self) -> Option<String> {
        self.inner.user_rx.borrow().clone()
    }

    pub fn user_id_receiver(&self) -> watch::Receiver<Option<String>> {
        self.inner.user_rx.clone()
    }

    /// Open the socket.
    ///
    /// No-op without an access token, and no-op while a socket is already
    /// open or connecting, so at most one socket exists at a time.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Close the socket and stop reconnecting.
    ///
    /// Cancels any pending reconnect timer and resets the attempt counter.
    /// This is the only path that prevents automatic reconnection.
    pub fn disconnect(&self) {
        // Lock order (socket, then reconnect) matches the socket task's
        // teardown, so a teardown racing this call can never arm a timer
        // that survives it.
        let mut socket = self.inner.socket.lock();
        if let Some(slot) = socket.take() {
            slot.cancel.cancel();
        }
        if let Some(pending) = self.inner.reconnect.lock().take() {
            pending.cancel();
        }
        self.inner.attempt.store(0, Ordering::Relaxed);
        self.inner.set_state(ConnectionState::Disconnected);
        drop(socket);
    }

    /// Register `callback` for every delivered event, in registration order.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        Subscription { inner: Arc::clone(&self.inner), id }
    }
}

impl ChannelInner {
    fn connect(self: &Arc<Self>) {
        let Some(token) = self.tokens.access_token() else { return };

        let mut socket = self.socket.lock();
        if socket.is_some() {
            return; // already open or connecting
        }
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        *socket = Some(SocketSlot { cancel: cancel.clone(), generation });
        drop(socket);

        let _ = self.user_tx.send(claims::decode_claims(&token).and_then(|c| c.sub));
        self.set_state(ConnectionState::Connecting);

        let url = build_ws_url(&self.base_url, &token);
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.run_socket(url, cancel, generation).await;
        });
    }

    async fn run_socket(self: Arc<Self>, url: String, cancel: CancellationToken, generation: u64) {
        let stream = tokio::select! {
            () = cancel.cancelled() => None,
            result = tokio_tungstenite::connect_async(&url) => match result {
                Ok((stream, _)) => Some(stream),
                Err(e) => {
                    tracing::debug!(err = %e, "realtime connect failed");
                    None
                }
            }
        };

        if let Some(stream) = stream {
            self.set_state(ConnectionState::Connected);
            self.attempt.store(0, Ordering::Relaxed);
            tracing::debug!("realtime socket connected");

            let (_write, mut read) = stream.split();
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::debug!("realtime socket closed");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::debug!(err = %e, "realtime socket error");
                            break;
                        }
                        _ => {} // ping/pong/binary ignored
                    }
                }
            }
        }

        // Teardown. A stale generation means an explicit disconnect (and
        // possibly a newer connect) already ran; leave their state alone.
        // The socket lock is held across the state flip and the reconnect
        // scheduling so `disconnect()` cannot interleave.
        let mut socket = self.socket.lock();
        if socket.as_ref().is_some_and(|slot| slot.generation == generation) {
            *socket = None;
            self.set_state(ConnectionState::Disconnected);
            if !cancel.is_cancelled() {
                self.schedule_reconnect();
            }
        }
        drop(socket);
    }

    /// Arm the reconnect timer.
    ///
    /// Idempotent: a second request while a timer is pending is ignored.
    /// Abandoned when no access token is available to authenticate the
    /// next attempt.
    fn schedule_reconnect(self: &Arc<Self>) {
        let mut pending = self.reconnect.lock();
        if pending.is_some() {
            return;
        }
        if self.tokens.access_token().is_none() {
            return;
        }

        let attempt = self.attempt.fetch_add(1, Ordering::Relaxed);
        let delay = reconnect_delay(attempt);
        let cancel = CancellationToken::new();
        *pending = Some(cancel.clone());
        drop(pending);

        tracing::debug!(
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "realtime reconnect scheduled"
        );
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    *inner.reconnect.lock() = None;
                    inner.connect();
                }
            }
        });
    }

    /// Parse one frame and fan it out.
    ///
    /// Delivery iterates a snapshot of the registry, so a callback may
    /// subscribe or unsubscribe mid-dispatch without breaking iteration,
    /// and a panicking subscriber never blocks the rest.
    fn dispatch(&self, raw: &str) {
        let event: RealtimeEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(err = %e, "dropping malformed realtime frame");
                return;
            }
        };

        let snapshot: Vec<Subscriber> =
            self.subscribers.lock().iter().map(|(_, s)| Arc::clone(s)).collect();
        for subscriber in snapshot {
            if std::panic::catch_unwind(AssertUnwindSafe(|| subscriber(&event))).is_err() {
                tracing::warn!("realtime subscriber panicked; continuing delivery");
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }
}

/// Delay before the next reconnect attempt: `min(15s, 500ms * 2^attempt)`.
pub(crate) fn reconnect_delay(attempt: u32) -> Duration {
    // 500 * 2^5 already exceeds the cap, so larger exponents are moot.
    let ms = (500u64 << attempt.min(5)).min(15_000);
    Duration::from_millis(ms)
}

/// Derive the websocket URL from the HTTP API base.
///
/// `http://host:3300/api/v1` becomes `ws://host:3300/ws?token=...`.
fn build_ws_url(base_url: &str, token: &str) -> String {
    let ws_base = if base_url.starts_with("https://") {
        base_url.replacen("https://", "wss://", 1)
    } else {
        base_url.replacen("http://", "ws://", 1)
    };
    let ws_base = strip_api_version(ws_base.trim_end_matches('/'));
    format!("{ws_base}/ws?token={}", urlencode(token))
}

/// Strip a trailing `/api/v{N}` segment.
fn strip_api_version(base: &str) -> &str {
    let Some((prefix, last)) = base.rsplit_once('/') else { return base };
    let is_version = last
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
    if !is_version {
        return base;
    }
    match prefix.rsplit_once('/') {
        Some((rest, "api")) => rest,
        _ => base,
    }
}

/// Percent-encode a query-string value.
fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            _ => format!("%{:02X}", c as u8),
        })
        .collect()
}

#[cfg(test)]
#[path = "realtime_tests.rs"]
mod tests;
