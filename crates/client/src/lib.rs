// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parley: session and realtime core for the chat admin console.
//!
//! The UI consumes four services: a [`TokenStore`] holding the access/refresh
//! pair, an [`HttpGateway`] speaking to the REST backend, a
//! [`SessionCoordinator`] that attaches and silently refreshes tokens (and
//! answers route-admission questions), and a [`RealtimeChannel`] that keeps
//! one authenticated socket alive with capped-backoff reconnects.

pub mod channels;
pub mod config;
pub mod error;
pub mod gateway;
pub mod realtime;
pub mod session;
pub mod token;

pub use channels::{ChannelRoster, JoinedChannel};
pub use config::ClientConfig;
pub use error::ApiError;
pub use gateway::{ApiRequest, HttpGateway};
pub use realtime::{ConnectionState, EventKind, RealtimeChannel, RealtimeEvent, Subscription};
pub use session::{GuardDecision, SessionCoordinator};
pub use token::claims::Claims;
pub use token::{TokenPair, TokenStore};

/// The wired service bundle a UI embeds.
pub struct Client {
    pub tokens: TokenStore,
    pub session: SessionCoordinator,
    pub realtime: RealtimeChannel,
    pub roster: ChannelRoster,
}

impl Client {
    /// Wire the services in dependency order: tokens, gateway, session,
    /// realtime, roster.
    pub fn new(config: ClientConfig) -> Self {
        let tokens = TokenStore::new(&config);
        let gateway = HttpGateway::new(&config);
        let session = SessionCoordinator::new(config.clone(), tokens.clone(), gateway);
        let realtime = RealtimeChannel::new(&config, tokens.clone());
        let roster = ChannelRoster::new(session.clone());
        Self { tokens, session, realtime, roster }
    }
}
