// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Joined-channel roster with live unread counts.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::realtime::{EventKind, RealtimeChannel, Subscription};
use crate::session::SessionCoordinator;

/// Summary of a channel the current user has joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinedChannel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub icon_codepoint: Option<i64>,
    #[serde(default)]
    pub icon_color: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_default: Option<bool>,
    #[serde(default)]
    pub last_message_content: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<String>,
    #[serde(default)]
    pub unread_count: Option<u64>,
}

/// Maintains the joined-channel list, applying `message:new` events as they
/// arrive so unread counts stay current without polling.
#[derive(Clone)]
pub struct ChannelRoster {
    inner: Arc<RosterInner>,
}

struct RosterInner {
    session: SessionCoordinator,
    channels: Mutex<Vec<JoinedChannel>>,
    active_channel: Mutex<Option<i64>>,
}

impl ChannelRoster {
    pub fn new(session: SessionCoordinator) -> Self {
        Self {
            inner: Arc::new(RosterInner {
                session,
                channels: Mutex::new(Vec::new()),
                active_channel: Mutex::new(None),
            }),
        }
    }

    /// Reload the roster from `GET /channel`: default channels first, then
    /// by name.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let value = self.inner.session.get("/channel").await?;
        let list = value.get("data").cloned().unwrap_or(Value::Null);
        let mut channels: Vec<JoinedChannel> = serde_json::from_value(list).unwrap_or_default();
        sort_channels(&mut channels);
        *self.inner.channels.lock() = channels;
        Ok(())
    }

    /// Subscribe to `realtime`, keeping unread counts current.
    ///
    /// Hold the returned handle for as long as the roster should stay live.
    pub fn attach(&self, realtime: &RealtimeChannel) -> Subscription {
        let inner = Arc::clone(&self.inner);
        let user_rx = realtime.user_id_receiver();
        realtime.subscribe(move |event| {
            if event.event == EventKind::MessageNew {
                inner.apply_message_new(&event.data, user_rx.borrow().clone());
            }
        })
    }

    /// Mark `id` as the channel currently on screen; its unread count stays
    /// at zero while messages arrive.
    pub fn set_active_channel(&self, id: Option<i64>) {
        *self.inner.active_channel.lock() = id;
    }

    pub fn active_channel(&self) -> Option<i64> {
        *self.inner.active_channel.lock()
    }

    pub fn channels(&self) -> Vec<JoinedChannel> {
        self.inner.channels.lock().clone()
    }

    pub fn get_by_id(&self, id: i64) -> Option<JoinedChannel> {
        self.inner.channels.lock().iter().find(|c| c.id == id).cloned()
    }
}

impl RosterInner {
    /// Apply a `message:new` payload to the roster.
    ///
    /// Messages sent by the current user, non-numeric channel ids, and
    /// channels not on the roster are all ignored.
    fn apply_message_new(&self, data: &Value, current_user: Option<String>) {
        let channel_id = match data.get("channel_id") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        let Some(channel_id) = channel_id else { return };

        let sender = data.get("sender_uuid").and_then(Value::as_str);
        if let (Some(user), Some(sender)) = (current_user.as_deref(), sender) {
            if user == sender {
                return; // own message, nothing unread
            }
        }

        let active = *self.active_channel.lock();
        let mut channels = self.channels.lock();
        let Some(channel) = channels.iter_mut().find(|c| c.id == channel_id) else { return };

        if let Some(content) = data.get("content").and_then(Value::as_str) {
            channel.last_message_content = Some(content.to_owned());
        }
        if let Some(at) = data.get("created_at").and_then(Value::as_str) {
            channel.last_message_at = Some(at.to_owned());
        }
        let unread = channel.unread_count.unwrap_or(0);
        channel.unread_count = Some(if active == Some(channel_id) { 0 } else { unread + 1 });
    }
}

/// Default channels first, then by name.
fn sort_channels(channels: &mut [JoinedChannel]) {
    channels.sort_by(|a, b| {
        let a_default = a.is_default.unwrap_or(false);
        let b_default = b.is_default.unwrap_or(false);
        b_default.cmp(&a_default).then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
#[path = "channels_tests.rs"]
mod tests;
