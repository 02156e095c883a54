// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token storage: the session's access/refresh pair and derived claims.

pub mod claims;
pub mod persist;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::config::ClientConfig;
use claims::Claims;
use persist::{PersistedEntry, PersistedTokens};

/// An access/refresh token pair as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// A stored token with its absolute expiry (epoch seconds).
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: u64,
}

impl Entry {
    fn live(&self, now: u64) -> Option<&str> {
        (self.expires_at > now).then_some(self.value.as_str())
    }
}

impl From<PersistedEntry> for Entry {
    fn from(e: PersistedEntry) -> Self {
        Self { value: e.value, expires_at: e.expires_at }
    }
}

impl From<&Entry> for PersistedEntry {
    fn from(e: &Entry) -> Self {
        Self { value: e.value.clone(), expires_at: e.expires_at }
    }
}

#[derive(Debug, Default)]
struct Slots {
    access: Option<Entry>,
    refresh: Option<Entry>,
}

/// Durable store for the session's token pair.
///
/// An explicit instance passed by handle: clones share the same slots, and
/// every read takes the latest written value. The two slots expire
/// independently: a missing access token says nothing about the refresh
/// token, and either may be cleared on its own schedule.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Inner>,
}

struct Inner {
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
    path: Option<PathBuf>,
    slots: Mutex<Slots>,
}

impl TokenStore {
    /// Create a store per `config`, hydrating from the persisted file when
    /// one is configured. A missing or unreadable file starts empty.
    pub fn new(config: &ClientConfig) -> Self {
        let mut slots = Slots::default();
        if let Some(ref path) = config.token_path {
            match persist::load(path) {
                Ok(persisted) => {
                    slots.access = persisted.access.map(Entry::from);
                    slots.refresh = persisted.refresh.map(Entry::from);
                }
                Err(e) => tracing::debug!(err = %e, "no persisted tokens loaded"),
            }
        }
        Self {
            inner: Arc::new(Inner {
                access_ttl_secs: config.access_ttl_secs,
                refresh_ttl_secs: config.refresh_ttl_secs,
                path: config.token_path.clone(),
                slots: Mutex::new(slots),
            }),
        }
    }

    /// In-memory store with default lifetimes.
    pub fn in_memory() -> Self {
        Self::new(&ClientConfig::default())
    }

    /// Persist a new pair. The refresh slot is left untouched when the
    /// backend did not rotate the refresh token.
    pub fn set_tokens(&self, pair: &TokenPair) {
        let now = epoch_secs();
        let mut slots = self.inner.slots.lock();
        slots.access = Some(Entry {
            value: pair.access_token.clone(),
            expires_at: now + self.inner.access_ttl_secs,
        });
        if let Some(ref refresh) = pair.refresh_token {
            slots.refresh = Some(Entry {
                value: refresh.clone(),
                expires_at: now + self.inner.refresh_ttl_secs,
            });
        }
        self.persist(&slots);
    }

    /// Current access token, or `None` when absent or expired.
    pub fn access_token(&self) -> Option<String> {
        let slots = self.inner.slots.lock();
        slots.access.as_ref().and_then(|e| e.live(epoch_secs())).map(str::to_owned)
    }

    /// Current refresh token, or `None` when absent or expired.
    pub fn refresh_token(&self) -> Option<String> {
        let slots = self.inner.slots.lock();
        slots.refresh.as_ref().and_then(|e| e.live(epoch_secs())).map(str::to_owned)
    }

    /// Remove both tokens. Idempotent.
    pub fn clear(&self) {
        let mut slots = self.inner.slots.lock();
        slots.access = None;
        slots.refresh = None;
        self.persist(&slots);
    }

    /// Claims decoded from the access token, or `None`.
    pub fn claims(&self) -> Option<Claims> {
        self.access_token().and_then(|t| claims::decode_claims(&t))
    }

    /// Lower-cased, trimmed role claim.
    pub fn role(&self) -> Option<String> {
        self.claims().and_then(|c| c.role).map(|r| r.trim().to_lowercase())
    }

    /// True when the decoded role is `admin`. Display/route gating only.
    pub fn is_admin(&self) -> bool {
        self.role().as_deref() == Some("admin")
    }

    fn persist(&self, slots: &Slots) {
        let Some(ref path) = self.inner.path else { return };
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    tracing::warn!(err = %e, "failed to create token state dir");
                    return;
                }
            }
        }
        let persisted = PersistedTokens {
            access: slots.access.as_ref().map(PersistedEntry::from),
            refresh: slots.refresh.as_ref().map(PersistedEntry::from),
        };
        if let Err(e) = persist::save(path, &persisted) {
            tracing::warn!(err = %e, "failed to persist tokens");
        }
    }
}

/// Current epoch seconds.
pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
