// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Relative endpoint of the token refresh call.
pub const REFRESH_ENDPOINT: &str = "/auth/refresh";

/// Relative endpoint of the login call.
pub const LOGIN_ENDPOINT: &str = "/auth/login";

/// Configuration for the console API client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP API base URL, version prefix included (e.g. `http://host:3300/api/v1`).
    pub base_url: String,
    /// Lifetime of a stored access token, in seconds.
    pub access_ttl_secs: u64,
    /// Lifetime of a stored refresh token, in seconds.
    pub refresh_ttl_secs: u64,
    /// Path of the persisted token file. `None` keeps tokens in memory only.
    pub token_path: Option<PathBuf>,
    /// Route of the login screen.
    pub login_route: String,
    /// Landing route for admins.
    pub admin_landing: String,
    /// Landing route for non-admin members.
    pub member_landing: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3300/api/v1".to_owned(),
            access_ttl_secs: 60 * 60,
            refresh_ttl_secs: 60 * 60 * 24 * 7,
            token_path: None,
            login_route: "/login".to_owned(),
            admin_landing: "/admin/dashboard".to_owned(),
            member_landing: "/admin/chat".to_owned(),
        }
    }
}

impl ClientConfig {
    /// Build a config from the environment: `PARLEY_API_URL` for the base
    /// URL, tokens persisted under [`state_dir`].
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("PARLEY_API_URL") {
            if !url.is_empty() {
                config.base_url = url;
            }
        }
        config.token_path = Some(state_dir().join("tokens.json"));
        config
    }

    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

/// Resolve the state directory for client data.
///
/// Checks `PARLEY_STATE_DIR`, then `$XDG_STATE_HOME/parley`,
/// then `$HOME/.local/state/parley`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PARLEY_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("parley");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/parley");
    }
    PathBuf::from(".parley")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
