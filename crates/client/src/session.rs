// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session coordination: token attachment, silent refresh, 401 replay, and
//! route admission.

use reqwest::header::AUTHORIZATION;
use serde_json::Value;

use crate::config::{ClientConfig, LOGIN_ENDPOINT};
use crate::error::ApiError;
use crate::gateway::{extract_token_pair, ApiRequest, HttpGateway};
use crate::token::{TokenPair, TokenStore};

/// Outcome of a route-admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Let the navigation commit.
    Admit,
    /// Send the user to the login screen, remembering where they were going.
    ToLogin { return_to: Option<String> },
    /// Send the user to another route.
    To(String),
}

/// Attaches tokens to outgoing calls and refreshes them transparently.
///
/// Concurrent callers may each trigger their own refresh; the store keeps
/// whichever pair was written last. Cheap to clone; all clones share the
/// same token store.
#[derive(Clone)]
pub struct SessionCoordinator {
    gateway: HttpGateway,
    tokens: TokenStore,
    config: ClientConfig,
}

impl SessionCoordinator {
    pub fn new(config: ClientConfig, tokens: TokenStore, gateway: HttpGateway) -> Self {
        Self { gateway, tokens, config }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Send `req` under the per-request token policy.
    ///
    /// A request is replayed at most once, and only after a successful
    /// refresh in response to a 401. Calls targeting the refresh endpoint
    /// never trigger a nested refresh.
    pub async fn dispatch(&self, req: ApiRequest) -> Result<Value, ApiError> {
        let is_refresh_call = req.is_refresh_call();
        let access = self.tokens.access_token();

        // No access token but a refresh token: mint a pair before sending.
        if access.is_none() && !is_refresh_call {
            if let Some(refresh) = self.tokens.refresh_token() {
                return match self.refresh_and_store(&refresh).await {
                    Ok(pair) => self.send_with_token(&req, &pair.access_token).await,
                    Err(e) => {
                        self.tokens.clear();
                        Err(e)
                    }
                };
            }
        }

        let result = self.gateway.send(&req, access.as_deref()).await;
        let unauthorized = result.as_ref().err().is_some_and(ApiError::is_unauthorized);
        if !unauthorized || is_refresh_call {
            return result;
        }

        // One refresh-and-replay. A second 401 goes straight to the caller.
        let Some(refresh) = self.tokens.refresh_token() else {
            self.tokens.clear();
            return result;
        };
        match self.refresh_and_store(&refresh).await {
            Ok(pair) => self.send_with_token(&req, &pair.access_token).await,
            Err(refresh_err) => {
                tracing::debug!(err = %refresh_err, "refresh after 401 failed");
                self.tokens.clear();
                result
            }
        }
    }

    pub async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.dispatch(ApiRequest::get(endpoint)).await
    }

    pub async fn post(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.dispatch(ApiRequest::post(endpoint, body)).await
    }

    pub async fn put(&self, endpoint: &str, body: Value) -> Result<Value, ApiError> {
        self.dispatch(ApiRequest::put(endpoint, body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.dispatch(ApiRequest::delete(endpoint)).await
    }

    /// Authenticate with credentials and persist the returned pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<Value, ApiError> {
        let req = ApiRequest::post(
            LOGIN_ENDPOINT,
            serde_json::json!({ "email": email, "password": password }),
        );
        let value = self.dispatch(req).await?;
        let pair = extract_token_pair(&value)
            .ok_or(ApiError::Malformed("login response carried no accessToken"))?;
        self.tokens.set_tokens(&pair);
        tracing::info!("login succeeded");
        Ok(value)
    }

    /// Drop the session's tokens.
    pub fn logout(&self) {
        self.tokens.clear();
    }

    /// Admission check for routes that require an authenticated session.
    pub async fn guard_protected(&self, requested: &str) -> GuardDecision {
        if self.tokens.access_token().is_some() {
            return GuardDecision::Admit;
        }
        let Some(refresh) = self.tokens.refresh_token() else {
            return GuardDecision::ToLogin { return_to: Some(requested.to_owned()) };
        };
        match self.refresh_and_store(&refresh).await {
            Ok(_) => GuardDecision::Admit,
            Err(e) => {
                tracing::debug!(err = %e, "silent refresh failed, sending to login");
                self.tokens.clear();
                GuardDecision::ToLogin { return_to: Some(requested.to_owned()) }
            }
        }
    }

    /// Admission check for guest-only routes such as the login screen.
    pub async fn guard_guest(&self) -> GuardDecision {
        if self.tokens.access_token().is_some() {
            return GuardDecision::To(self.landing_route());
        }
        let Some(refresh) = self.tokens.refresh_token() else {
            return GuardDecision::Admit;
        };
        match self.refresh_and_store(&refresh).await {
            Ok(_) => GuardDecision::To(self.landing_route()),
            Err(_) => {
                self.tokens.clear();
                GuardDecision::Admit
            }
        }
    }

    /// Admission check for admin-only routes.
    pub fn guard_elevated(&self) -> GuardDecision {
        if self.tokens.access_token().is_none() {
            return GuardDecision::ToLogin { return_to: None };
        }
        if self.tokens.is_admin() {
            return GuardDecision::Admit;
        }
        GuardDecision::To(self.config.member_landing.clone())
    }

    /// Landing route for the current role.
    fn landing_route(&self) -> String {
        if self.tokens.is_admin() {
            self.config.admin_landing.clone()
        } else {
            self.config.member_landing.clone()
        }
    }

    /// Replay `req` with a freshly minted token, overriding any caller-set
    /// `Authorization` header the way the original request carried it.
    async fn send_with_token(&self, req: &ApiRequest, token: &str) -> Result<Value, ApiError> {
        let mut replay = req.clone();
        replay.headers.remove(AUTHORIZATION);
        self.gateway.send(&replay, Some(token)).await
    }

    async fn refresh_and_store(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let pair = self.gateway.refresh(refresh_token).await?;
        self.tokens.set_tokens(&pair);
        Ok(pair)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
