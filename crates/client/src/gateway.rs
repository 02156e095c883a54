// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP gateway for the console REST API.

use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;

use crate::config::{ClientConfig, REFRESH_ENDPOINT};
use crate::error::ApiError;
use crate::token::TokenPair;

/// An API request as a value, so the coordinator can replay one verbatim.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Endpoint relative to the API base, or an absolute `http(s)` URL.
    pub endpoint: String,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self { method, endpoint: endpoint.into(), body: None, headers: HeaderMap::new() }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        let mut req = Self::new(Method::POST, endpoint);
        req.body = Some(body);
        req
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        let mut req = Self::new(Method::PUT, endpoint);
        req.body = Some(body);
        req
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// Whether this request targets the refresh endpoint itself.
    pub fn is_refresh_call(&self) -> bool {
        self.endpoint.contains(REFRESH_ENDPOINT)
    }

    /// Whether the caller already set an `Authorization` header.
    pub fn has_authorization(&self) -> bool {
        self.headers.contains_key(AUTHORIZATION)
    }
}

/// HTTP client wrapper for the console backend.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { base_url: config.base_url.trim_end_matches('/').to_owned(), client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http") {
            endpoint.to_owned()
        } else {
            format!("{}{}", self.base_url, endpoint)
        }
    }

    /// Send `req`, attaching `bearer` unless the caller set `Authorization`.
    ///
    /// Non-success statuses come back as [`ApiError::Status`] with the raw
    /// body; an empty success body decodes to `Value::Null`.
    pub async fn send(&self, req: &ApiRequest, bearer: Option<&str>) -> Result<Value, ApiError> {
        let mut builder = self
            .client
            .request(req.method.clone(), self.url(&req.endpoint))
            .headers(req.headers.clone());
        if let Some(token) = bearer {
            if !req.has_authorization() {
                builder = builder.bearer_auth(token);
            }
        }
        if let Some(ref body) = req.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(ApiError::Decode)
    }

    /// Mint a new token pair from the refresh endpoint.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let req =
            ApiRequest::post(REFRESH_ENDPOINT, serde_json::json!({ "refreshToken": refresh_token }));
        let value = self.send(&req, None).await?;
        extract_token_pair(&value).ok_or(ApiError::Malformed("refresh response carried no accessToken"))
    }
}

/// Extract a token pair from a refresh/login response.
///
/// Accepts both `{accessToken, refreshToken?}` and
/// `{data: {accessToken, refreshToken?}}` envelopes.
pub fn extract_token_pair(value: &Value) -> Option<TokenPair> {
    let obj = value.get("data").filter(|d| d.is_object()).unwrap_or(value);
    let access = obj.get("accessToken")?.as_str()?;
    let refresh = obj.get("refreshToken").and_then(Value::as_str);
    Some(TokenPair {
        access_token: access.to_owned(),
        refresh_token: refresh.map(str::to_owned),
    })
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
