// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unverified JWT claims decoding.
//!
//! The payload segment is decoded for UI gating and identity display only.
//! No signature is checked here; the backend re-validates every call, so
//! decoded claims must never back an authorization decision.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

/// Claims parsed from an access token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    pub sub: Option<String>,
    pub role: Option<String>,
    /// Expiry as epoch seconds.
    pub exp: Option<u64>,
}

/// Decode the payload segment of `token`.
///
/// Accepts padded and unpadded base64url. Any failure (missing segment,
/// bad base64, invalid JSON, non-object payload) yields `None`.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let obj = value.as_object()?;
    Some(Claims {
        sub: obj.get("sub").and_then(|v| v.as_str()).map(str::to_owned),
        role: obj.get("role").and_then(|v| v.as_str()).map(str::to_owned),
        exp: obj.get("exp").and_then(serde_json::Value::as_u64),
    })
}

#[cfg(test)]
#[path = "claims_tests.rs"]
mod tests;
