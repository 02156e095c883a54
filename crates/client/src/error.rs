// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed errors surfaced by gateway and session calls.

use std::fmt;

/// Error returned by HTTP gateway and session operations.
///
/// Auth-layer failures are absorbed at the coordinator boundary; everything
/// else passes through unchanged for the caller to display.
#[derive(Debug)]
pub enum ApiError {
    /// The backend answered with a non-success HTTP status.
    Status { status: u16, body: String },
    /// The request never produced a response (connect, timeout, protocol).
    Transport(reqwest::Error),
    /// The response body was not valid JSON.
    Decode(serde_json::Error),
    /// The response decoded but lacked required fields.
    Malformed(&'static str),
}

impl ApiError {
    /// HTTP status of this error, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the backend rejected the call with 401.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, body } => {
                if body.is_empty() {
                    write!(f, "backend returned {status}")
                } else {
                    write!(f, "backend returned {status}: {body}")
                }
            }
            Self::Transport(e) => write!(f, "transport failure: {e}"),
            Self::Decode(e) => write!(f, "invalid response body: {e}"),
            Self::Malformed(what) => f.write_str(what),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
