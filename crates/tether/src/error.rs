// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Errors surfaced by the session layer.
///
/// `Clone` so a single refresh outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No valid credential triple exists. Recoverable by login, not by retry.
    Unauthenticated,
    /// The identity provider rejected the refresh exchange. Terminal.
    RefreshFailed(String),
    /// Malformed bearer payload. Only produced inside the claim decoder.
    DecodeFailed(String),
    /// A protected call was rejected again after one refresh + retry.
    UpstreamAuthRejected { status: u16 },
    /// Network or body error talking to the API.
    Transport(String),
    /// Durable mirror could not be read or written.
    Storage(String),
    /// Session settings that cannot work, e.g. a private entry path.
    InvalidConfig(String),
}

impl SessionError {
    /// Machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::RefreshFailed(_) => "REFRESH_FAILED",
            Self::DecodeFailed(_) => "DECODE_FAILED",
            Self::UpstreamAuthRejected { .. } => "UPSTREAM_AUTH_REJECTED",
            Self::Transport(_) => "TRANSPORT",
            Self::Storage(_) => "STORAGE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }

    /// Whether the only remedy is a fresh login.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::RefreshFailed(_))
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("not authenticated"),
            Self::RefreshFailed(msg) => write!(f, "refresh failed: {msg}"),
            Self::DecodeFailed(msg) => write!(f, "token decode failed: {msg}"),
            Self::UpstreamAuthRejected { status } => {
                write!(f, "request rejected after refresh (HTTP {status})")
            }
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Storage(msg) => write!(f, "storage error: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
