// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session credentials: the bearer triple, its derived identity projection,
//! durable per-tab mirroring, and the refresh coordinator that keeps it fresh.

pub mod claims;
pub mod persist;
pub mod refresh;
pub mod store;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The session credential triple. Either fully present or fully absent.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialTriple {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of `access_token` as epoch milliseconds.
    pub expires_at: u64,
}

impl CredentialTriple {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: u64,
    ) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into(), expires_at }
    }

    /// A triple with empty tokens is never stored.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// Milliseconds until expiry at `now_ms`; negative once expired.
    pub fn remaining_ms(&self, now_ms: u64) -> i128 {
        self.expires_at as i128 - now_ms as i128
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at <= now_ms
    }

    /// True when the token outlives `threshold` from `now_ms`.
    pub fn is_fresh(&self, threshold: Duration, now_ms: u64) -> bool {
        self.remaining_ms(now_ms) >= threshold.as_millis() as i128
    }
}

// Token values stay out of logs and panics.
impl std::fmt::Debug for CredentialTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialTriple")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Display-only identity derived from the access token's unverified claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProjection {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
}

/// Lifecycle events broadcast by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A login wrote a fresh triple.
    Established,
    /// The refresh coordinator rotated the triple.
    Refreshed { expires_at: u64 },
    /// The session was torn down after an unrecoverable failure.
    Terminated { reason: String },
    /// Explicit logout.
    LoggedOut,
}

/// Token response shared by the login and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Absolute expiry in epoch milliseconds.
    #[serde(default)]
    pub expires_at: Option<u64>,
}

impl TokenResponse {
    /// Build a triple, keeping `previous_refresh` when the server did not
    /// rotate the refresh token.
    pub fn into_triple(
        self,
        previous_refresh: Option<&str>,
        now_ms: u64,
    ) -> Option<CredentialTriple> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(secs)) => now_ms.saturating_add(secs.saturating_mul(1000)),
            (None, None) => return None,
        };
        let refresh_token = self.refresh_token.or_else(|| previous_refresh.map(str::to_owned))?;
        let triple = CredentialTriple { access_token: self.access_token, refresh_token, expires_at };
        triple.is_complete().then_some(triple)
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Resolve the state directory for durable tab storage.
///
/// Checks `TETHER_STATE_DIR`, then `$XDG_STATE_HOME/tether`,
/// then `$HOME/.local/state/tether`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TETHER_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("tether");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/tether");
    }
    PathBuf::from(".tether")
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
